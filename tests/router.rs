use emberhttp::{Lookup, Method, Router};
use std::sync::Arc;

type R = Router<usize>;

fn add(router: &mut R, method: &Method, path: &str, id: usize) {
    router.add(method, path, Arc::new(id)).unwrap();
}

fn assert_match(router: &R, method: &Method, path: &str, expected_idx: usize) {
    match router.find(method, path) {
        Lookup::Matched(m) => assert_eq!(*m.handler, expected_idx, "path: {path}"),
        _ => panic!("expected match for {path}"),
    }
}

fn assert_match_params(
    router: &R,
    method: &Method,
    path: &str,
    expected_idx: usize,
    expected_params: &[(&str, &str)],
) {
    match router.find(method, path) {
        Lookup::Matched(m) => {
            assert_eq!(*m.handler, expected_idx, "path: {path}");
            for (k, v) in expected_params {
                let found = m.params.iter().find(|(n, _)| n == k);
                assert_eq!(found.map(|(_, v)| *v), Some(*v), "param '{k}' for {path}");
            }
        }
        _ => panic!("expected match for {path}"),
    }
}

fn assert_not_found(router: &R, method: &Method, path: &str) {
    assert!(matches!(router.find(method, path), Lookup::NotFound));
}

#[test]
fn nested_routes() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/route", 0);
    add(&mut r, &Method::Get, "/route/foo", 1);

    assert_match(&r, &Method::Get, "/route", 0);
    assert_match(&r, &Method::Get, "/route/foo", 1);
}

#[test]
fn wildcard_matches_remaining_segments() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/assets/*", 0);
    add(&mut r, &Method::Get, "/assets/hey", 1);

    assert_match(&r, &Method::Get, "/assets/js/app.js", 0);
    assert_match(&r, &Method::Get, "/assets/hey", 1);
}

#[test]
fn literal_beats_param() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/users/me", 0);
    add(&mut r, &Method::Get, "/users/:id", 1);

    assert_match(&r, &Method::Get, "/users/me", 0);
    assert_match_params(&r, &Method::Get, "/users/42", 1, &[("id", "42")]);
}

#[test]
fn param_extraction_multi_segment() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/users/:id/posts/:post_id", 0);

    assert_match_params(
        &r,
        &Method::Get,
        "/users/42/posts/abc",
        0,
        &[("id", "42"), ("post_id", "abc")],
    );
}

#[test]
fn not_found_vs_wrong_method() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/widgets/:id", 0);

    assert_match_params(&r, &Method::Get, "/widgets/7", 0, &[("id", "7")]);
    assert!(matches!(
        r.find(&Method::Post, "/widgets/7"),
        Lookup::WrongMethod
    ));
    assert_not_found(&r, &Method::Get, "/nope");
}

#[test]
fn method_isolation() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/users/:id", 0);
    add(&mut r, &Method::Post, "/users/:id", 1);

    assert_match_params(&r, &Method::Get, "/users/10", 0, &[("id", "10")]);
    assert_match_params(&r, &Method::Post, "/users/10", 1, &[("id", "10")]);
}

#[test]
fn unsupported_method_is_rejected_at_add_time() {
    let mut r: Router<usize> = Router::new();
    let result = r.add(&Method::from("TRACE"), "/x", Arc::new(0));
    assert!(result.is_err());
    assert_not_found(&r, &Method::from("TRACE"), "/x");
}

#[test]
fn last_inserted_wins_for_identical_routes() {
    let mut r = Router::new();
    add(&mut r, &Method::Get, "/route/foo", 0);
    add(&mut r, &Method::Get, "/route/foo", 1);

    assert_match(&r, &Method::Get, "/route/foo", 1);
}
