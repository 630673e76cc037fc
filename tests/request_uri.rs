use emberhttp::RequestUri;

#[test]
fn path_and_query_split() {
    let uri = RequestUri::new("/search?page=1&limit=10", 0, 7);
    assert_eq!(uri.full(), "/search?page=1&limit=10");
    assert_eq!(uri.path(), "/search");
    assert_eq!(uri.query(), Some("page=1&limit=10"));
}

#[test]
fn no_query_returns_none() {
    let uri = RequestUri::new("/users/42", 0, 9);
    assert_eq!(uri.path(), "/users/42");
    assert_eq!(uri.query(), None);
}

#[test]
fn empty_query_after_question_mark() {
    let uri = RequestUri::new("/ping?", 0, 5);
    assert_eq!(uri.path(), "/ping");
    assert_eq!(uri.query(), Some(""));
}

#[test]
fn fragment_is_stripped_from_query() {
    let uri = RequestUri::new("/docs?x=1#section", 0, 5);
    assert_eq!(uri.query(), Some("x=1"));
}

#[test]
fn asterisk_form_has_no_path_segments() {
    let uri = RequestUri::new("*", 0, 1);
    assert_eq!(uri.path(), "*");
    assert_eq!(uri.query(), None);
}

#[test]
fn root_path() {
    let uri = RequestUri::new("/", 0, 1);
    assert_eq!(uri.path(), "/");
    assert_eq!(uri.query(), None);
}
