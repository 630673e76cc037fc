//! Route registration and matching (`spec.md` §4.4).
//!
//! Grounded on the reference crate's route-matching contract
//! (`RouteEntry`/`RouteSegment` literal/param/wildcard precedence) but
//! restructured into a byte-indexed trie (`trie.rs`) instead of a
//! per-method `HashMap` of whole-path patterns.

mod trie;

use std::sync::Arc;

use crate::http::{Method, METHOD_SLOTS};
use trie::TrieNode;

pub struct Router<T> {
    root: TrieNode<T>,
}

pub struct RouteMatch<'a, 'p, T> {
    pub handler: &'a Arc<T>,
    pub params: Vec<(String, &'p str)>,
}

/// Outcome of a lookup. `WrongMethod` (path exists, method doesn't) is
/// kept distinct from `NotFound` for callers that want the distinction,
/// but the dispatcher (`spec.md` §4.7) maps both to 404 — the spec has
/// no 405 category.
pub enum Lookup<'a, 'p, T> {
    Matched(RouteMatch<'a, 'p, T>),
    WrongMethod,
    NotFound,
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Router {
            root: TrieNode::new(),
        }
    }

    /// Registers a route. Unsupported methods (`Method::trie_index`
    /// returning `None`) are rejected at add-time per `spec.md` §4.4.
    pub fn add(&mut self, method: &Method, path: &str, handler: Arc<T>) -> Result<(), Method> {
        let idx = match method.trie_index() {
            Some(idx) => idx,
            None => return Err(method.clone()),
        };
        self.root.insert(path.as_bytes(), idx, handler);
        Ok(())
    }

    pub fn find<'a, 'p>(&'a self, method: &Method, path: &'p str) -> Lookup<'a, 'p, T> {
        let idx = match method.trie_index() {
            Some(idx) => idx,
            None => return Lookup::NotFound,
        };
        let mut params = Vec::new();
        match self.root.find(path.as_bytes(), idx, &mut params) {
            Some(handler) => Lookup::Matched(RouteMatch { handler, params }),
            None => {
                if self.root.path_exists(path.as_bytes()) {
                    Lookup::WrongMethod
                } else {
                    Lookup::NotFound
                }
            }
        }
    }
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
const _: usize = METHOD_SLOTS; // keeps the import honest if trie.rs changes

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_unsupported_method() {
        let mut router: Router<&'static str> = Router::new();
        let result = router.add(&Method::from("TRACE"), "/x", Arc::new("x"));
        assert!(result.is_err());
    }

    #[test]
    fn find_distinguishes_not_found_from_wrong_method() {
        let mut router = Router::new();
        router
            .add(&Method::Get, "/widgets/:id", Arc::new("get_widget"))
            .unwrap();

        match router.find(&Method::Get, "/widgets/7") {
            Lookup::Matched(m) => {
                assert_eq!(**m.handler, "get_widget");
                assert_eq!(m.params, vec![("id".to_string(), "7")]);
            }
            _ => panic!("expected match"),
        }

        match router.find(&Method::Post, "/widgets/7") {
            Lookup::WrongMethod => {}
            _ => panic!("expected wrong-method"),
        }

        match router.find(&Method::Get, "/nope") {
            Lookup::NotFound => {}
            _ => panic!("expected not-found"),
        }
    }
}
