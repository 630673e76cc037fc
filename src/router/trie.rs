//! Byte-indexed route trie (`spec.md` §4.4).
//!
//! Each node has plain byte-keyed children (one edge per literal byte,
//! linear-scanned — path segments rarely fan out past a handful of
//! siblings so this beats a 256-slot array on memory without costing
//! anything in practice), at most one parameter child, and at most one
//! wildcard child. Matching prefers literal bytes, then the parameter
//! child, then the wildcard child, backtracking on failure so a longer
//! literal match always wins over a parameter match at the same depth.

use std::sync::Arc;

use crate::http::METHOD_SLOTS;

struct ParamChild<T> {
    name: String,
    node: TrieNode<T>,
}

pub struct TrieNode<T> {
    byte_children: Vec<(u8, Box<TrieNode<T>>)>,
    param_child: Option<Box<ParamChild<T>>>,
    wildcard_child: Option<Box<TrieNode<T>>>,
    handlers: [Option<Arc<T>>; METHOD_SLOTS],
}

impl<T> TrieNode<T> {
    pub fn new() -> Self {
        TrieNode {
            byte_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
            handlers: Default::default(),
        }
    }

    /// Registers `handler` for `method_idx` at `path`. `path` uses `:name`
    /// for a parameter segment and a trailing `*` for a catch-all
    /// (`spec.md` §4.4 treats `*` and `**` the same — a single wildcard
    /// child that always terminates the match).
    ///
    /// If a parameter already exists at a given trie position under a
    /// different name, the first-registered name wins (Open Question,
    /// resolved in DESIGN.md) — the new route still matches, just under
    /// the earlier parameter name.
    pub fn insert(&mut self, path: &[u8], method_idx: usize, handler: Arc<T>) {
        if path.is_empty() {
            self.handlers[method_idx] = Some(handler);
            return;
        }

        match path[0] {
            b':' => {
                let end = path[1..]
                    .iter()
                    .position(|&b| b == b'/')
                    .map(|p| p + 1)
                    .unwrap_or(path.len());
                let name = String::from_utf8_lossy(&path[1..end]).into_owned();
                let rest = &path[end..];
                match &mut self.param_child {
                    Some(pc) => pc.node.insert(rest, method_idx, handler),
                    None => {
                        let mut node = TrieNode::new();
                        node.insert(rest, method_idx, handler);
                        self.param_child = Some(Box::new(ParamChild { name, node }));
                    }
                }
            }
            b'*' => {
                let node = self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(TrieNode::new()));
                node.handlers[method_idx] = Some(handler);
            }
            b => {
                let rest = &path[1..];
                let idx = match self.byte_children.iter().position(|(c, _)| *c == b) {
                    Some(i) => i,
                    None => {
                        self.byte_children.push((b, Box::new(TrieNode::new())));
                        self.byte_children.len() - 1
                    }
                };
                self.byte_children[idx].1.insert(rest, method_idx, handler);
            }
        }
    }

    /// Finds the handler for `method_idx` at `path`, collecting captured
    /// parameter values (borrowed from `path`) into `params` in the order
    /// they appear along the matched branch.
    pub fn find<'p>(
        &self,
        path: &'p [u8],
        method_idx: usize,
        params: &mut Vec<(String, &'p str)>,
    ) -> Option<&Arc<T>> {
        if path.is_empty() {
            if let Some(h) = self.handlers[method_idx].as_ref() {
                return Some(h);
            }
            // An empty wildcard match (route registered with a trailing
            // `*` matched with nothing left) is also valid.
            if let Some(wc) = &self.wildcard_child {
                return wc.handlers[method_idx].as_ref();
            }
            return None;
        }

        let b = path[0];
        if let Some((_, child)) = self.byte_children.iter().find(|(c, _)| *c == b) {
            if let Some(h) = child.find(&path[1..], method_idx, params) {
                return Some(h);
            }
        }

        if let Some(pc) = &self.param_child {
            let end = path.iter().position(|&b| b == b'/').unwrap_or(path.len());
            if end > 0 {
                if let Ok(value) = std::str::from_utf8(&path[..end]) {
                    params.push((pc.name.clone(), value));
                    if let Some(h) = pc.node.find(&path[end..], method_idx, params) {
                        return Some(h);
                    }
                    params.pop();
                }
            }
        }

        if let Some(wc) = &self.wildcard_child {
            if let Some(h) = wc.handlers[method_idx].as_ref() {
                return Some(h);
            }
        }

        None
    }

    /// True if any method at all is registered at this exact path — used
    /// to distinguish a 404 (no route) from a 405 (route exists, wrong
    /// method), per `spec.md` §4.7 step 3.
    pub fn path_exists(&self, path: &[u8]) -> bool {
        if path.is_empty() {
            return self.handlers.iter().any(Option::is_some)
                || self
                    .wildcard_child
                    .as_ref()
                    .is_some_and(|wc| wc.handlers.iter().any(Option::is_some));
        }
        let b = path[0];
        if let Some((_, child)) = self.byte_children.iter().find(|(c, _)| *c == b) {
            if child.path_exists(&path[1..]) {
                return true;
            }
        }
        if let Some(pc) = &self.param_child {
            let end = path.iter().position(|&b| b == b'/').unwrap_or(path.len());
            if end > 0 && pc.node.path_exists(&path[end..]) {
                return true;
            }
        }
        if let Some(wc) = &self.wildcard_child {
            if wc.handlers.iter().any(Option::is_some) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx() -> usize {
        0
    }

    #[test]
    fn literal_route_matches_exactly() {
        let mut trie = TrieNode::new();
        trie.insert(b"/users/active", idx(), Arc::new("list_active"));
        let mut params = Vec::new();
        let found = trie.find(b"/users/active", idx(), &mut params).unwrap();
        assert_eq!(**found, "list_active");
        assert!(params.is_empty());
    }

    #[test]
    fn param_segment_captures_value() {
        let mut trie = TrieNode::new();
        trie.insert(b"/users/:id", idx(), Arc::new("get_user"));
        let mut params = Vec::new();
        let found = trie.find(b"/users/42", idx(), &mut params).unwrap();
        assert_eq!(**found, "get_user");
        assert_eq!(params, vec![("id".to_string(), "42")]);
    }

    #[test]
    fn literal_beats_param_at_same_depth() {
        let mut trie = TrieNode::new();
        trie.insert(b"/users/active", idx(), Arc::new("list_active"));
        trie.insert(b"/users/:id", idx(), Arc::new("get_user"));
        let mut params = Vec::new();
        let found = trie.find(b"/users/active", idx(), &mut params).unwrap();
        assert_eq!(**found, "list_active");
        assert!(params.is_empty());

        let mut params2 = Vec::new();
        let found2 = trie.find(b"/users/99", idx(), &mut params2).unwrap();
        assert_eq!(**found2, "get_user");
        assert_eq!(params2, vec![("id".to_string(), "99")]);
    }

    #[test]
    fn wildcard_catches_remaining_path() {
        let mut trie = TrieNode::new();
        trie.insert(b"/assets/*", idx(), Arc::new("serve_asset"));
        let mut params = Vec::new();
        let found = trie
            .find(b"/assets/js/app.js", idx(), &mut params)
            .unwrap();
        assert_eq!(**found, "serve_asset");
    }

    #[test]
    fn first_writer_wins_param_name() {
        let mut trie = TrieNode::new();
        trie.insert(b"/users/:id", idx(), Arc::new("by_id"));
        trie.insert(b"/users/:slug", idx(), Arc::new("by_slug"));
        let mut params = Vec::new();
        // second insert's terminal handler overwrites, but the param
        // name captured is the first one ("id"), not "slug"
        let found = trie.find(b"/users/abc", idx(), &mut params).unwrap();
        assert_eq!(**found, "by_slug");
        assert_eq!(params[0].0, "id");
    }

    #[test]
    fn path_exists_distinguishes_404_from_405() {
        let mut trie = TrieNode::new();
        trie.insert(b"/users", 1, Arc::new("list_users")); // GET slot
        assert!(trie.path_exists(b"/users"));
        let mut params = Vec::new();
        assert!(trie.find(b"/users", 3, &mut params).is_none()); // POST slot: no handler
        assert!(!trie.path_exists(b"/nope"));
    }
}
