/// A parsed request-target, borrowed from whatever buffer holds the raw
/// bytes (the connection's read buffer while parsing, or a region-owned
/// copy once promoted into a `Req`).
///
/// `spec.md` §4.3 has the parser adapter scan the raw URL for `?` at
/// message-complete and truncate the URL length to the path length; the
/// query substring is tokenized separately into the query-params map
/// (`crate::http::query`). `RequestUri` itself just exposes the two slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestUri<'a> {
    full: &'a str,
    path_start: usize,
    path_end: usize,
}

impl<'a> RequestUri<'a> {
    pub fn new(full: &'a str, path_start: usize, path_end: usize) -> Self {
        debug_assert!(path_start <= path_end);
        debug_assert!(path_end <= full.len());
        RequestUri {
            full,
            path_start,
            path_end,
        }
    }

    /// The full request-target as received (may include scheme/authority
    /// for proxy-form requests, or be `*` for `OPTIONS *`).
    pub fn full(&self) -> &'a str {
        self.full
    }

    pub fn path(&self) -> &'a str {
        &self.full[self.path_start..self.path_end]
    }

    /// Raw query string (everything after `?`, before any `#`), not
    /// URL-decoded — `spec.md` §4.3 performs no decoding at this layer.
    pub fn query(&self) -> Option<&'a str> {
        let after_path = &self.full[self.path_end..];
        let rest = after_path.strip_prefix('?')?;
        Some(match rest.find('#') {
            Some(idx) => &rest[..idx],
            None => rest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_query_split() {
        let uri = RequestUri::new("/search?page=1&limit=10", 0, 7);
        assert_eq!(uri.path(), "/search");
        assert_eq!(uri.query(), Some("page=1&limit=10"));
    }

    #[test]
    fn no_query_returns_none() {
        let uri = RequestUri::new("/users/42", 0, 9);
        assert_eq!(uri.query(), None);
    }

    #[test]
    fn asterisk_form_has_no_path_segments() {
        let uri = RequestUri::new("*", 0, 1);
        assert_eq!(uri.path(), "*");
        assert_eq!(uri.query(), None);
    }
}
