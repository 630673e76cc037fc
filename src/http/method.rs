use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// HTTP request method.
///
/// The route trie's method index (`spec.md` §4.4) only has slots for the
/// seven variants below; anything else parses fine but always surfaces as
/// "not found" at match time (`Method::trie_index` returns `None`).
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Other(String),
}

/// Number of method slots in the route trie's per-node handler table.
pub const METHOD_SLOTS: usize = 7;

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        match value {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            other => Method::Other(other.to_string()),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Other(s) => s.as_str(),
        }
    }

    /// Dense index into the trie's per-node method table, or `None` for
    /// methods the trie does not support.
    pub fn trie_index(&self) -> Option<usize> {
        match self {
            Method::Delete => Some(0),
            Method::Get => Some(1),
            Method::Head => Some(2),
            Method::Post => Some(3),
            Method::Put => Some(4),
            Method::Options => Some(5),
            Method::Patch => Some(6),
            Method::Other(_) => None,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Method::from(s))
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for Method {
    fn eq(&self, other: &&str) -> bool {
        self.as_str().eq_ignore_ascii_case(other)
    }
}

impl PartialEq<String> for Method {
    fn eq(&self, other: &String) -> bool {
        self.as_str().eq_ignore_ascii_case(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_round_trip() {
        for m in ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"] {
            assert_eq!(Method::from(m).as_str(), m);
        }
    }

    #[test]
    fn trie_index_is_dense_and_distinct() {
        let known = [
            Method::Get,
            Method::Head,
            Method::Post,
            Method::Put,
            Method::Patch,
            Method::Delete,
            Method::Options,
        ];
        let mut seen = [false; METHOD_SLOTS];
        for m in &known {
            let i = m.trie_index().expect("known method has an index");
            assert!(!seen[i], "duplicate trie index");
            seen[i] = true;
        }
        assert!(seen.iter().all(|&b| b));
    }

    #[test]
    fn unsupported_method_has_no_trie_index() {
        assert_eq!(Method::from("TRACE").trie_index(), None);
        assert_eq!(Method::from("CONNECT").trie_index(), None);
    }
}
