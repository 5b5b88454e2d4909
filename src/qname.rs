//! Namespace-qualified names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A qualified XML name: namespace URI, local part and prefix.
///
/// Two names are equal when their namespace URI and local part are equal;
/// the prefix is presentation only and takes no part in equality, hashing or
/// ordering.
///
/// ```
/// use adaptive_xml::QName;
///
/// let a = QName::with_prefix("urn:x", "item", "x");
/// let b = QName::with_prefix("urn:x", "item", "y");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "x{urn:x}item");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QName {
    #[serde(default)]
    namespace_uri: String,
    local_part: String,
    #[serde(default)]
    prefix: String,
}

impl QName {
    /// Creates a name with no namespace.
    pub fn local<S: Into<String>>(local_part: S) -> Self {
        Self {
            namespace_uri: String::new(),
            local_part: local_part.into(),
            prefix: String::new(),
        }
    }

    /// Creates a name in `namespace_uri` without a preferred prefix.
    pub fn new<N: Into<String>, L: Into<String>>(namespace_uri: N, local_part: L) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_part: local_part.into(),
            prefix: String::new(),
        }
    }

    /// Creates a fully specified name.
    pub fn with_prefix<N, L, P>(namespace_uri: N, local_part: L, prefix: P) -> Self
    where
        N: Into<String>,
        L: Into<String>,
        P: Into<String>,
    {
        Self {
            namespace_uri: namespace_uri.into(),
            local_part: local_part.into(),
            prefix: prefix.into(),
        }
    }

    /// The namespace URI, empty when the name has no namespace.
    #[inline]
    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    /// The local part.
    #[inline]
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// The preferred prefix, empty for the default namespace.
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` if the local part is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.local_part.is_empty()
    }

    /// Same name with another prefix.
    pub fn prefixed<P: Into<String>>(&self, prefix: P) -> Self {
        Self {
            namespace_uri: self.namespace_uri.clone(),
            local_part: self.local_part.clone(),
            prefix: prefix.into(),
        }
    }

    /// `prefix:local` or plain `local`.
    pub fn raw_name(&self) -> String {
        if self.prefix.is_empty() {
            self.local_part.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_part)
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace_uri == other.namespace_uri && self.local_part == other.local_part
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace_uri.hash(state);
        self.local_part.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.namespace_uri, &self.local_part).cmp(&(&other.namespace_uri, &other.local_part))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        if !self.namespace_uri.is_empty() {
            write!(f, "{{{}}}", self.namespace_uri)?;
        }
        f.write_str(&self.local_part)
    }
}

impl From<&str> for QName {
    fn from(local_part: &str) -> Self {
        QName::local(local_part)
    }
}

impl From<String> for QName {
    fn from(local_part: String) -> Self {
        QName::local(local_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prefix_ignored_by_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(QName::with_prefix("urn:a", "x", "p"));
        assert!(set.contains(&QName::with_prefix("urn:a", "x", "q")));
        assert!(!set.contains(&QName::new("urn:b", "x")));
    }

    #[test]
    fn test_display() {
        assert_eq!(QName::local("a").to_string(), "a");
        assert_eq!(QName::new("urn:a", "b").to_string(), "{urn:a}b");
        assert_eq!(QName::with_prefix("urn:a", "b", "p").to_string(), "p{urn:a}b");
    }

    #[test]
    fn test_raw_name() {
        assert_eq!(QName::with_prefix("urn:a", "b", "p").raw_name(), "p:b");
        assert_eq!(QName::new("urn:a", "b").raw_name(), "b");
    }
}
