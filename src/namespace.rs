//! Scoped namespace bindings.
//!
//! A single stack of `prefix -> uri` bindings tagged with the element depth
//! that declared them. Entering an element pushes a scope; leaving it drops
//! every binding that scope declared. The reader side uses it to resolve
//! prefixes, the writer side to decide which declarations must be emitted.

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of `xmlns` attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

#[derive(Debug, Clone)]
struct Binding {
    prefix: String,
    uri: String,
    depth: usize,
}

/// Stack of in-scope namespace bindings.
#[derive(Debug, Clone)]
pub struct NamespaceScopes {
    bindings: Vec<Binding>,
    depth: usize,
    generated: usize,
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScopes {
    /// Creates a stack with only the `xml` prefix bound.
    pub fn new() -> Self {
        Self {
            bindings: vec![Binding {
                prefix: "xml".to_string(),
                uri: XML_NAMESPACE.to_string(),
                depth: 0,
            }],
            depth: 0,
            generated: 0,
        }
    }

    /// Enters an element scope.
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leaves an element scope, dropping its bindings.
    pub fn pop_scope(&mut self) {
        while matches!(self.bindings.last(), Some(b) if b.depth >= self.depth && b.depth > 0) {
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Binds `prefix` (empty for the default namespace) in the current scope.
    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.push(Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            depth: self.depth,
        });
    }

    /// URI bound to `prefix`. The empty prefix resolves the default namespace.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// Returns `true` if `prefix` currently resolves to `uri`.
    ///
    /// An unbound default prefix counts as bound to the empty namespace.
    pub fn is_bound(&self, prefix: &str, uri: &str) -> bool {
        match self.resolve(prefix) {
            Some(bound) => bound == uri,
            None => prefix.is_empty() && uri.is_empty(),
        }
    }

    /// A non-empty prefix currently bound to `uri` and not shadowed.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| b.uri == uri && !b.prefix.is_empty())
            .map(|b| b.prefix.as_str())
            .find(|prefix| self.resolve(prefix) == Some(uri))
    }

    /// A fresh prefix not bound in any visible scope.
    pub fn generate_prefix(&mut self) -> String {
        loop {
            self.generated += 1;
            let candidate = format!("ns{}", self.generated);
            if self.resolve(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Current element depth.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_bindings() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("a", "urn:outer");
        scopes.push_scope();
        scopes.declare("a", "urn:inner");
        assert_eq!(scopes.resolve("a"), Some("urn:inner"));
        scopes.pop_scope();
        assert_eq!(scopes.resolve("a"), Some("urn:outer"));
        scopes.pop_scope();
        assert_eq!(scopes.resolve("a"), None);
        assert_eq!(scopes.resolve("xml"), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_default_namespace() {
        let mut scopes = NamespaceScopes::new();
        assert!(scopes.is_bound("", ""));
        scopes.push_scope();
        scopes.declare("", "urn:d");
        assert!(scopes.is_bound("", "urn:d"));
        assert!(!scopes.is_bound("", ""));
    }

    #[test]
    fn test_prefix_for_skips_shadowed() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("p", "urn:one");
        scopes.push_scope();
        scopes.declare("p", "urn:two");
        assert_eq!(scopes.prefix_for("urn:one"), None);
        assert_eq!(scopes.prefix_for("urn:two"), Some("p"));
    }

    #[test]
    fn test_generate_prefix_avoids_bound() {
        let mut scopes = NamespaceScopes::new();
        scopes.push_scope();
        scopes.declare("ns1", "urn:taken");
        assert_eq!(scopes.generate_prefix(), "ns2");
    }
}
