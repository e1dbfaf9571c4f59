//! Prefix to namespace resolution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const TAL_NS: &str = "http://xml.zope.org/namespaces/tal";
pub const METAL_NS: &str = "http://xml.zope.org/namespaces/metal";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// A namespace-resolved name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        QName {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    pub fn is_in(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Splits `prefix:local`; unprefixed names have no prefix.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, name),
    }
}

/// Prefix bindings in effect for one open element.
///
/// The empty prefix holds the default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: HashMap<String, String>,
}

impl Default for NamespaceScope {
    fn default() -> Self {
        Self::root()
    }
}

impl NamespaceScope {
    /// The document-level scope with `tal`, `metal` and `xml` pre-bound.
    pub fn root() -> Self {
        let bindings = [("tal", TAL_NS), ("metal", METAL_NS), ("xml", XML_NS)]
            .into_iter()
            .map(|(p, ns)| (p.to_string(), ns.to_string()))
            .collect();
        NamespaceScope { bindings }
    }

    /// A copy of this scope with the `xmlns` declarations among `attributes` applied.
    pub fn child<'n, I>(&self, attributes: I) -> NamespaceScope
    where
        I: IntoIterator<Item = (&'n str, &'n str)>,
    {
        let mut scope = self.clone();
        for (name, value) in attributes {
            if name == "xmlns" {
                scope.bind("", value);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                scope.bind(prefix, value);
            }
        }
        scope
    }

    pub fn bind(&mut self, prefix: &str, namespace: &str) {
        self.bindings.insert(prefix.to_string(), namespace.to_string());
    }

    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.lookup("").filter(|ns| !ns.is_empty())
    }

    /// Resolves a tag or attribute name.
    ///
    /// Returns the undefined prefix on failure.
    pub fn resolve<'n>(&self, name: &'n str) -> Result<QName, &'n str> {
        if name == "xmlns" {
            return Ok(QName::new(Some(XMLNS_NS), "xmlns"));
        }
        match split_qualified(name) {
            (Some("xmlns"), local) => Ok(QName::new(Some(XMLNS_NS), local)),
            (Some(prefix), local) => match self.lookup(prefix) {
                Some(ns) => Ok(QName::new(Some(ns), local)),
                None => Err(prefix),
            },
            (None, local) => Ok(QName::new(self.default_namespace(), local)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_scope_predefines_directive_prefixes() {
        let scope = NamespaceScope::root();
        assert_eq!(scope.lookup("tal"), Some(TAL_NS));
        assert_eq!(scope.lookup("metal"), Some(METAL_NS));
        assert_eq!(scope.resolve("tal:define").unwrap(), QName::new(Some(TAL_NS), "define"));
    }

    #[test]
    fn test_unprefixed_names_use_default_namespace() {
        let root = NamespaceScope::root();
        assert_eq!(root.resolve("div").unwrap(), QName::new(None, "div"));

        let xhtml = root.child([("xmlns", "http://www.w3.org/1999/xhtml")]);
        assert_eq!(
            xhtml.resolve("div").unwrap(),
            QName::new(Some("http://www.w3.org/1999/xhtml"), "div")
        );
    }

    #[test]
    fn test_child_scope_does_not_leak_to_parent() {
        let root = NamespaceScope::root();
        let child = root.child([("xmlns:x", "urn:x"), ("class", "ignored")]);
        assert!(child.resolve("x:item").is_ok());
        assert_eq!(root.resolve("x:item"), Err("x"));
    }

    #[test]
    fn test_redeclared_prefix_overrides() {
        let scope = NamespaceScope::root().child([("xmlns:tal", "urn:other")]);
        assert_eq!(scope.resolve("tal:content").unwrap().namespace.as_deref(), Some("urn:other"));
    }

    #[test]
    fn test_xmlns_attributes_resolve_to_xmlns_namespace() {
        let scope = NamespaceScope::root();
        assert!(scope.resolve("xmlns:tal").unwrap().is_in(XMLNS_NS));
        assert!(scope.resolve("xmlns").unwrap().is_in(XMLNS_NS));
    }
}
