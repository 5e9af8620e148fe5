//! Type definitions for document paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A step in a document path.
///
/// Either an object property key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Index(usize),
    Key(String),
}

/// A path from the document root to an element.
pub type Path = Vec<PathElement>;

impl PathElement {
    /// Returns the index if this step addresses a sequence slot.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathElement::Index(i) => Some(*i),
            PathElement::Key(_) => None,
        }
    }

    /// Returns the key if this step addresses an object property.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathElement::Key(k) => Some(k),
            PathElement::Index(_) => None,
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Index(i) => write!(f, "{i}"),
            PathElement::Key(k) => f.write_str(k),
        }
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        assert_eq!(PathElement::Index(3).as_index(), Some(3));
        assert_eq!(PathElement::Index(3).as_key(), None);
        assert_eq!(PathElement::from("foo").as_key(), Some("foo"));
        assert_eq!(PathElement::from("foo").as_index(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(PathElement::Index(7).to_string(), "7");
        assert_eq!(PathElement::from("bar").to_string(), "bar");
    }

    #[test]
    fn test_serde_untagged() {
        let path: Path = vec!["items".into(), 2.into(), "title".into()];
        let encoded = serde_json::to_value(&path).unwrap();
        assert_eq!(encoded, json!(["items", 2, "title"]));
        let decoded: Path = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, path);
    }
}
