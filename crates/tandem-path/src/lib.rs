//! Paths into a hierarchical document tree.
//!
//! A [`Path`] is an ordered list of [`PathElement`] steps from the document
//! root: string keys address object properties and integers address sequence
//! slots. Paths are structural addresses, not stable identifiers; they change
//! when an ancestor is mutated.
//!
//! # Example
//!
//! ```
//! use tandem_path::{format_path, is_ancestor_of, parse_path, PathElement};
//!
//! let path = parse_path("/items/2/title");
//! assert_eq!(path[1], PathElement::Index(2));
//! assert_eq!(format_path(&path), "/items/2/title");
//!
//! let parent = parse_path("/items");
//! assert!(is_ancestor_of(&parent, &path));
//! ```

use thiserror::Error;

pub mod types;
pub use types::{Path, PathElement};

/// Unescapes a pointer path component.
///
/// `~1` is replaced with `/` and `~0` is replaced with `~`.
///
/// ```
/// use tandem_path::unescape_component;
///
/// assert_eq!(unescape_component("a~0b"), "a~b");
/// assert_eq!(unescape_component("c~1d"), "c/d");
/// ```
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    // ~1 must be replaced before ~0
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes a pointer path component.
///
/// ```
/// use tandem_path::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Parse a pointer string into a typed path.
///
/// The empty string is the root. Canonical non-negative integers (no leading
/// zeros) become [`PathElement::Index`], every other segment becomes a
/// [`PathElement::Key`].
///
/// ```
/// use tandem_path::{parse_path, PathElement};
///
/// assert!(parse_path("").is_empty());
/// assert_eq!(
///     parse_path("/a/0/01"),
///     vec![
///         PathElement::Key("a".into()),
///         PathElement::Index(0),
///         PathElement::Key("01".into()),
///     ]
/// );
/// ```
pub fn parse_path(pointer: &str) -> Path {
    if pointer.is_empty() {
        return Vec::new();
    }
    let body = pointer.strip_prefix('/').unwrap_or(pointer);
    body.split('/')
        .map(|segment| {
            let segment = unescape_component(segment);
            if is_valid_index(&segment) {
                match segment.parse::<usize>() {
                    Ok(i) => PathElement::Index(i),
                    Err(_) => PathElement::Key(segment),
                }
            } else {
                PathElement::Key(segment)
            }
        })
        .collect()
}

/// Format a typed path as a pointer string. The root formats as `""`.
pub fn format_path(path: &[PathElement]) -> String {
    let mut out = String::new();
    for step in path {
        out.push('/');
        match step {
            PathElement::Index(i) => out.push_str(&i.to_string()),
            PathElement::Key(k) => out.push_str(&escape_component(k)),
        }
    }
    out
}

/// Check if a path points to the document root.
pub fn is_root(path: &[PathElement]) -> bool {
    path.is_empty()
}

/// Returns true iff `ancestor` is a strict prefix of `descendant`.
///
/// ```
/// use tandem_path::{is_ancestor_of, parse_path};
///
/// assert!(is_ancestor_of(&parse_path("/a"), &parse_path("/a/1")));
/// assert!(!is_ancestor_of(&parse_path("/a"), &parse_path("/a")));
/// assert!(!is_ancestor_of(&parse_path("/a/1"), &parse_path("/a")));
/// ```
pub fn is_ancestor_of(ancestor: &[PathElement], descendant: &[PathElement]) -> bool {
    ancestor.len() < descendant.len() && descendant.starts_with(ancestor)
}

/// Check if two paths are equal.
pub fn is_path_equal(p1: &[PathElement], p2: &[PathElement]) -> bool {
    p1 == p2
}

/// Get the parent path of a given path.
///
/// # Errors
///
/// Returns [`PathError::NoParent`] for the root path.
pub fn parent(path: &[PathElement]) -> Result<Path, PathError> {
    match path.split_last() {
        Some((_, rest)) => Ok(rest.to_vec()),
        None => Err(PathError::NoParent),
    }
}

/// Check if a string is a canonical non-negative integer index.
///
/// ```
/// use tandem_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("123"));
/// assert!(!is_valid_index("007"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index(""));
/// ```
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("the root path has no parent")]
    NoParent,
}
