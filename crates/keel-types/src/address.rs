//! Resource addresses
//!
//! A [`PathAddress`] is an ordered list of `(key, value)` segments leading from
//! the model root to one resource, e.g. `/interface=public` or
//! `/host=master/server=one`. Addresses are plain values: two addresses with the
//! same segments are equal regardless of where they were built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Segment value that matches any name in a registration pattern
pub const WILDCARD: &str = "*";

/// Errors raised while parsing an address from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("Address must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("Malformed address segment '{segment}' in {address}")]
    MalformedSegment { address: String, segment: String },
}

/// One `(key, value)` step of an address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct PathElement {
    key: String,
    value: String,
}

impl PathElement {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A pattern element matching every resource of the given child type
    pub fn wildcard(key: impl Into<String>) -> Self {
        Self::new(key, WILDCARD)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }

    /// Whether this pattern element matches a concrete element
    pub fn matches(&self, element: &PathElement) -> bool {
        self.key == element.key && (self.is_wildcard() || self.value == element.value)
    }
}

impl From<(String, String)> for PathElement {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}

impl From<PathElement> for (String, String) {
    fn from(element: PathElement) -> Self {
        (element.key, element.value)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered path from the model root to a resource
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PathAddress(Vec<PathElement>);

impl PathAddress {
    /// The address of the model root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }

    /// Convenience constructor from `(key, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| PathElement::new(k, v))
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.0.iter()
    }

    /// The last segment; its value is the resource's local name
    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    /// The address one level up, `None` for the root
    pub fn parent(&self) -> Option<PathAddress> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// A new address with `element` appended
    pub fn append(&self, element: PathElement) -> PathAddress {
        let mut elements = self.0.clone();
        elements.push(element);
        Self(elements)
    }

    /// True when `self` is a strict prefix of `other`
    pub fn is_ancestor_of(&self, other: &PathAddress) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Equal, ancestor or descendant
    pub fn is_related_to(&self, other: &PathAddress) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// Whether this address matches a registration pattern
    pub fn matches(&self, pattern: &PathAddress) -> bool {
        self.0.len() == pattern.0.len()
            && pattern
                .0
                .iter()
                .zip(self.0.iter())
                .all(|(p, e)| p.matches(e))
    }

    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(PathElement::is_wildcard)
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for element in &self.0 {
            write!(f, "/{}", element)?;
        }
        Ok(())
    }
}

impl FromStr for PathAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = trimmed
            .strip_prefix('/')
            .ok_or_else(|| AddressParseError::MissingLeadingSlash(trimmed.to_string()))?;
        if rest.is_empty() {
            return Ok(PathAddress::root());
        }

        let mut elements = Vec::new();
        for segment in rest.split('/') {
            match segment.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                    elements.push(PathElement::new(key, value));
                }
                _ => {
                    return Err(AddressParseError::MalformedSegment {
                        address: trimmed.to_string(),
                        segment: segment.to_string(),
                    })
                }
            }
        }
        Ok(PathAddress(elements))
    }
}

impl From<Vec<PathElement>> for PathAddress {
    fn from(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }
}

impl<'a> IntoIterator for &'a PathAddress {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let a = addr("/host=master/interface=public");
        assert_eq!(a.len(), 2);
        assert_eq!(a.last().unwrap().value(), "public");
        assert_eq!(a.to_string(), "/host=master/interface=public");
        assert_eq!(addr("/"), PathAddress::root());
        assert_eq!(PathAddress::root().to_string(), "/");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "host=master".parse::<PathAddress>(),
            Err(AddressParseError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            "/host".parse::<PathAddress>(),
            Err(AddressParseError::MalformedSegment { .. })
        ));
        assert!("/host=".parse::<PathAddress>().is_err());
    }

    #[test]
    fn test_structural_equality() {
        let built = PathAddress::root()
            .append(PathElement::new("host", "master"))
            .append(PathElement::new("interface", "public"));
        assert_eq!(built, addr("/host=master/interface=public"));
    }

    #[test]
    fn test_relations() {
        let host = addr("/host=master");
        let iface = addr("/host=master/interface=public");
        let other = addr("/host=slave");

        assert!(host.is_ancestor_of(&iface));
        assert!(!iface.is_ancestor_of(&host));
        assert!(!host.is_ancestor_of(&host));
        assert!(host.is_related_to(&iface));
        assert!(iface.is_related_to(&host));
        assert!(!host.is_related_to(&other));
        assert!(PathAddress::root().is_related_to(&other));
        assert_eq!(iface.parent(), Some(host));
        assert_eq!(PathAddress::root().parent(), None);
    }

    #[test]
    fn test_pattern_matching() {
        let pattern = addr("/host=*/interface=public");
        assert!(addr("/host=a/interface=public").matches(&pattern));
        assert!(!addr("/host=a/interface=private").matches(&pattern));
        assert!(!addr("/host=a").matches(&pattern));
        assert!(pattern.has_wildcard());
    }

    #[test]
    fn test_serde_pairs() {
        let a = addr("/interface=public");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"[["interface","public"]]"#);
        let back: PathAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
