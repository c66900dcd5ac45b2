#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! User attributes are an opaque, caller-supplied map attached to most
//! trace IR objects (field classes, structure members, variant
//! options, event classes, ...). This crate only specifies the
//! minimal value representation needed to attach, clone, and freeze
//! such a map; it is not a general-purpose value system — a richer
//! generic value/attribute container belongs to a different, wider
//! layer of a complete trace-processing stack and is out of scope
//! here.

use std::collections::BTreeMap;

/// A single attribute value.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum AttributeValue {
    /// A boolean value.
    Bool(bool),
    /// An unsigned 64-bit value.
    UInt(u64),
    /// A signed 64-bit value.
    SInt(i64),
    /// A double-precision value.
    Double(f64),
    /// A UTF-8 string value.
    String(String),
    /// An ordered list of values.
    Array(Vec<AttributeValue>),
    /// A nested map of values.
    Map(UserAttributes),
}

/// A map of user-supplied key/value pairs, attached to a trace IR
/// object at construction time and frozen along with it.
///
/// Iteration order follows key order (a `BTreeMap`) so that two
/// attribute maps built from the same entries compare and print
/// identically regardless of insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserAttributes {
    entries: BTreeMap<String, AttributeValue>,
}

impl UserAttributes {
    /// Creates an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an entry, overwriting any previous value for `key`.
    ///
    /// This map carries no freeze state of its own: the owning trace
    /// IR object's `&mut self` requirement is what stops a caller from
    /// reaching a `UserAttributes` through a frozen object in the
    /// first place.
    pub fn set(&mut self, key: impl Into<String>, value: AttributeValue) {
        let _ = self.entries.insert(key.into(), value);
    }

    /// Returns the value associated with `key`, if any.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    /// Returns `true` if no entries are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, AttributeValue)> for UserAttributes {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut attrs = UserAttributes::new();
        attrs.set("retries", AttributeValue::UInt(3));
        assert_eq!(attrs.get("retries"), Some(&AttributeValue::UInt(3)));
        assert_eq!(attrs.get("missing"), None);
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut attrs = UserAttributes::new();
        attrs.set("k", AttributeValue::Bool(true));
        attrs.set("k", AttributeValue::Bool(false));
        assert_eq!(attrs.get("k"), Some(&AttributeValue::Bool(false)));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn iteration_is_key_ordered() {
        let attrs: UserAttributes = [
            ("zebra".to_string(), AttributeValue::Bool(true)),
            ("alpha".to_string(), AttributeValue::Bool(false)),
        ]
        .into_iter()
        .collect();

        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha", "zebra"]);
    }
}
