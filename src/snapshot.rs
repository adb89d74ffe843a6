//! Entries, snapshots and the import/export JSON format.
//!
//! A [`Snapshot`] keeps entries in the order the backend returned them.
//! Export writes a flat JSON object indented with four spaces; import
//! accepts the same shape.

// ============================================================================
// Imports
// ============================================================================

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Indentation used for exported JSON.
const EXPORT_INDENT: &[u8] = b"    ";

// ============================================================================
// Entry
// ============================================================================

/// A single key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "(String, String)")]
pub struct Entry {
    /// Key (cookie name for cookie targets).
    pub key: String,
    /// Value.
    pub value: String,
}

impl Entry {
    /// Creates a new entry.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<(String, String)> for Entry {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Ordered entries from one full read of a target.
///
/// Keys are unique; inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<Entry>")]
pub struct Snapshot {
    entries: Vec<Entry>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Returns `true` if `key` is present.
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces an entry, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(Entry { key, value }),
        }
    }

    /// Removes an entry, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|entry| entry.key == key)?;
        Some(self.entries.remove(index).value)
    }

    /// Iterates entries in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Iterates keys in snapshot order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    /// Consumes the snapshot, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Serializes as a flat JSON object with four-space indentation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut buffer = Vec::with_capacity(64 + self.entries.len() * 32);
        let formatter = PrettyFormatter::with_indent(EXPORT_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buffer).map_err(|e| Error::protocol(e.to_string()))
    }
}

impl From<Vec<Entry>> for Snapshot {
    fn from(entries: Vec<Entry>) -> Self {
        entries.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

impl FromIterator<Entry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        iter.into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect()
    }
}

impl IntoIterator for Snapshot {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key, &entry.value)?;
        }
        map.end()
    }
}

// ============================================================================
// Import Parsing
// ============================================================================

/// Parses import text into entries, in document order.
///
/// The text must be a JSON object. String values are taken as-is; numbers,
/// booleans and `null` are stored as their JSON text, the way page storage
/// coerces them. Nested arrays or objects reject the whole document.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the text is not a flat object.
pub fn parse_import(text: &str) -> Result<Vec<Entry>> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| Error::malformed_input(format!("invalid JSON: {e}")))?;

    let Value::Object(map) = value else {
        return Err(Error::malformed_input("expected a JSON object"));
    };

    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => "null".to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(Error::malformed_input(format!(
                        "value for \"{key}\" is not a scalar"
                    )));
                }
            };
            Ok(Entry { key, value })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::error::Failure;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut snapshot: Snapshot = [("a", "1"), ("b", "2")].into_iter().collect();
        snapshot.insert("a", "3");

        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(snapshot.get("a"), Some("3"));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut snapshot: Snapshot = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(snapshot.remove("a"), Some("1".to_string()));
        assert_eq!(snapshot.remove("a"), None);
        assert!(!snapshot.contains_key("a"));
    }

    #[test]
    fn test_export_format() {
        let snapshot: Snapshot = [("token", "abc"), ("theme", "dark")].into_iter().collect();
        let json = snapshot.to_pretty_json().expect("export");
        assert_eq!(json, "{\n    \"token\": \"abc\",\n    \"theme\": \"dark\"\n}");
    }

    #[test]
    fn test_export_empty() {
        assert_eq!(Snapshot::new().to_pretty_json().expect("export"), "{}");
    }

    #[test]
    fn test_export_keeps_order() {
        let snapshot: Snapshot = [("z", "1"), ("a", "2"), ("m", "3")].into_iter().collect();
        let json = snapshot.to_pretty_json().expect("export");
        let entries = parse_import(&json).expect("parse");
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_parse_import_scalars() {
        let entries = parse_import(r#"{"a":"1","n":2,"t":true,"z":null}"#).expect("parse");
        let snapshot: Snapshot = entries.into_iter().collect();
        assert_eq!(snapshot.get("a"), Some("1"));
        assert_eq!(snapshot.get("n"), Some("2"));
        assert_eq!(snapshot.get("t"), Some("true"));
        assert_eq!(snapshot.get("z"), Some("null"));
    }

    #[test]
    fn test_parse_import_rejects() {
        for text in ["", "not json", "[1,2]", "\"str\"", r#"{"a":{"b":"c"}}"#, r#"{"a":[1]}"#] {
            let err = parse_import(text).expect_err(text);
            assert_eq!(err.reason(), Failure::MalformedInput, "{text}");
        }
    }

    #[test]
    fn test_deserialize_pairs() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"[["b","2"],["a","1"]]"#).expect("parse pairs");
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    proptest! {
        #[test]
        fn prop_export_import_round_trip(
            pairs in proptest::collection::vec(("[a-zA-Z0-9_\\-\\. ]{1,12}", ".{0,24}"), 0..16)
        ) {
            let snapshot: Snapshot = pairs.into_iter().collect();
            let json = snapshot.to_pretty_json().expect("export");
            let restored: Snapshot = parse_import(&json).expect("import").into_iter().collect();
            prop_assert_eq!(restored, snapshot);
        }
    }
}
