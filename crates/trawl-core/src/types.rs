use std::fmt;

use time::OffsetDateTime;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Three-valued on-disk flag used for inherited properties such as
/// "is shared".
///
/// `True` and `False` are authoritative; `Unknown` defers to the nearest
/// ancestor's resolved value, or to `True` at the root.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Unknown,
    False,
    True,
}

impl TriState {
    /// Map the on-disk encoding (0 = unknown, 1 = false, 2 = true) to a flag.
    /// Out-of-range values are treated as unknown; hostile images routinely
    /// contain them and the inheritance rule gives a usable answer anyway.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::False,
            2 => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Resolve against the parent's already-resolved value. A root node has
    /// no parent and passes `None`.
    pub fn resolve(self, parent: Option<bool>) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Unknown => parent.unwrap_or(true),
        }
    }
}

/// A normalized instant. Absence is a distinguishable state, not epoch zero.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp(
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    Option<OffsetDateTime>,
);

impl Timestamp {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn from_datetime(dt: OffsetDateTime) -> Self {
        Self(Some(dt))
    }

    pub fn from_unix_seconds(secs: i64) -> Self {
        OffsetDateTime::from_unix_timestamp(secs).map_or_else(|_| Self(None), |dt| Self(Some(dt)))
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn datetime(&self) -> Option<OffsetDateTime> {
        self.0
    }

    pub fn unix_seconds(&self) -> Option<i64> {
        self.0.map(OffsetDateTime::unix_timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(dt) => {
                let fmt_result = dt.format(&time::format_description::well_known::Rfc3339);
                match fmt_result {
                    Ok(s) => f.write_str(&s),
                    Err(_) => f.write_str("invalid"),
                }
            }
            None => f.write_str("absent"),
        }
    }
}

/// The fixed-width hash identifiers carried by artifact records.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Md5,
    Ed2k,
    Sha1,
    TigerTree,
}

impl HashKind {
    /// On-disk width in bytes.
    pub fn len(self) -> usize {
        match self {
            Self::Md5 | Self::Ed2k => 16,
            Self::Sha1 => 20,
            Self::TigerTree => 24,
        }
    }
}

/// Insertion-ordered flat string→string projection of a decoded record.
///
/// Built by the metadata projection step from an explicit whitelist; keys
/// not on the whitelist never reach this map. Inserting an existing key
/// updates the value in place without disturbing the original order.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatMetadata {
    entries: Vec<(String, String)>,
}

impl FlatMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Insert only when the value is non-empty; the empty string is the
    /// "not present" sentinel for hashes and optional text fields.
    pub fn insert_nonempty(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tristate_resolution() {
        // Root with Unknown resolves to true.
        assert!(TriState::Unknown.resolve(None));
        // Unknown under a resolved-false parent stays false.
        assert!(!TriState::Unknown.resolve(Some(false)));
        // Authoritative values ignore the parent.
        assert!(TriState::True.resolve(Some(false)));
        assert!(!TriState::False.resolve(Some(true)));
    }

    #[test]
    fn tristate_from_raw_tolerates_garbage() {
        assert_eq!(TriState::from_raw(0), TriState::Unknown);
        assert_eq!(TriState::from_raw(1), TriState::False);
        assert_eq!(TriState::from_raw(2), TriState::True);
        assert_eq!(TriState::from_raw(-7), TriState::Unknown);
        assert_eq!(TriState::from_raw(300), TriState::Unknown);
    }

    #[test]
    fn timestamp_absent_is_not_epoch() {
        assert!(Timestamp::absent().is_absent());
        assert!(!Timestamp::from_unix_seconds(0).is_absent());
        assert_eq!(Timestamp::from_unix_seconds(0).unix_seconds(), Some(0));
    }

    #[test]
    fn flat_metadata_preserves_insertion_order() {
        let mut meta = FlatMetadata::new();
        meta.insert("b", "2");
        meta.insert("a", "1");
        meta.insert("b", "3");
        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(meta.get("b"), Some("3"));
    }

    #[test]
    fn flat_metadata_skips_empty_values() {
        let mut meta = FlatMetadata::new();
        meta.insert_nonempty("hash", "");
        assert!(meta.is_empty());
        meta.insert_nonempty("hash", "abcd");
        assert_eq!(meta.get("hash"), Some("abcd"));
    }

    #[test]
    fn hash_kind_widths() {
        assert_eq!(HashKind::Md5.len(), 16);
        assert_eq!(HashKind::Ed2k.len(), 16);
        assert_eq!(HashKind::Sha1.len(), 20);
        assert_eq!(HashKind::TigerTree.len(), 24);
    }
}
