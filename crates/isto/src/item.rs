//! Data items and tags.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tag name → tag value mapping on a data item.
///
/// Only tag names declared in the configuration are persisted;
/// undeclared keys are discarded at insert time, and declared tags
/// not supplied default to the empty string.
pub type Tags = BTreeMap<String, String>;

/// An immutable timestamped blob, the unit of storage.
///
/// The timestamp is rounded to the textual codec's precision
/// (microseconds) at construction, so the in-memory instant always
/// equals the instant that will be persisted.
///
/// # Example
///
/// ```
/// use isto::DataItem;
///
/// let item = DataItem::new("frame-000001.bin", vec![0u8; 64], chrono::Utc::now())
///     .with_tag("camera", "left");
/// assert!(item.is_valid);
/// assert!(!item.is_permanent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    /// Item identifier; doubles as the content file name.
    pub id: String,
    /// The blob, possibly empty.
    pub data: Vec<u8>,
    /// Absolute instant, rounded to microsecond precision.
    pub timestamp: DateTime<Utc>,
    /// Tier assignment.
    pub is_permanent: bool,
    /// Distinguishes a real item from the not-found sentinel.
    pub is_valid: bool,
    /// Tag values keyed by tag name.
    pub tags: Tags,
}

impl DataItem {
    /// Creates a rotating, untagged item.
    #[must_use]
    pub fn new(id: impl Into<String>, data: impl Into<Vec<u8>>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            timestamp: isto_timefmt::round(timestamp),
            is_permanent: false,
            is_valid: true,
            tags: Tags::new(),
        }
    }

    /// Sets the tier assignment.
    #[must_use]
    pub fn permanent(mut self, value: bool) -> Self {
        self.is_permanent = value;
        self
    }

    /// Adds a single tag.
    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// The not-found sentinel.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            id: String::new(),
            data: Vec::new(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            is_permanent: false,
            is_valid: false,
            tags: Tags::new(),
        }
    }

    /// Size of the blob in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Checks that an id is usable as a file name inside a tier tree.
pub(crate) fn id_is_legal(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c == '\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn construction_rounds_timestamp() {
        let t = Utc::now() + Duration::nanoseconds(123);
        let item = DataItem::new("a.bin", b"xyz".to_vec(), t);
        assert_eq!(item.timestamp, isto_timefmt::round(t));
        let delta = (t - item.timestamp).num_microseconds().unwrap().abs();
        assert!(delta < 1);
    }

    #[test]
    fn invalid_sentinel() {
        let item = DataItem::invalid();
        assert!(!item.is_valid);
        assert!(item.id.is_empty());
        assert!(item.data.is_empty());
    }

    #[test]
    fn builders() {
        let item = DataItem::new("a.bin", Vec::new(), Utc::now())
            .permanent(true)
            .with_tag("camera", "left");
        assert!(item.is_permanent);
        assert_eq!(item.tags.get("camera").map(String::as_str), Some("left"));
        assert_eq!(item.size(), 0);
    }

    #[test]
    fn id_legality() {
        assert!(id_is_legal("frame-1.bin"));
        assert!(id_is_legal("2022-01-02T03_04_05.000000.msg"));
        assert!(!id_is_legal(""));
        assert!(!id_is_legal("a/b"));
        assert!(!id_is_legal("a\\b"));
        assert!(!id_is_legal("a b"));
    }
}
