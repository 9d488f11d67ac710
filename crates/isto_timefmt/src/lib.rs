//! # isto timefmt
//!
//! Fixed-width textual timestamps for isto.
//!
//! Instants are rendered as `YYYY-MM-DDTHH:MM:SS.ffffff`: 26
//! characters, microsecond precision, UTC. The layout is chosen so
//! that lexicographic ordering of the strings equals temporal
//! ordering of the instants; both the SQL index (`ORDER BY`, range
//! predicates) and the time-bucketed directory tree depend on this.
//!
//! ## Usage
//!
//! ```
//! use chrono::{TimeZone, Utc};
//!
//! let t = Utc.with_ymd_and_hms(2022, 3, 14, 15, 9, 26).unwrap();
//! let s = isto_timefmt::encode(t);
//! assert_eq!(s, "2022-03-14T15:09:26.000000");
//! assert_eq!(isto_timefmt::decode(&s).unwrap(), t);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Length of an encoded timestamp.
pub const ENCODED_LEN: usize = 26;

/// Byte range of the `YYYY-MM-DD` date component.
pub const DATE_RANGE: std::ops::Range<usize> = 0..10;

/// Byte range of the `HH` hour component.
pub const HOUR_RANGE: std::ops::Range<usize> = 11..13;

/// Byte range of the `MM` minute component.
pub const MINUTE_RANGE: std::ops::Range<usize> = 14..16;

/// Encoded form of the earliest instant the format can represent.
pub const MIN_ENCODED: &str = "0000-01-01T00:00:00.000000";

/// Encoded form of the latest instant the format can represent.
pub const MAX_ENCODED: &str = "9999-12-31T23:59:59.999999";

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Result type for decoding.
pub type TimeFmtResult<T> = Result<T, TimeFmtError>;

/// Errors produced when decoding a timestamp string.
#[derive(Debug, Error)]
pub enum TimeFmtError {
    /// The input does not have the fixed 26-character layout.
    #[error("timestamp has wrong length: expected {ENCODED_LEN} characters, got {actual} in {input:?}")]
    WrongLength {
        /// Actual input length.
        actual: usize,
        /// The offending input.
        input: String,
    },

    /// The input has the right shape but is not a valid instant.
    #[error("unparseable timestamp {input:?}: {source}")]
    Unparseable {
        /// The offending input.
        input: String,
        /// Underlying parse error.
        source: chrono::ParseError,
    },
}

/// Encodes an instant into the fixed-width sortable form.
///
/// Sub-microsecond precision is truncated; `decode(&encode(t))`
/// differs from `t` by less than one microsecond.
#[must_use]
pub fn encode(timestamp: DateTime<Utc>) -> String {
    let encoded = timestamp.format(FORMAT).to_string();
    debug_assert_eq!(encoded.len(), ENCODED_LEN);
    encoded
}

/// Decodes a string produced by [`encode`] back into an instant.
///
/// # Errors
///
/// Returns an error if the input is not exactly [`ENCODED_LEN`]
/// characters or does not parse as a valid UTC instant.
pub fn decode(input: &str) -> TimeFmtResult<DateTime<Utc>> {
    if input.len() != ENCODED_LEN {
        return Err(TimeFmtError::WrongLength {
            actual: input.len(),
            input: input.to_string(),
        });
    }
    let naive =
        NaiveDateTime::parse_from_str(input, FORMAT).map_err(|source| TimeFmtError::Unparseable {
            input: input.to_string(),
            source,
        })?;
    Ok(naive.and_utc())
}

/// Rounds an instant to the precision the textual form can carry.
///
/// Persisted timestamps are always rounded, so comparing a live
/// instant against a stored one requires rounding the live side
/// first. Equivalent to `decode(&encode(t))`.
#[must_use]
pub fn round(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    decode(&encode(timestamp)).expect("encode always yields a decodable timestamp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn encode_is_fixed_width() {
        let t = Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap();
        let s = encode(t);
        assert_eq!(s.len(), ENCODED_LEN);
        assert_eq!(s, "2022-01-02T03:04:05.000000");
    }

    #[test]
    fn component_ranges() {
        let t = Utc.with_ymd_and_hms(2022, 12, 31, 23, 58, 59).unwrap();
        let s = encode(t);
        assert_eq!(&s[DATE_RANGE], "2022-12-31");
        assert_eq!(&s[HOUR_RANGE], "23");
        assert_eq!(&s[MINUTE_RANGE], "58");
    }

    #[test]
    fn microseconds_survive_round_trip() {
        let t = Utc.with_ymd_and_hms(2022, 6, 15, 12, 0, 0).unwrap()
            + Duration::microseconds(123_456);
        let s = encode(t);
        assert_eq!(s, "2022-06-15T12:00:00.123456");
        assert_eq!(decode(&s).unwrap(), t);
    }

    #[test]
    fn sub_microsecond_precision_is_dropped() {
        let t = Utc.with_ymd_and_hms(2022, 6, 15, 12, 0, 0).unwrap()
            + Duration::nanoseconds(1_999);
        let rounded = round(t);
        let delta = (t - rounded).num_nanoseconds().unwrap().abs();
        assert!(delta < 1_000);
        // Rounding is idempotent.
        assert_eq!(round(rounded), rounded);
    }

    #[test]
    fn lexicographic_order_matches_temporal_order() {
        let base = Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 59).unwrap();
        let instants = [
            base,
            base + Duration::microseconds(1),
            base + Duration::seconds(1), // rolls over the year
            base + Duration::days(40),
        ];
        let encoded: Vec<String> = instants.iter().map(|t| encode(*t)).collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(sorted, encoded);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(matches!(
            decode("2022-01-02T03:04:05"),
            Err(TimeFmtError::WrongLength { .. })
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode("2022-13-40Tzz:04:05.000000"),
            Err(TimeFmtError::Unparseable { .. })
        ));
    }

    #[test]
    fn domain_bounds_decode() {
        assert!(decode(MIN_ENCODED).is_ok());
        assert!(decode(MAX_ENCODED).is_ok());
        assert!(MIN_ENCODED < MAX_ENCODED);
    }
}
