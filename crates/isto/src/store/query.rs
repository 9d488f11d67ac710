//! Retrieval by id, by timestamp comparison, and by ranged fetch.

use crate::error::IstoResult;
use crate::item::{DataItem, Tags};
use crate::store::write::join_worker;
use crate::tier::{IndexRow, Order, Tier};
use crate::Storage;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::thread;
use thiserror::Error;

/// Comparison operator of a timestamp query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Newest item strictly before the instant.
    Less,
    /// Newest item at or before the instant.
    LessOrEqual,
    /// Item at exactly the instant.
    Equal,
    /// Oldest item at or after the instant.
    GreaterOrEqual,
    /// Oldest item strictly after the instant.
    Greater,
    /// Item with the minimum absolute distance to the instant; equal
    /// distances resolve to the earlier side.
    Nearest,
}

/// Error returned when parsing an unrecognized comparison operator.
#[derive(Debug, Error)]
#[error("unknown comparison operator {0:?}")]
pub struct UnknownComparison(String);

impl FromStr for Comparison {
    type Err = UnknownComparison;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessOrEqual),
            "=" | "==" => Ok(Self::Equal),
            ">=" => Ok(Self::GreaterOrEqual),
            ">" => Ok(Self::Greater),
            "~" => Ok(Self::Nearest),
            other => Err(UnknownComparison(other.to_string())),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
            Self::Nearest => "~",
        })
    }
}

impl Storage {
    /// Retrieves an item by id, or the invalid sentinel if absent.
    ///
    /// The permanent tier is expected to be the smaller one and is
    /// checked first.
    pub fn get_by_id(&self, id: &str) -> IstoResult<DataItem> {
        for tier in [Tier::Permanent, Tier::Rotating] {
            let store = self.tier_store(tier);
            if let Some(row) = store.row_by_id(id)? {
                return load_item(tier, &row);
            }
        }
        Ok(DataItem::invalid())
    }

    /// Retrieves the item matching a timestamp comparison, or the
    /// invalid sentinel if nothing matches.
    ///
    /// Both tiers are consulted; when both answer, the timestamp
    /// temporally closer to the query instant wins. Supplied `tags`
    /// become equality predicates; using a tag name that was not
    /// declared in the configuration is a programmer error and
    /// surfaces as an SQL error.
    pub fn get_by_timestamp(
        &self,
        timestamp: DateTime<Utc>,
        comparison: Comparison,
        tags: &Tags,
    ) -> IstoResult<DataItem> {
        let encoded = isto_timefmt::encode(timestamp);
        let chosen = match comparison {
            Comparison::Less => self.closest_match(&encoded, "max", "<", tags)?,
            Comparison::LessOrEqual => self.closest_match(&encoded, "max", "<=", tags)?,
            Comparison::GreaterOrEqual => self.closest_match(&encoded, "min", ">=", tags)?,
            Comparison::Greater => self.closest_match(&encoded, "min", ">", tags)?,
            Comparison::Equal => self
                .closest_match(&encoded, "max", "<=", tags)?
                .filter(|(_, found)| *found == encoded),
            Comparison::Nearest => {
                let below = self.closest_match(&encoded, "max", "<=", tags)?;
                let above = self.closest_match(&encoded, "min", ">=", tags)?;
                match (below, above) {
                    (Some(below), Some(above)) => {
                        let anchor = isto_timefmt::decode(&encoded)?;
                        let below_distance = anchor - isto_timefmt::decode(&below.1)?;
                        let above_distance = isto_timefmt::decode(&above.1)? - anchor;
                        // An equal distance resolves to the earlier side.
                        if above_distance < below_distance {
                            Some(above)
                        } else {
                            Some(below)
                        }
                    }
                    (below, above) => below.or(above),
                }
            }
        };

        let Some((tier, found)) = chosen else {
            return Ok(DataItem::invalid());
        };
        let store = self.tier_store(tier);
        let Some(id) = store.id_at_timestamp(&found, tags)? else {
            return Ok(DataItem::invalid());
        };
        let Some(row) = store.row_by_id(&id)? else {
            return Ok(DataItem::invalid());
        };
        load_item(tier, &row)
    }

    /// Retrieves up to `max_items` items per tier whose timestamps
    /// fall in `[start, end]`, with tag-equality filtering.
    ///
    /// `end` defaults to now, `start` to the beginning of the
    /// representable domain. With an explicit order, rows from both
    /// tiers are merge-sorted by timestamp and truncated to
    /// `max_items`. The payload of the first result is read on the
    /// caller's thread; the rest load in parallel.
    pub fn get_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tags: &Tags,
        max_items: usize,
        order: Order,
    ) -> IstoResult<Vec<DataItem>> {
        if max_items == 0 {
            return Ok(Vec::new());
        }
        let begin = start.map_or_else(
            || isto_timefmt::MIN_ENCODED.to_string(),
            isto_timefmt::encode,
        );
        let until = end.map_or_else(|| isto_timefmt::encode(Utc::now()), isto_timefmt::encode);

        let rotating_rows = self
            .rotating
            .rows_in_range(&begin, &until, tags, order, max_items)?;
        let permanent_rows = self
            .permanent
            .rows_in_range(&begin, &until, tags, order, max_items)?;

        let merged: Vec<(Tier, IndexRow)> =
            if order != Order::DontCare && !rotating_rows.is_empty() && !permanent_rows.is_empty() {
                merge_by_timestamp(rotating_rows, permanent_rows, order, max_items)
            } else {
                rotating_rows
                    .into_iter()
                    .map(|row| (Tier::Rotating, row))
                    .chain(permanent_rows.into_iter().map(|row| (Tier::Permanent, row)))
                    .collect()
            };

        let mut items = Vec::with_capacity(merged.len());
        thread::scope(|scope| -> IstoResult<()> {
            let rest: Vec<_> = merged
                .iter()
                .skip(1)
                .map(|(tier, row)| scope.spawn(move || load_item(*tier, row)))
                .collect();
            if let Some((tier, row)) = merged.first() {
                items.push(load_item(*tier, row)?);
            }
            for handle in rest {
                items.push(join_worker(handle)??);
            }
            Ok(())
        })?;
        Ok(items)
    }

    /// Runs the timestamp aggregate against both tiers and picks the
    /// temporally closer answer; equal timestamps resolve to the
    /// rotating tier.
    fn closest_match(
        &self,
        encoded: &str,
        aggregate: &str,
        comparison: &str,
        tags: &Tags,
    ) -> IstoResult<Option<(Tier, String)>> {
        let rotating = self
            .rotating
            .aggregate_timestamp(aggregate, comparison, encoded, tags)?;
        let permanent = self
            .permanent
            .aggregate_timestamp(aggregate, comparison, encoded, tags)?;
        Ok(match (rotating, permanent) {
            (Some(rotating), Some(permanent)) => {
                // Lexicographic comparison is temporal comparison; for
                // the max-side aggregate the larger answer is closer to
                // the anchor, for the min-side the smaller one.
                let rotating_wins = if aggregate == "max" {
                    rotating >= permanent
                } else {
                    rotating <= permanent
                };
                if rotating_wins {
                    Some((Tier::Rotating, rotating))
                } else {
                    Some((Tier::Permanent, permanent))
                }
            }
            (Some(rotating), None) => Some((Tier::Rotating, rotating)),
            (None, Some(permanent)) => Some((Tier::Permanent, permanent)),
            (None, None) => None,
        })
    }
}

/// Reads an index row's content file and rebuilds the item.
fn load_item(tier: Tier, row: &IndexRow) -> IstoResult<DataItem> {
    let data = fs::read(&row.path)?;
    Ok(DataItem {
        id: row.id.clone(),
        data,
        timestamp: isto_timefmt::decode(&row.timestamp)?,
        is_permanent: matches!(tier, Tier::Permanent),
        is_valid: true,
        tags: row.tags.clone(),
    })
}

/// Merges two per-tier result sets, each already sorted in `order`,
/// into a single timestamp-sorted list of at most `max_items` rows.
fn merge_by_timestamp(
    rotating: Vec<IndexRow>,
    permanent: Vec<IndexRow>,
    order: Order,
    max_items: usize,
) -> Vec<(Tier, IndexRow)> {
    let mut merged = Vec::with_capacity((rotating.len() + permanent.len()).min(max_items));
    let mut left = rotating.into_iter().peekable();
    let mut right = permanent.into_iter().peekable();
    while merged.len() < max_items {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => match order {
                Order::Descending => l.timestamp >= r.timestamp,
                _ => l.timestamp <= r.timestamp,
            },
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        if take_left {
            if let Some(row) = left.next() {
                merged.push((Tier::Rotating, row));
            }
        } else if let Some(row) = right.next() {
            merged.push((Tier::Permanent, row));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_parsing() {
        assert_eq!("<".parse::<Comparison>().unwrap(), Comparison::Less);
        assert_eq!("<=".parse::<Comparison>().unwrap(), Comparison::LessOrEqual);
        assert_eq!("=".parse::<Comparison>().unwrap(), Comparison::Equal);
        assert_eq!("==".parse::<Comparison>().unwrap(), Comparison::Equal);
        assert_eq!(">=".parse::<Comparison>().unwrap(), Comparison::GreaterOrEqual);
        assert_eq!(">".parse::<Comparison>().unwrap(), Comparison::Greater);
        assert_eq!("~".parse::<Comparison>().unwrap(), Comparison::Nearest);
        assert!("!=".parse::<Comparison>().is_err());
    }

    #[test]
    fn comparison_display_round_trips() {
        for op in [
            Comparison::Less,
            Comparison::LessOrEqual,
            Comparison::Equal,
            Comparison::GreaterOrEqual,
            Comparison::Greater,
            Comparison::Nearest,
        ] {
            assert_eq!(op.to_string().parse::<Comparison>().unwrap(), op);
        }
    }

    fn row(id: &str, timestamp: &str) -> IndexRow {
        IndexRow {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            path: String::new(),
            size: 0,
            tags: Tags::new(),
        }
    }

    #[test]
    fn merge_ascending_truncates() {
        let rotating = vec![row("a", "2022-01-01T00:00:00.000001"), row("c", "2022-01-01T00:00:00.000003")];
        let permanent = vec![row("b", "2022-01-01T00:00:00.000002"), row("d", "2022-01-01T00:00:00.000004")];
        let merged = merge_by_timestamp(rotating, permanent, Order::Ascending, 3);
        let ids: Vec<&str> = merged.iter().map(|(_, r)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_descending() {
        let rotating = vec![row("c", "2022-01-01T00:00:00.000003"), row("a", "2022-01-01T00:00:00.000001")];
        let permanent = vec![row("d", "2022-01-01T00:00:00.000004"), row("b", "2022-01-01T00:00:00.000002")];
        let merged = merge_by_timestamp(rotating, permanent, Order::Descending, 10);
        let ids: Vec<&str> = merged.iter().map(|(_, r)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b", "a"]);
    }
}
