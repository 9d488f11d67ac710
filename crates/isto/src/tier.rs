//! Per-tier index and file subtree.
//!
//! Each tier owns a SQLite index file at a fixed name inside its
//! directory and the time-bucketed content tree around it. The store
//! keeps an exclusive write transaction open on the index for its
//! whole lifetime: it is the single-writer lock (a second instance on
//! the same directory fails to open) and the batching buffer that is
//! only made durable by an explicit flush (`COMMIT; BEGIN EXCLUSIVE`).

use crate::error::{IstoError, IstoResult};
use crate::item::Tags;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage tier of a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The eviction-managed pool.
    Rotating,
    /// The un-evictable pool.
    Permanent,
}

impl Tier {
    /// Index file name inside the tier directory.
    #[must_use]
    pub(crate) const fn index_file_name(self) -> &'static str {
        match self {
            Self::Rotating => "isto_rotating.sqlite",
            Self::Permanent => "isto_permanent.sqlite",
        }
    }

    /// The opposite tier.
    #[must_use]
    pub(crate) const fn other(self) -> Self {
        match self {
            Self::Rotating => Self::Permanent,
            Self::Permanent => Self::Rotating,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotating => f.write_str("rotating"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// A decoded index row, minus the blob bytes.
#[derive(Debug, Clone)]
pub(crate) struct IndexRow {
    pub id: String,
    pub timestamp: String,
    pub path: String,
    pub size: u64,
    pub tags: Tags,
}

/// An eviction candidate.
#[derive(Debug, Clone)]
pub(crate) struct Victim {
    pub id: String,
    pub path: String,
    pub size: u64,
}

/// Sort order of a ranged fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// No ordering requirement.
    #[default]
    DontCare,
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// One tier's SQLite index plus the metadata to address its file tree.
pub(crate) struct TierStore {
    root: PathBuf,
    conn: Connection,
    /// Declared tag names, in column order.
    tags: Vec<String>,
    insert_sql: String,
    select_list: String,
}

impl TierStore {
    /// Opens a tier: ensures the directory, opens the index, acquires
    /// the exclusive write transaction, and prepares the schema.
    ///
    /// # Errors
    ///
    /// Fails with [`IstoError::StoreLocked`] when another instance
    /// already holds this tier directory, and with
    /// [`IstoError::InvalidTagName`] when a declared tag name cannot
    /// be used as a column identifier.
    pub(crate) fn open(tier: Tier, root: &Path, tags: &[String]) -> IstoResult<Self> {
        for name in tags {
            if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '"') {
                return Err(IstoError::invalid_tag_name(name));
            }
        }

        fs::create_dir_all(root)?;
        let conn = Connection::open(root.join(tier.index_file_name()))?;

        // The exclusive transaction is held for the store's lifetime.
        // A second instance fails here with SQLITE_BUSY.
        if let Err(err) = conn.execute_batch("BEGIN EXCLUSIVE") {
            return Err(match err {
                rusqlite::Error::SqliteFailure(inner, _)
                    if inner.code == ErrorCode::DatabaseBusy
                        || inner.code == ErrorCode::DatabaseLocked =>
                {
                    IstoError::store_locked(root.display().to_string())
                }
                other => other.into(),
            });
        }

        let tag_columns: Vec<String> = tags.iter().map(|t| quote_identifier(t)).collect();
        let mut create_columns =
            String::from("id TEXT PRIMARY KEY, timestamp TEXT, path TEXT, size INTEGER");
        for column in &tag_columns {
            create_columns.push_str(", ");
            create_columns.push_str(column);
            create_columns.push_str(" TEXT");
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS DataItems ({create_columns});\n\
             CREATE INDEX IF NOT EXISTS DataItems_timestamp ON DataItems (timestamp);"
        ))?;

        let mut select_list = String::from("id, timestamp, path, size");
        let mut insert_columns = select_list.clone();
        let mut placeholders = String::from("?, ?, ?, ?");
        for column in &tag_columns {
            select_list.push_str(", ");
            select_list.push_str(column);
            insert_columns.push_str(", ");
            insert_columns.push_str(column);
            placeholders.push_str(", ?");
        }
        let insert_sql =
            format!("INSERT OR REPLACE INTO DataItems ({insert_columns}) VALUES ({placeholders})");

        debug!(tier = %tier, root = %root.display(), "tier index opened");

        Ok(Self {
            root: root.to_path_buf(),
            conn,
            tags: tags.to_vec(),
            insert_sql,
            select_list,
        })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Inserts (or replaces) an index row. Declared tags missing from
    /// `tags` become empty strings; undeclared keys are discarded.
    pub(crate) fn insert(
        &self,
        id: &str,
        timestamp: &str,
        path: &str,
        size: u64,
        tags: &Tags,
    ) -> IstoResult<()> {
        let mut values: Vec<Value> = Vec::with_capacity(4 + self.tags.len());
        values.push(id.to_string().into());
        values.push(timestamp.to_string().into());
        values.push(path.to_string().into());
        values.push(Value::Integer(size as i64));
        for name in &self.tags {
            values.push(tags.get(name).cloned().unwrap_or_default().into());
        }
        let mut statement = self.conn.prepare_cached(&self.insert_sql)?;
        statement.execute(params_from_iter(values))?;
        Ok(())
    }

    /// Deletes an index row by id.
    pub(crate) fn delete_row(&self, id: &str) -> IstoResult<()> {
        let mut statement = self
            .conn
            .prepare_cached("DELETE FROM DataItems WHERE id = ?")?;
        statement.execute([id])?;
        Ok(())
    }

    /// Looks up a row by id.
    pub(crate) fn row_by_id(&self, id: &str) -> IstoResult<Option<IndexRow>> {
        let sql = format!("SELECT {} FROM DataItems WHERE id = ?", self.select_list);
        let mut statement = self.conn.prepare_cached(&sql)?;
        let row = statement
            .query_row([id], |row| self.decode_row(row))
            .optional()?;
        Ok(row)
    }

    /// Runs `SELECT max(timestamp)` or `SELECT min(timestamp)` with a
    /// comparison predicate and tag-equality filters.
    ///
    /// `aggregate` is `"max"` or `"min"`; `comparison` is one of the
    /// SQL comparison operators. Tag names in `tags` that are not
    /// declared columns surface as an SQL error.
    pub(crate) fn aggregate_timestamp(
        &self,
        aggregate: &str,
        comparison: &str,
        timestamp: &str,
        tags: &Tags,
    ) -> IstoResult<Option<String>> {
        let (predicates, mut values) = tag_predicates(tags);
        values.insert(0, timestamp.to_string().into());
        let sql = format!(
            "SELECT {aggregate}(timestamp) FROM DataItems WHERE timestamp {comparison} ?{predicates}"
        );
        let mut statement = self.conn.prepare_cached(&sql)?;
        let found =
            statement.query_row(params_from_iter(values), |row| row.get::<_, Option<String>>(0))?;
        Ok(found)
    }

    /// Picks the id of one row matching a timestamp and tag filter.
    pub(crate) fn id_at_timestamp(&self, timestamp: &str, tags: &Tags) -> IstoResult<Option<String>> {
        let (predicates, mut values) = tag_predicates(tags);
        values.insert(0, timestamp.to_string().into());
        let sql = format!("SELECT id FROM DataItems WHERE timestamp = ?{predicates} LIMIT 1");
        let mut statement = self.conn.prepare_cached(&sql)?;
        let found = statement
            .query_row(params_from_iter(values), |row| row.get::<_, String>(0))
            .optional()?;
        Ok(found)
    }

    /// Rows with `timestamp BETWEEN begin AND end`, optionally ordered
    /// and bounded.
    pub(crate) fn rows_in_range(
        &self,
        begin: &str,
        end: &str,
        tags: &Tags,
        order: Order,
        limit: usize,
    ) -> IstoResult<Vec<IndexRow>> {
        let (predicates, mut values) = tag_predicates(tags);
        values.insert(0, begin.to_string().into());
        values.insert(1, end.to_string().into());
        values.push(Value::Integer(limit as i64));
        let order_clause = match order {
            Order::DontCare => "",
            Order::Ascending => " ORDER BY timestamp ASC",
            Order::Descending => " ORDER BY timestamp DESC",
        };
        let sql = format!(
            "SELECT {} FROM DataItems WHERE timestamp BETWEEN ? AND ?{predicates}{order_clause} LIMIT ?",
            self.select_list
        );
        let mut statement = self.conn.prepare_cached(&sql)?;
        let rows = statement
            .query_map(params_from_iter(values), |row| self.decode_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The oldest rows, as eviction candidates.
    pub(crate) fn oldest(&self, limit: u64) -> IstoResult<Vec<Victim>> {
        let mut statement = self.conn.prepare_cached(
            "SELECT id, path, size FROM DataItems ORDER BY timestamp ASC LIMIT ?",
        )?;
        let victims = statement
            .query_map([limit as i64], |row| {
                Ok(Victim {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(victims)
    }

    /// Ids in ascending timestamp order, windowed by the optional
    /// half-open textual bounds (`>= begin`, `< end`; empty = open).
    pub(crate) fn ids_in_window(&self, begin: &str, end: &str) -> IstoResult<Vec<String>> {
        let mut sql = String::from("SELECT id FROM DataItems");
        let mut values: Vec<Value> = Vec::new();
        let mut keyword = " WHERE";
        if !begin.is_empty() {
            sql.push_str(keyword);
            sql.push_str(" timestamp >= ?");
            values.push(begin.to_string().into());
            keyword = " AND";
        }
        if !end.is_empty() {
            sql.push_str(keyword);
            sql.push_str(" timestamp < ?");
            values.push(end.to_string().into());
        }
        sql.push_str(" ORDER BY timestamp ASC");
        let mut statement = self.conn.prepare_cached(&sql)?;
        let ids = statement
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Sum of `size` over all rows.
    pub(crate) fn total_bytes(&self) -> IstoResult<u64> {
        let sum: i64 =
            self.conn
                .query_row("SELECT COALESCE(SUM(size), 0) FROM DataItems", [], |row| {
                    row.get(0)
                })?;
        Ok(sum as u64)
    }

    /// Number of rows.
    pub(crate) fn item_count(&self) -> IstoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM DataItems", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Commits the open transaction and begins the next one.
    pub(crate) fn flush(&self) -> IstoResult<()> {
        self.conn.execute_batch("COMMIT; BEGIN EXCLUSIVE")?;
        Ok(())
    }

    /// Commits the open transaction without starting another; the
    /// store is unusable afterwards. Used on close.
    pub(crate) fn commit(&self) -> IstoResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn decode_row(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexRow> {
        let mut tags = Tags::new();
        for (offset, name) in self.tags.iter().enumerate() {
            tags.insert(name.clone(), row.get(4 + offset)?);
        }
        Ok(IndexRow {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            path: row.get(2)?,
            size: row.get::<_, i64>(3)? as u64,
            tags,
        })
    }
}

/// Double-quotes an identifier for embedding into SQL text. Values are
/// always bound; only tag-name identifiers go through here.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds ` AND "name" = ?` predicates plus their bound values.
fn tag_predicates(tags: &Tags) -> (String, Vec<Value>) {
    let mut predicates = String::new();
    let mut values: Vec<Value> = Vec::with_capacity(tags.len());
    for (name, value) in tags {
        predicates.push_str(" AND ");
        predicates.push_str(&quote_identifier(name));
        predicates.push_str(" = ?");
        values.push(value.clone().into());
    }
    (predicates, values)
}
