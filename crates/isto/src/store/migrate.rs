//! Tier migration.

use crate::error::IstoResult;
use crate::tier::Tier;
use crate::Storage;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

impl Storage {
    /// Moves a rotating item into the permanent tier, out of reach of
    /// eviction. Returns `false` when the id is not in the rotating
    /// tier.
    ///
    /// The source copy is deleted before the destination save; if that
    /// save fails, the item is lost and `false` is returned. Callers
    /// needing stronger guarantees should copy the item out first.
    pub fn make_permanent(&mut self, id: &str) -> IstoResult<bool> {
        self.migrate(id, Tier::Permanent)
    }

    /// Moves a permanent item back into the rotating tier, making it
    /// evictable again. Returns `false` when the id is not in the
    /// permanent tier. Carries the same delete-before-save caveat as
    /// [`make_permanent`](Self::make_permanent).
    pub fn make_rotating(&mut self, id: &str) -> IstoResult<bool> {
        self.migrate(id, Tier::Rotating)
    }

    fn migrate(&mut self, id: &str, destination: Tier) -> IstoResult<bool> {
        let source_tier = destination.other();

        // Load the full source item before touching anything.
        let source = self.tier_store(source_tier);
        let Some(row) = source.row_by_id(id)? else {
            return Ok(false);
        };
        let data = fs::read(&row.path)?;
        let timestamp = isto_timefmt::decode(&row.timestamp)?;

        // Delete the source copy: file, empty ancestors, index row.
        let path = Path::new(&row.path);
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        if let Some(parent) = path.parent() {
            crate::layout::prune_empty_ancestors(parent, source.root())?;
        }
        source.delete_row(id)?;

        // Save into the destination; its write may trigger eviction.
        let moved = crate::DataItem {
            id: row.id.clone(),
            data,
            timestamp,
            is_permanent: matches!(destination, Tier::Permanent),
            is_valid: true,
            tags: row.tags.clone(),
        };
        let saved = self.save(&moved, false);

        // The source deletion stands regardless of the save outcome.
        self.tier_store(source_tier).flush()?;
        if matches!(source_tier, Tier::Rotating) {
            self.accountant.subtract(row.size);
        }

        match saved {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(id, destination = %destination, "migration save did not fit; item lost");
                Ok(false)
            }
            Err(err) => {
                warn!(id, destination = %destination, error = %err, "migration save failed; item lost");
                Ok(false)
            }
        }
    }
}
