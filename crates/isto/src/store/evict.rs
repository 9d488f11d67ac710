//! Eviction of the oldest rotating items.

use crate::accountant::free_disk_bytes;
use crate::error::IstoResult;
use crate::layout::prune_empty_ancestors;
use crate::tier::Victim;
use crate::Storage;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

impl Storage {
    /// Makes room for a pending write of `pending` rotating bytes.
    ///
    /// While the write does not fit, deletes rotating items oldest
    /// first (content file with empty-ancestor pruning, then index
    /// row), decrementing the accountant, growing the assumed free
    /// byte count, and firing the rotating-deleted callback per item.
    /// A victim whose deletion fails is logged and skipped; the sweep
    /// carries on with the next-oldest item, and stops only when a
    /// whole pass deletes nothing. The rotating index is flushed every
    /// `deletion_flush_interval` deletions and once more at the end if
    /// anything was deleted.
    ///
    /// Returns whether the constraints hold afterwards. Deletions
    /// performed before a failure persist either way.
    pub(crate) fn evict_for(&mut self, pending: u64) -> IstoResult<bool> {
        let mut free = free_disk_bytes(self.rotating.root())?;
        if self.accountant.fits(pending, free) {
            return Ok(true);
        }

        let interval = self.config.deletion_flush_interval.max(1);
        let mut since_flush = 0u64;
        let mut deleted = 0u64;

        'sweep: loop {
            let victims = self.rotating.oldest(interval)?;
            if victims.is_empty() {
                break;
            }
            let mut deleted_this_pass = 0u64;
            for victim in &victims {
                if self.accountant.fits(pending, free) {
                    break 'sweep;
                }
                if let Err(err) = self.delete_rotating_item(victim) {
                    warn!(id = %victim.id, error = %err, "could not evict item; skipping");
                    continue;
                }
                self.accountant.subtract(victim.size);
                free = free.saturating_add(victim.size);
                deleted += 1;
                deleted_this_pass += 1;
                if let Some(callback) = self.rotating_deleted.as_mut() {
                    callback(&victim.id);
                }
                since_flush += 1;
                if since_flush >= interval {
                    self.rotating.flush()?;
                    since_flush = 0;
                }
            }
            // Every remaining victim failed to delete; give up rather
            // than refetch the same rows forever.
            if deleted_this_pass == 0 {
                break;
            }
        }

        if deleted > 0 {
            self.rotating.flush()?;
            debug!(deleted, pending, "eviction sweep finished");
        }

        let fits = self.accountant.fits(pending, free);
        if !fits {
            warn!(
                pending,
                rotating_bytes = self.accountant.current_rotating_bytes(),
                free,
                "eviction could not make room"
            );
        }
        Ok(fits)
    }

    /// Deletes one rotating item's content file (tolerating a file
    /// that is already gone), prunes empty ancestors, and removes the
    /// index row.
    pub(crate) fn delete_rotating_item(&self, victim: &Victim) -> IstoResult<()> {
        let path = Path::new(&victim.path);
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        if let Some(parent) = path.parent() {
            if let Err(err) = prune_empty_ancestors(parent, self.rotating.root()) {
                warn!(path = %parent.display(), error = %err, "could not prune directories");
            }
        }
        self.rotating.delete_row(&victim.id)
    }
}
