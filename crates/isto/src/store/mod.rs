//! The store facade.
//!
//! [`Storage`] is the primary entry point. It owns both tier stores,
//! the rotating space accountant, and the optional eviction callback.
//!
//! The public API is synchronous: every internal fan-out (existence
//! probes, parallel file writes, bulk reads) joins before the call
//! returns. The store is not internally synchronized against
//! concurrent public-API calls: mutating operations take `&mut self`,
//! and callers sharing a store across threads serialize externally.
//! Cross-process exclusion comes from the exclusive transaction each
//! tier store holds on its index file.

mod evict;
mod migrate;
mod query;
mod write;

pub use query::{Comparison, UnknownComparison};

use crate::accountant::{free_disk_bytes, SpaceAccountant};
use crate::config::Configuration;
use crate::error::IstoResult;
use crate::tier::{Tier, TierStore};
use tracing::info;

/// Callback invoked with the id of each item deleted by eviction.
pub type RotatingDataDeletedCallback = Box<dyn FnMut(&str) + Send>;

/// A two-tier timestamped blob store.
///
/// # Example
///
/// ```no_run
/// use isto::{Configuration, DataItem, Storage};
///
/// let mut storage = Storage::open(
///     Configuration::new()
///         .rotating_directory("data/rotating")
///         .permanent_directory("data/permanent"),
/// )?;
///
/// let frame = DataItem::new("frame-000001.bin", vec![0u8; 1024], chrono::Utc::now());
/// storage.save(&frame, false)?;
///
/// let read_back = storage.get_by_id("frame-000001.bin")?;
/// assert!(read_back.is_valid);
/// # Ok::<(), isto::IstoError>(())
/// ```
pub struct Storage {
    config: Configuration,
    rotating: TierStore,
    permanent: TierStore,
    accountant: SpaceAccountant,
    rotating_deleted: Option<RotatingDataDeletedCallback>,
    closed: bool,
}

impl Storage {
    /// Opens (or creates) a store.
    ///
    /// Ensures both tier directories, opens their indexes, acquires
    /// the exclusive write transactions, and initializes the rotating
    /// byte counter from the index.
    ///
    /// # Errors
    ///
    /// Fails when a tier directory cannot be created, when another
    /// instance holds a tier's index ([`StoreLocked`]), when a
    /// declared tag name is unusable ([`InvalidTagName`]), or when the
    /// byte counter cannot be initialized.
    ///
    /// [`StoreLocked`]: crate::IstoError::StoreLocked
    /// [`InvalidTagName`]: crate::IstoError::InvalidTagName
    pub fn open(config: Configuration) -> IstoResult<Self> {
        let rotating = TierStore::open(Tier::Rotating, &config.rotating_directory, &config.tags)?;
        let permanent =
            TierStore::open(Tier::Permanent, &config.permanent_directory, &config.tags)?;

        let current_rotating_bytes = rotating.total_bytes()?;
        let accountant = SpaceAccountant::new(
            config.max_rotating_bytes(),
            config.min_free_disk_bytes(),
            current_rotating_bytes,
        );

        info!(
            rotating = %config.rotating_directory.display(),
            permanent = %config.permanent_directory.display(),
            rotating_bytes = current_rotating_bytes,
            max_rotating_bytes = config.max_rotating_bytes(),
            "storage opened"
        );

        Ok(Self {
            config,
            rotating,
            permanent,
            accountant,
            rotating_deleted: None,
            closed: false,
        })
    }

    /// Registers the callback fired (inside save) for every item the
    /// eviction engine deletes from the rotating tier.
    pub fn set_rotating_deleted_callback(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.rotating_deleted = Some(Box::new(callback));
    }

    /// Rotating-tier ids in ascending timestamp order.
    ///
    /// The optional textual window is half-open: `begin` is inclusive,
    /// `end` exclusive; an empty string leaves that side unbounded.
    /// Bounds are in the encoded timestamp form (see [`isto_timefmt`]).
    pub fn ids_sorted(&self, begin: &str, end: &str) -> IstoResult<Vec<String>> {
        self.rotating.ids_in_window(begin, end)
    }

    /// A point-in-time usage snapshot.
    pub fn stats(&self) -> IstoResult<StorageStats> {
        Ok(StorageStats {
            rotating_items: self.rotating.item_count()?,
            rotating_bytes: self.accountant.current_rotating_bytes(),
            permanent_items: self.permanent.item_count()?,
            free_disk_bytes: free_disk_bytes(self.rotating.root())?,
        })
    }

    /// Flushes both tiers and closes the store.
    ///
    /// Dropping the store also flushes; `close` surfaces the errors.
    pub fn close(mut self) -> IstoResult<()> {
        self.closed = true;
        self.rotating.commit()?;
        self.permanent.commit()?;
        Ok(())
    }

    pub(crate) fn tier_store(&self, tier: Tier) -> &TierStore {
        match tier {
            Tier::Rotating => &self.rotating,
            Tier::Permanent => &self.permanent,
        }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.rotating.commit();
            let _ = self.permanent.commit();
        }
    }
}

/// Point-in-time storage usage numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Item count in the rotating tier.
    pub rotating_items: u64,
    /// Sum of rotating item sizes, in bytes.
    pub rotating_bytes: u64,
    /// Item count in the permanent tier.
    pub permanent_items: u64,
    /// Free bytes on the rotating root's filesystem.
    pub free_disk_bytes: u64,
}
