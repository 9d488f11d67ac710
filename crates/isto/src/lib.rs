//! # isto
//!
//! An embeddable two-tier store for timestamped binary blobs, such as
//! camera frames or recorded message batches from a vision pipeline.
//!
//! Producers append blobs as they are generated; consumers retrieve
//! them by id, by exact or nearest timestamp, by tag match, or as
//! ranged batches. The **rotating** tier enforces an aggregate byte
//! budget and a free-disk-space floor by evicting the oldest entries;
//! the **permanent** tier holds curated items (for example, manually
//! labeled ones) indefinitely. Items can be promoted between tiers.
//!
//! Each tier pairs a SQLite index with a time-bucketed file tree. The
//! store holds an exclusive write transaction on each index for its
//! whole lifetime, which makes it a single-writer store across
//! processes: a second instance on the same tier directory fails to
//! open.
//!
//! ## Example
//!
//! ```no_run
//! use isto::{Comparison, Configuration, DataItem, Storage};
//!
//! let mut storage = Storage::open(
//!     Configuration::new()
//!         .max_rotating_data_to_keep_in_gib(10.0)
//!         .tags(["camera"]),
//! )?;
//!
//! let frame = DataItem::new("frame-000001.bin", vec![0u8; 4096], chrono::Utc::now())
//!     .with_tag("camera", "left");
//! storage.save(&frame, false)?;
//!
//! let nearest = storage.get_by_timestamp(
//!     chrono::Utc::now(),
//!     Comparison::Nearest,
//!     &Default::default(),
//! )?;
//! assert!(nearest.is_valid);
//!
//! // Keep this one forever, e.g. after manual labeling.
//! storage.make_permanent("frame-000001.bin")?;
//! # Ok::<(), isto::IstoError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accountant;
mod config;
mod error;
mod item;
mod layout;
mod store;
mod tier;

pub use config::{Configuration, Resolution};
pub use error::{IstoError, IstoResult};
pub use item::{DataItem, Tags};
pub use store::{Comparison, RotatingDataDeletedCallback, Storage, StorageStats, UnknownComparison};
pub use tier::Order;
