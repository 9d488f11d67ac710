//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const GIB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Depth of the time-based directory structure under each tier root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// One directory per day: `YYYY-MM-DD/`.
    Days,
    /// One directory per hour: `YYYY-MM-DD/HH/`.
    #[default]
    Hours,
    /// One directory per minute: `YYYY-MM-DD/HH/MM/`.
    Minutes,
}

/// Configuration for opening a [`Storage`](crate::Storage).
///
/// The declared `tags` fix the index schema on first open; opening an
/// existing store with a different tag set is not supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Directory of the rotating (eviction-managed) tier.
    pub rotating_directory: PathBuf,

    /// Directory of the permanent (un-evictable) tier.
    pub permanent_directory: PathBuf,

    /// Aggregate byte budget for the rotating tier, in GiB.
    pub max_rotating_data_to_keep_in_gib: f64,

    /// Free-disk-space floor on the rotating tier's filesystem, in GiB.
    pub min_free_disk_space_in_gib: f64,

    /// Declared tag names, in index column order. Whitespace-free.
    pub tags: Vec<String>,

    /// How many evictions may accumulate before the rotating index
    /// is flushed mid-sweep.
    pub deletion_flush_interval: u64,

    /// Depth of the time-based directory structure.
    pub directory_structure_resolution: Resolution,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            rotating_directory: PathBuf::from("data/rotating"),
            permanent_directory: PathBuf::from("data/permanent"),
            max_rotating_data_to_keep_in_gib: 100.0,
            min_free_disk_space_in_gib: 0.5,
            tags: Vec::new(),
            deletion_flush_interval: 1000,
            directory_structure_resolution: Resolution::default(),
        }
    }
}

impl Configuration {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rotating tier directory.
    #[must_use]
    pub fn rotating_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.rotating_directory = path.into();
        self
    }

    /// Sets the permanent tier directory.
    #[must_use]
    pub fn permanent_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.permanent_directory = path.into();
        self
    }

    /// Sets the rotating byte budget in GiB.
    #[must_use]
    pub fn max_rotating_data_to_keep_in_gib(mut self, gib: f64) -> Self {
        self.max_rotating_data_to_keep_in_gib = gib;
        self
    }

    /// Sets the free-disk-space floor in GiB.
    #[must_use]
    pub fn min_free_disk_space_in_gib(mut self, gib: f64) -> Self {
        self.min_free_disk_space_in_gib = gib;
        self
    }

    /// Sets the declared tag names.
    #[must_use]
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the eviction flush interval.
    #[must_use]
    pub fn deletion_flush_interval(mut self, interval: u64) -> Self {
        self.deletion_flush_interval = interval;
        self
    }

    /// Sets the directory structure resolution.
    #[must_use]
    pub fn directory_structure_resolution(mut self, resolution: Resolution) -> Self {
        self.directory_structure_resolution = resolution;
        self
    }

    /// The rotating byte budget, in bytes.
    #[must_use]
    pub fn max_rotating_bytes(&self) -> u64 {
        (self.max_rotating_data_to_keep_in_gib * GIB) as u64
    }

    /// The free-disk-space floor, in bytes.
    #[must_use]
    pub fn min_free_disk_bytes(&self) -> u64 {
        (self.min_free_disk_space_in_gib * GIB) as u64
    }
}
