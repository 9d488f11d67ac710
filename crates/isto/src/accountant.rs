//! Rotating-tier space accounting.

use std::io;
use std::path::Path;

/// Tracks the rotating tier's aggregate byte usage and decides
/// whether pending writes fit within the configured budget and the
/// free-disk-space floor.
///
/// The running total mirrors `SUM(size)` over the rotating index; it
/// is initialized from the index at open and kept in step by the
/// write pipeline and the eviction engine.
#[derive(Debug)]
pub(crate) struct SpaceAccountant {
    max_rotating_bytes: u64,
    min_free_disk_bytes: u64,
    current_rotating_bytes: u64,
}

impl SpaceAccountant {
    pub(crate) fn new(
        max_rotating_bytes: u64,
        min_free_disk_bytes: u64,
        current_rotating_bytes: u64,
    ) -> Self {
        Self {
            max_rotating_bytes,
            min_free_disk_bytes,
            current_rotating_bytes,
        }
    }

    /// Whether a pending write of `pending` rotating bytes fits, given
    /// `free_disk_bytes` available on the rotating root's filesystem.
    pub(crate) fn fits(&self, pending: u64, free_disk_bytes: u64) -> bool {
        self.current_rotating_bytes.saturating_add(pending) <= self.max_rotating_bytes
            && free_disk_bytes.saturating_sub(pending) >= self.min_free_disk_bytes
    }

    pub(crate) fn add(&mut self, bytes: u64) {
        self.current_rotating_bytes = self.current_rotating_bytes.saturating_add(bytes);
    }

    pub(crate) fn subtract(&mut self, bytes: u64) {
        self.current_rotating_bytes = self.current_rotating_bytes.saturating_sub(bytes);
    }

    pub(crate) fn current_rotating_bytes(&self) -> u64 {
        self.current_rotating_bytes
    }
}

/// Free bytes available to this process on the filesystem holding
/// `path`.
pub(crate) fn free_disk_bytes(path: &Path) -> io::Result<u64> {
    fs2::available_space(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_bound() {
        let accountant = SpaceAccountant::new(100, 0, 90);
        assert!(accountant.fits(10, u64::MAX));
        assert!(!accountant.fits(11, u64::MAX));
    }

    #[test]
    fn free_space_floor() {
        let accountant = SpaceAccountant::new(u64::MAX, 50, 0);
        assert!(accountant.fits(10, 60));
        assert!(!accountant.fits(11, 60));
        assert!(!accountant.fits(0, 49));
    }

    #[test]
    fn running_total() {
        let mut accountant = SpaceAccountant::new(100, 0, 0);
        accountant.add(30);
        accountant.add(20);
        assert_eq!(accountant.current_rotating_bytes(), 50);
        accountant.subtract(10);
        assert_eq!(accountant.current_rotating_bytes(), 40);
        accountant.subtract(1000);
        assert_eq!(accountant.current_rotating_bytes(), 0);
    }

    #[test]
    fn free_disk_query_answers_for_real_paths() {
        let free = free_disk_bytes(Path::new(".")).unwrap();
        assert!(free > 0);
    }
}
