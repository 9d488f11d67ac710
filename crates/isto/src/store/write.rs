//! The batched save pipeline.

use crate::error::{IstoError, IstoResult};
use crate::item::{id_is_legal, DataItem};
use crate::layout::{directory_for, file_path};
use crate::tier::Tier;
use crate::Storage;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;

/// A batch item with its resolved filesystem locations.
struct Planned<'a> {
    item: &'a DataItem,
    dir: PathBuf,
    path: PathBuf,
    path_text: String,
    encoded: String,
}

impl Storage {
    /// Saves a single item. See [`save_batch`](Self::save_batch).
    pub fn save(&mut self, item: &DataItem, upsert: bool) -> IstoResult<bool> {
        self.save_batch(std::slice::from_ref(item), upsert)
    }

    /// Saves a batch of items.
    ///
    /// Durability is per item, not batch-atomic: content files are
    /// written in parallel, index rows are inserted, the affected
    /// tier(s) are flushed, and only then do the file writes join.
    ///
    /// Returns `Ok(false)` when eviction cannot make room for the
    /// batch's rotating bytes; nothing is written in that case.
    ///
    /// # Errors
    ///
    /// Without `upsert`, an item whose content file already exists is
    /// skipped and reported through [`IstoError::DuplicateItems`] at
    /// the end of the call; items of the same batch that did not
    /// collide are saved and stay saved. With `upsert`, existing items
    /// are replaced in place.
    pub fn save_batch(&mut self, items: &[DataItem], upsert: bool) -> IstoResult<bool> {
        for item in items {
            if !id_is_legal(&item.id) {
                return Err(IstoError::invalid_id(&item.id));
            }
        }

        // Budget check: the batch's rotating bytes must fit. Batches
        // of only permanent items bypass accounting and eviction.
        let pending: u64 = items
            .iter()
            .filter(|item| !item.is_permanent)
            .map(DataItem::size)
            .sum();
        let has_rotating = items.iter().any(|item| !item.is_permanent);
        if has_rotating && !self.evict_for(pending)? {
            return Ok(false);
        }

        // Plan directories and final paths.
        let resolution = self.config.directory_structure_resolution;
        let mut planned = Vec::with_capacity(items.len());
        let mut directories = BTreeSet::new();
        for item in items {
            let root = self.tier_store(tier_of(item)).root();
            let encoded = isto_timefmt::encode(item.timestamp);
            let dir = directory_for(root, &encoded, resolution);
            let path = file_path(root, &encoded, resolution, &item.id);
            directories.insert(dir.clone());
            planned.push(Planned {
                item,
                path_text: path.to_string_lossy().into_owned(),
                dir,
                path,
                encoded,
            });
        }

        // Create missing directories, remembering which were new.
        let mut created = BTreeSet::new();
        for dir in &directories {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                created.insert(dir.clone());
            }
        }

        // Probe for already-occupied paths, concurrently. Items in
        // directories this call just created cannot exist yet.
        let mut existing: Vec<Option<u64>> = vec![None; planned.len()];
        thread::scope(|scope| -> IstoResult<()> {
            let probes: Vec<_> = planned
                .iter()
                .enumerate()
                .filter(|(_, plan)| !created.contains(&plan.dir))
                .map(|(index, plan)| {
                    let probe =
                        scope.spawn(move || fs::metadata(&plan.path).ok().map(|meta| meta.len()));
                    (index, probe)
                })
                .collect();
            for (index, probe) in probes {
                existing[index] = join_worker(probe)?;
            }
            Ok(())
        })?;

        let mut duplicates = Vec::new();
        thread::scope(|scope| -> IstoResult<()> {
            // Start a write per item, except collisions without upsert.
            let mut writes = Vec::new();
            let mut written = vec![false; planned.len()];
            for (index, plan) in planned.iter().enumerate() {
                if let Some(existing_size) = existing[index] {
                    if !upsert {
                        duplicates.push(plan.path_text.clone());
                        continue;
                    }
                    // The replaced bytes leave the rotating total now;
                    // the new size is added with the index row below.
                    if !plan.item.is_permanent {
                        self.accountant.subtract(existing_size);
                    }
                }
                writes.push(scope.spawn(move || fs::write(&plan.path, &plan.item.data)));
                written[index] = true;
            }

            // Index rows for the items being written.
            let mut rotating_dirty = false;
            let mut permanent_dirty = false;
            for (index, plan) in planned.iter().enumerate() {
                if !written[index] {
                    continue;
                }
                let item = plan.item;
                self.tier_store(tier_of(item)).insert(
                    &item.id,
                    &plan.encoded,
                    &plan.path_text,
                    item.size(),
                    &item.tags,
                )?;
                if item.is_permanent {
                    permanent_dirty = true;
                } else {
                    rotating_dirty = true;
                    self.accountant.add(item.size());
                }
            }

            if rotating_dirty {
                self.rotating.flush()?;
            }
            if permanent_dirty {
                self.permanent.flush()?;
            }

            for write in writes {
                join_worker(write)??;
            }
            Ok(())
        })?;

        if duplicates.is_empty() {
            Ok(true)
        } else {
            Err(IstoError::duplicate_items(duplicates))
        }
    }
}

fn tier_of(item: &DataItem) -> Tier {
    if item.is_permanent {
        Tier::Permanent
    } else {
        Tier::Rotating
    }
}

/// Joins a worker, mapping a panic into an I/O error.
pub(crate) fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, T>) -> IstoResult<T> {
    handle
        .join()
        .map_err(|_| io::Error::other("storage worker thread panicked").into())
}
