// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The public bin: an unbounded, ordered, persisted collection of items.
//!
//! Every mutation rewrites the JSON data file before returning. A failed write
//! rolls the in-memory state back, so callers never observe a change that was
//! not persisted.

use gleaner_core::{CollectedItem, CommitSink, SinkError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Owner label recorded for items reclaimed by the sweeper.
pub const SWEEPER_OWNER: &str = "sweeper";

/// One item in the public bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinEntry {
    /// The collected item.
    pub item: CollectedItem,
    /// When the item was discarded, in milliseconds since the Unix epoch.
    pub discarded_at: u64,
}

impl BinEntry {
    /// Who discarded the item.
    pub fn owner(&self) -> &str {
        &self.item.source
    }
}

#[derive(Default, Serialize, Deserialize)]
struct BinFile {
    #[serde(default)]
    items: Vec<BinEntry>,
}

/// The persisted public bin.
pub struct PublicBin {
    path: Option<PathBuf>,
    entries: Mutex<Vec<BinEntry>>,
}

impl PublicBin {
    /// A bin that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Opens the bin backed by `path`. A missing file is an empty bin.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let entries = load_entries(&path)?;
        log::info!(
            "PublicBin: loaded {} items from '{}'.",
            entries.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Re-reads the data file, replacing the in-memory contents.
    pub fn reload(&self) -> Result<usize, SinkError> {
        let Some(path) = &self.path else {
            return Ok(self.size());
        };
        let entries = load_entries(path)?;
        let count = entries.len();
        *self.lock() = entries;
        Ok(count)
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<BinEntry> {
        self.lock().clone()
    }

    /// Entries on zero-based `page` of `per_page` entries each.
    pub fn page(&self, page: usize, per_page: usize) -> Vec<BinEntry> {
        let entries = self.lock();
        let start = page.saturating_mul(per_page);
        if per_page == 0 || start >= entries.len() {
            return Vec::new();
        }
        let end = (start + per_page).min(entries.len());
        entries[start..end].to_vec()
    }

    /// Number of pages needed to list the bin; never less than one.
    pub fn total_pages(&self, per_page: usize) -> usize {
        let len = self.lock().len();
        if len == 0 || per_page == 0 {
            return 1;
        }
        len.div_ceil(per_page)
    }

    /// Removes the first entry equal to `entry`.
    pub fn remove(&self, entry: &BinEntry) -> Result<bool, SinkError> {
        self.mutate(|entries| match entries.iter().position(|e| e == entry) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        })
    }

    /// The bin is unbounded.
    pub fn is_full(&self) -> bool {
        false
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BinEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Applies `change` and persists the result, restoring the previous contents
    /// if the write fails.
    fn mutate<R>(&self, change: impl FnOnce(&mut Vec<BinEntry>) -> R) -> Result<R, SinkError> {
        let mut entries = self.lock();
        let before = entries.clone();
        let result = change(&mut entries);
        if let Some(path) = &self.path {
            if let Err(e) = save_entries(path, &entries) {
                log::error!("PublicBin: failed to save '{}': {e}", path.display());
                *entries = before;
                return Err(e);
            }
        }
        Ok(result)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn load_entries(path: &Path) -> Result<Vec<BinEntry>, SinkError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let file: BinFile =
        serde_json::from_slice(&bytes).map_err(|e| SinkError::Encoding(e.to_string()))?;
    Ok(file.items)
}

fn save_entries(path: &Path, entries: &[BinEntry]) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = BinFile {
        items: entries.to_vec(),
    };
    let json = serde_json::to_vec_pretty(&file).map_err(|e| SinkError::Encoding(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl CommitSink for PublicBin {
    fn add(&self, item: CollectedItem) -> Result<(), SinkError> {
        let entry = BinEntry {
            item,
            discarded_at: now_millis(),
        };
        self.mutate(|entries| entries.push(entry))
    }

    fn add_all(&self, items: Vec<CollectedItem>) -> Result<usize, SinkError> {
        let at = now_millis();
        let count = items.len();
        self.mutate(|entries| {
            entries.extend(items.into_iter().map(|item| BinEntry {
                item,
                discarded_at: at,
            }))
        })?;
        log::debug!("PublicBin: committed {count} items.");
        Ok(count)
    }

    fn size(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) -> Result<usize, SinkError> {
        self.mutate(|entries| {
            let count = entries.len();
            entries.clear();
            count
        })
    }

    fn remove_at(&self, index: usize) -> Result<Option<CollectedItem>, SinkError> {
        self.mutate(|entries| {
            (index < entries.len()).then(|| entries.remove(index).item)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: &str, quantity: u32) -> CollectedItem {
        CollectedItem {
            item_type: kind.to_string(),
            quantity,
            source: SWEEPER_OWNER.to_string(),
        }
    }

    #[test]
    fn paging_matches_listing_order() {
        let bin = PublicBin::in_memory();
        let items: Vec<_> = (0..7).map(|i| item(&format!("T{i}"), 1)).collect();
        bin.add_all(items).unwrap();

        assert_eq!(bin.total_pages(3), 3);
        assert_eq!(bin.page(0, 3).len(), 3);
        assert_eq!(bin.page(2, 3)[0].item.item_type, "T6");
        assert!(bin.page(3, 3).is_empty());
        assert!(bin.page(0, 0).is_empty());
    }

    #[test]
    fn empty_bin_has_one_page() {
        let bin = PublicBin::in_memory();
        assert_eq!(bin.total_pages(45), 1);
        assert_eq!(bin.total_pages(0), 1);
        assert!(!bin.is_full());
    }

    #[test]
    fn remove_at_out_of_range_is_none() {
        let bin = PublicBin::in_memory();
        bin.add(item("STONE", 3)).unwrap();
        assert_eq!(bin.remove_at(5).unwrap(), None);
        assert_eq!(bin.remove_at(0).unwrap(), Some(item("STONE", 3)));
        assert_eq!(bin.size(), 0);
    }

    #[test]
    fn remove_by_value_and_clear() {
        let bin = PublicBin::in_memory();
        bin.add_all(vec![item("A", 1), item("B", 2)]).unwrap();
        let first = bin.entries()[0].clone();
        assert_eq!(first.owner(), SWEEPER_OWNER);
        assert!(bin.remove(&first).unwrap());
        assert!(!bin.remove(&first).unwrap());
        assert_eq!(bin.clear().unwrap(), 1);
        assert_eq!(bin.clear().unwrap(), 0);
    }
}
