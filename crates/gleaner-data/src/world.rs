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

//! An in-memory partitioned world.
//!
//! Zones are split into chunk partitions of [`PARTITION_SIZE`] blocks. Chunks are
//! grouped into square regions of [`REGION_SIZE`] chunks, and each region is owned
//! by exactly one execution context. A dropped item is owned by the context of
//! the region it *currently* occupies, which after a move may differ from the
//! partition it is still listed under.

use gleaner_core::{ContextId, ItemStack, PartitionRef, WorldObject, WorldView};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Width of a partition (chunk), in blocks.
pub const PARTITION_SIZE: i32 = 16;

/// Width of a region, in partitions.
pub const REGION_SIZE: i32 = 8;

/// Reports the context the calling thread is executing for.
///
/// Installed by the host so the world can flag accesses from the wrong context.
pub type ContextLookup = fn() -> Option<ContextId>;

/// Maps a partition coordinate to the context owning its region.
pub fn region_owner(chunk_x: i32, chunk_z: i32, contexts: u32) -> ContextId {
    let contexts = i64::from(contexts.max(1));
    let rx = i64::from(chunk_x.div_euclid(REGION_SIZE));
    let rz = i64::from(chunk_z.div_euclid(REGION_SIZE));
    let mixed = rx.wrapping_mul(73_856_093) ^ rz.wrapping_mul(19_349_663);
    ContextId(mixed.rem_euclid(contexts) as u32)
}

/// The partition containing block `(x, z)`.
pub fn chunk_of(x: i32, z: i32) -> (i32, i32) {
    (x.div_euclid(PARTITION_SIZE), z.div_euclid(PARTITION_SIZE))
}

#[derive(Default)]
struct AffinityGuard {
    lookup: Option<ContextLookup>,
    violations: AtomicUsize,
}

impl AffinityGuard {
    fn check(&self, what: &str, owner: ContextId) {
        let Some(lookup) = self.lookup else {
            return;
        };
        if let Some(current) = lookup() {
            if current != owner {
                self.violations.fetch_add(1, Ordering::SeqCst);
                log::error!("World: {what} touched from {current}, owner is {owner}");
            }
        }
    }
}

/// A dropped item stack lying in the world.
pub struct DroppedItem {
    id: u64,
    zone: String,
    x: AtomicI32,
    z: AtomicI32,
    contexts: u32,
    stack: Mutex<Option<ItemStack>>,
    guard: Arc<AffinityGuard>,
}

impl DroppedItem {
    /// Name of the zone the item lies in.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Current block position.
    pub fn position(&self) -> (i32, i32) {
        (self.x.load(Ordering::SeqCst), self.z.load(Ordering::SeqCst))
    }

    /// Returns `true` until the item has been removed.
    pub fn is_alive(&self) -> bool {
        self.lock_stack().is_some()
    }

    /// Replaces the item's contents, e.g. when two stacks merge.
    pub fn set_stack(&self, stack: ItemStack) {
        let mut current = self.lock_stack();
        if current.is_some() {
            *current = Some(stack);
        }
    }

    fn lock_stack(&self) -> std::sync::MutexGuard<'_, Option<ItemStack>> {
        match self.stack.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WorldObject for DroppedItem {
    fn id(&self) -> u64 {
        self.id
    }

    fn owner(&self) -> ContextId {
        let (cx, cz) = chunk_of(self.x.load(Ordering::SeqCst), self.z.load(Ordering::SeqCst));
        region_owner(cx, cz, self.contexts)
    }

    fn stack(&self) -> Option<ItemStack> {
        self.guard.check("item read", self.owner());
        self.lock_stack().clone()
    }

    fn remove(&self) -> bool {
        self.guard.check("item removal", self.owner());
        self.lock_stack().take().is_some()
    }
}

#[derive(Default)]
struct Zone {
    partitions: BTreeMap<(i32, i32), Vec<Arc<DroppedItem>>>,
}

/// A thread-safe in-memory world.
pub struct GridWorld {
    contexts: u32,
    zones: RwLock<BTreeMap<String, Zone>>,
    next_id: AtomicU64,
    guard: Arc<AffinityGuard>,
}

impl GridWorld {
    /// Creates an empty world whose regions are spread over `contexts` owners.
    pub fn new(contexts: u32) -> Self {
        Self::build(contexts, None)
    }

    /// Like [`new`](Self::new), with an affinity check that counts every item
    /// access made from a context other than the owner's.
    pub fn with_affinity_check(contexts: u32, lookup: ContextLookup) -> Self {
        Self::build(contexts, Some(lookup))
    }

    fn build(contexts: u32, lookup: Option<ContextLookup>) -> Self {
        Self {
            contexts: contexts.max(1),
            zones: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            guard: Arc::new(AffinityGuard {
                lookup,
                violations: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of owning contexts regions are spread over.
    pub fn contexts(&self) -> u32 {
        self.contexts
    }

    /// Item accesses flagged by the affinity check so far.
    pub fn affinity_violations(&self) -> usize {
        self.guard.violations.load(Ordering::SeqCst)
    }

    /// Ensures `zone` exists.
    pub fn load_zone(&self, zone: &str) {
        self.write().entry(zone.to_string()).or_default();
    }

    /// Ensures the partition at chunk `(cx, cz)` of `zone` exists.
    pub fn load_partition(&self, zone: &str, cx: i32, cz: i32) {
        self.write()
            .entry(zone.to_string())
            .or_default()
            .partitions
            .entry((cx, cz))
            .or_default();
    }

    /// Drops `stack` at block `(x, z)` of `zone`, loading what is needed.
    pub fn spawn(&self, zone: &str, x: i32, z: i32, stack: ItemStack) -> Arc<DroppedItem> {
        let item = Arc::new(DroppedItem {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            zone: zone.to_string(),
            x: AtomicI32::new(x),
            z: AtomicI32::new(z),
            contexts: self.contexts,
            stack: Mutex::new(Some(stack)),
            guard: Arc::clone(&self.guard),
        });
        self.write()
            .entry(zone.to_string())
            .or_default()
            .partitions
            .entry(chunk_of(x, z))
            .or_default()
            .push(Arc::clone(&item));
        log::trace!("World: spawned item #{} in {zone} at ({x}, {z})", item.id);
        item
    }

    /// Moves an item without re-listing it, so it may end up owned by another
    /// region's context than the partition it is enumerated from.
    pub fn move_item(&self, item: &DroppedItem, x: i32, z: i32) {
        item.x.store(x, Ordering::SeqCst);
        item.z.store(z, Ordering::SeqCst);
    }

    /// Live items in `zone`.
    pub fn live_count(&self, zone: &str) -> usize {
        self.read()
            .get(zone)
            .map(|z| {
                z.partitions
                    .values()
                    .flatten()
                    .filter(|item| item.is_alive())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Live items across every zone.
    pub fn total_live(&self) -> usize {
        self.read()
            .values()
            .flat_map(|z| z.partitions.values().flatten())
            .filter(|item| item.is_alive())
            .count()
    }

    /// Entries held in partition storage, removed ones included until pruned.
    pub fn stored_count(&self) -> usize {
        self.read()
            .values()
            .map(|z| z.partitions.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Zone>> {
        match self.zones.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Zone>> {
        match self.zones.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WorldView for GridWorld {
    fn zones(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn partitions(&self, zone: &str) -> Vec<PartitionRef> {
        self.read()
            .get(zone)
            .map(|z| {
                z.partitions
                    .keys()
                    .map(|&(x, cz)| PartitionRef {
                        zone: zone.to_string(),
                        x,
                        z: cz,
                        owner: region_owner(x, cz, self.contexts),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn objects_in(&self, partition: &PartitionRef) -> Vec<Arc<dyn WorldObject>> {
        self.read()
            .get(&partition.zone)
            .and_then(|z| z.partitions.get(&(partition.x, partition.z)))
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_alive())
                    .map(|item| Arc::clone(item) as Arc<dyn WorldObject>)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn prune(&self) -> usize {
        let mut pruned = 0;
        for zone in self.write().values_mut() {
            for items in zone.partitions.values_mut() {
                let before = items.len();
                items.retain(|item| item.is_alive());
                pruned += before - items.len();
            }
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_math_handles_negative_coordinates() {
        assert_eq!(chunk_of(0, 15), (0, 0));
        assert_eq!(chunk_of(16, -1), (1, -1));
        assert_eq!(chunk_of(-16, -17), (-1, -2));
    }

    #[test]
    fn partitions_in_one_region_share_an_owner() {
        let owner = region_owner(0, 0, 4);
        for cx in 0..REGION_SIZE {
            for cz in 0..REGION_SIZE {
                assert_eq!(region_owner(cx, cz, 4), owner);
            }
        }
        assert!(region_owner(-1, 3, 4).0 < 4);
    }

    #[test]
    fn single_context_owns_everything() {
        for (cx, cz) in [(0, 0), (100, -100), (-9, 9)] {
            assert_eq!(region_owner(cx, cz, 1), ContextId(0));
        }
    }

    #[test]
    fn spawn_lists_item_under_its_partition() {
        let world = GridWorld::new(2);
        world.spawn("world", 20, 3, ItemStack::new("stone", 4));
        world.load_partition("world", 5, 5);

        let partitions = world.partitions("world");
        assert_eq!(partitions.len(), 2);
        let first = partitions.iter().find(|p| (p.x, p.z) == (1, 0)).unwrap();
        assert_eq!(world.objects_in(first).len(), 1);
        assert_eq!(world.live_count("world"), 1);
    }

    #[test]
    fn removed_items_disappear_from_enumeration() {
        let world = GridWorld::new(1);
        let item = world.spawn("world", 0, 0, ItemStack::new("dirt", 1));
        assert!(item.remove());
        assert!(!item.remove());
        assert!(item.stack().is_none());
        assert_eq!(world.total_live(), 0);
        assert_eq!(world.stored_count(), 1, "still listed until pruned");
        assert_eq!(world.prune(), 1);
        assert_eq!(world.stored_count(), 0);
        assert_eq!(world.prune(), 0);
    }

    #[test]
    fn moved_item_changes_owner_but_not_listing() {
        let world = GridWorld::new(64);
        let item = world.spawn("world", 0, 0, ItemStack::new("dirt", 1));
        let original_owner = item.owner();

        // Far enough to cross many regions; at least one lands elsewhere.
        let moved = (1..32).any(|step| {
            let x = step * PARTITION_SIZE * REGION_SIZE;
            world.move_item(&item, x, 0);
            item.owner() != original_owner
        });
        assert!(moved);

        let home = world
            .partitions("world")
            .into_iter()
            .find(|p| (p.x, p.z) == (0, 0))
            .unwrap();
        assert_eq!(world.objects_in(&home).len(), 1);
    }

    #[test]
    fn affinity_check_flags_foreign_access() {
        fn wrong_context() -> Option<ContextId> {
            Some(ContextId(99))
        }
        let world = GridWorld::with_affinity_check(2, wrong_context);
        let item = world.spawn("world", 0, 0, ItemStack::new("dirt", 1));
        let _ = item.stack();
        assert_eq!(world.affinity_violations(), 1);
    }
}
