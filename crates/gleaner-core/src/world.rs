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

//! World enumeration contracts consumed by the sweep fan-out.

use crate::item::ItemStack;
use crate::scheduler::ContextId;
use std::fmt;
use std::sync::Arc;

/// A spatial subdivision of a zone, the unit of fan-out scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionRef {
    /// Name of the zone the partition belongs to.
    pub zone: String,
    /// Partition x coordinate (in partition units).
    pub x: i32,
    /// Partition z coordinate (in partition units).
    pub z: i32,
    /// The context that owns this partition.
    pub owner: ContextId,
}

impl fmt::Display for PartitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{}]@{}", self.zone, self.x, self.z, self.owner)
    }
}

/// A live, reclaimable object in the world.
///
/// Every method must only be called from the object's owning context, as
/// reported by [`owner`](WorldObject::owner). The owner is the one value that is
/// safe to read from anywhere.
pub trait WorldObject: Send + Sync {
    /// Stable identifier, used for logging.
    fn id(&self) -> u64;

    /// The context that exclusively owns this object.
    fn owner(&self) -> ContextId;

    /// The current contents, or `None` if the object is no longer alive.
    fn stack(&self) -> Option<ItemStack>;

    /// Removes the object from the world.
    ///
    /// Returns `false` if it had already been removed.
    fn remove(&self) -> bool;
}

/// Enumerates the addressable world for a sweep.
pub trait WorldView: Send + Sync {
    /// Names of all zones currently loaded.
    fn zones(&self) -> Vec<String>;

    /// Partitions currently loaded in `zone`.
    fn partitions(&self, zone: &str) -> Vec<PartitionRef>;

    /// Live reclaimable objects physically located in `partition`.
    ///
    /// Must be called from the partition's owning context.
    fn objects_in(&self, partition: &PartitionRef) -> Vec<Arc<dyn WorldObject>>;

    /// Every live reclaimable object in `zone`.
    ///
    /// Only meaningful under the unified backend, where one context owns
    /// everything.
    fn objects_in_zone(&self, zone: &str) -> Vec<Arc<dyn WorldObject>> {
        self.partitions(zone)
            .iter()
            .flat_map(|partition| self.objects_in(partition))
            .collect()
    }

    /// Drops the bookkeeping of objects that have been removed and returns
    /// how many went. Called after each committed sweep.
    fn prune(&self) -> usize {
        0
    }
}
