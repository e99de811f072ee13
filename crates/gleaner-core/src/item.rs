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

//! Item descriptors carried by world objects and collected by a sweep.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type identifier of an empty slot. Objects carrying it are never collected.
pub const EMPTY_ITEM_TYPE: &str = "AIR";

/// The live contents of a dropped item in the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Upper-case type identifier, e.g. `COBBLESTONE`.
    pub item_type: String,
    /// Number of items in the stack.
    pub amount: u32,
}

impl ItemStack {
    /// Creates a stack, normalizing the type identifier to upper case.
    pub fn new(item_type: impl AsRef<str>, amount: u32) -> Self {
        Self {
            item_type: normalize_type(item_type.as_ref()),
            amount,
        }
    }

    /// Returns `true` for stacks that carry nothing worth collecting.
    pub fn is_empty(&self) -> bool {
        self.amount == 0 || self.item_type.is_empty() || self.item_type == EMPTY_ITEM_TYPE
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.item_type, self.amount)
    }
}

/// Immutable descriptor of one reclaimed object, produced by a fan-out worker
/// and consumed only by the fan-in step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectedItem {
    /// Upper-case type identifier.
    pub item_type: String,
    /// Collected quantity.
    pub quantity: u32,
    /// Who put the item into the collection (e.g. `sweeper`).
    pub source: String,
}

impl CollectedItem {
    /// Clones a live stack into a collected descriptor.
    pub fn from_stack(stack: &ItemStack, source: &str) -> Self {
        Self {
            item_type: stack.item_type.clone(),
            quantity: stack.amount,
            source: source.to_string(),
        }
    }
}

/// Normalizes a type identifier the way exclusion lists are stored.
pub fn normalize_type(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_normalizes_type() {
        let stack = ItemStack::new("  diamond_sword ", 1);
        assert_eq!(stack.item_type, "DIAMOND_SWORD");
    }

    #[test]
    fn empty_stacks() {
        assert!(ItemStack::new("air", 5).is_empty());
        assert!(ItemStack::new("stone", 0).is_empty());
        assert!(!ItemStack::new("stone", 1).is_empty());
    }

    #[test]
    fn collected_item_keeps_source() {
        let item = CollectedItem::from_stack(&ItemStack::new("dirt", 12), "sweeper");
        assert_eq!(item.quantity, 12);
        assert_eq!(item.source, "sweeper");
    }
}
