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

//! The durable store that receives collected items.

use crate::item::CollectedItem;
use thiserror::Error;

/// Errors raised by a commit sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backing storage could not be read or written.
    #[error("sink storage failure: {0}")]
    Io(#[from] std::io::Error),
    /// The collection could not be encoded or decoded.
    #[error("sink encoding failure: {0}")]
    Encoding(String),
    /// The sink is not accepting writes.
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// The shared, persisted collection owned by the persistence component.
///
/// Implementations serialize their own writes; the engine may call them from
/// any context.
pub trait CommitSink: Send + Sync {
    /// Appends one collected item durably.
    fn add(&self, item: CollectedItem) -> Result<(), SinkError>;

    /// Appends a batch of items as one atomic write.
    ///
    /// Either every item becomes visible or none does.
    ///
    /// ## Arguments
    /// * `items` - The batch to append, in commit order.
    ///
    /// ## Returns
    /// The number of items added. On error nothing was added.
    fn add_all(&self, items: Vec<CollectedItem>) -> Result<usize, SinkError>;

    /// Number of items currently in the collection.
    fn size(&self) -> usize;

    /// Removes every item, returning how many were removed.
    fn clear(&self) -> Result<usize, SinkError>;

    /// Removes the item at `index`.
    ///
    /// ## Returns
    /// The removed item, or `None` when `index` is past the end.
    fn remove_at(&self, index: usize) -> Result<Option<CollectedItem>, SinkError>;
}
