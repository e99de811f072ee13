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

//! Concrete data collaborators of the sweep engine.
//!
//! - [`world`]: an in-memory world of zones, chunk partitions and dropped items.
//! - [`public_bin`]: the shared collection, persisted as JSON.
//! - [`settings`]: the RON settings file and its hot-reloadable handle.

#![warn(missing_docs)]

pub mod public_bin;
pub mod settings;
pub mod world;

pub use public_bin::{BinEntry, PublicBin, SWEEPER_OWNER};
pub use settings::{
    PublicBinSettings, Settings, SettingsError, SharedSettings, SweeperSettings,
};
pub use world::{
    chunk_of, region_owner, ContextLookup, DroppedItem, GridWorld, PARTITION_SIZE, REGION_SIZE,
};
