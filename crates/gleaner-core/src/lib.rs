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

//! # Gleaner Core
//!
//! Foundational crate containing the traits, core types, and interface contracts
//! shared by the sweep engine, its scheduling backends, and its collaborators.
//!
//! Nothing in here owns a thread or touches a file: concrete schedulers live in
//! `gleaner-infra`, the world and the public bin live in `gleaner-data`, and the
//! engines themselves live in `gleaner-control`.

#![warn(missing_docs)]

pub mod broadcast;
pub mod config;
pub mod error;
pub mod event;
pub mod item;
pub mod scheduler;
pub mod sink;
pub mod world;

pub use broadcast::{announce_quietly, Announcement, Broadcast, BroadcastError, BusBroadcast};
pub use config::{ConfigSource, RefreshConfig, SweepConfig};
pub use error::EngineError;
pub use event::EventBus;
pub use item::{normalize_type, CollectedItem, ItemStack, EMPTY_ITEM_TYPE};
pub use scheduler::{
    run_guarded, BackendKind, BackendPreference, ContextId, RepeatingTask, Scheduler,
    SchedulingError, Task, TaskHandle,
};
pub use sink::{CommitSink, SinkError};
pub use world::{PartitionRef, WorldObject, WorldView};
