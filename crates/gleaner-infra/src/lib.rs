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

//! Concrete implementations of the [`Scheduler`](gleaner_core::Scheduler) capability.
//!
//! - [`UnifiedScheduler`]: one global serial queue on a dedicated thread.
//! - [`PartitionedScheduler`]: the same global queue plus a pool of pinned
//!   worker contexts.
//! - [`ManualScheduler`]: a virtual-time test double that runs everything on the
//!   calling thread.
//!
//! [`backend::detect_backend`] picks between the first two once per process.

#![warn(missing_docs)]

pub mod backend;
mod context;
pub mod manual;
pub mod partitioned;
mod timer;
pub mod unified;

pub use backend::{build_scheduler, default_workers, detect_backend, partitioned_available};
pub use context::current_context;
pub use manual::{DispatchMode, ManualScheduler};
pub use partitioned::PartitionedScheduler;
pub use unified::UnifiedScheduler;
