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

//! # Gleaner Control
//!
//! The scheduling engines. A [`SweepEngine`] arms itself through an occupancy
//! gate, ticks a countdown, fans collection work out over the world's execution
//! contexts and commits the results in one batch. A [`RefreshEngine`] uses the
//! same gate and trigger to periodically empty the public bin.
//!
//! Both engines only talk to the collaborator traits in `gleaner-core`, so the
//! same code runs on either backend and under the virtual-time test scheduler.

#![warn(missing_docs)]

pub mod countdown;
pub mod fanout;
pub mod gate;
pub mod refresh;
pub mod session;
pub mod status;
pub mod sweep;
pub mod trigger;

pub use countdown::{Countdown, CountdownState, TickOutcome, WARNING_AT_SECS};
pub use fanout::{settle_delay, WorkUnit, MAX_SETTLE_EXTENSIONS, SWEEP_SOURCE};
pub use gate::{Gated, OccupancyGate};
pub use refresh::{RefreshDeps, RefreshEngine};
pub use session::SweepSession;
pub use status::{EngineStatus, RefreshStatus};
pub use sweep::{SweepDeps, SweepEngine, SweepOrigin};
pub use trigger::PeriodicTrigger;
