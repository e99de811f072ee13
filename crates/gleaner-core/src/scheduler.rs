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

//! The scheduling capability shared by every concurrency backend.
//!
//! Two backends exist and exactly one is active for the lifetime of an engine:
//!
//! - **Unified**: a single global serial task queue. There is only one execution
//!   context, so [`Scheduler::schedule_on_context`] is a direct call.
//! - **Partitioned**: a pool of worker contexts. Every partition and every live
//!   object is pinned to exactly one context, and any work touching it must be
//!   re-dispatched to that context.
//!
//! Engines only ever talk to `dyn Scheduler`, which keeps the fan-out logic
//! testable against a deterministic test double.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A unit of work that runs once.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work that runs on every period of a repeating schedule.
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// The two mutually-exclusive scheduling backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// One global serial task queue, no true parallelism.
    Unified,
    /// Partition-owned parallel workers with strict context affinity.
    Partitioned,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Unified => write!(f, "Unified"),
            BackendKind::Partitioned => write!(f, "Partitioned"),
        }
    }
}

/// Which backend the host asks for.
///
/// `Auto` defers to the backend selector's host detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Inspect the host once and pick the best available backend.
    #[default]
    Auto,
    /// Force the single global queue.
    Unified,
    /// Force the partitioned worker pool.
    Partitioned,
}

/// Identifies the execution context that exclusively owns a partition or object.
///
/// Under the unified backend every handle maps to the single global context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Errors reported by a backend that refuses to accept work.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The scheduler has been shut down and accepts no new work.
    #[error("scheduler is shut down")]
    ShutDown,
    /// The requested period is zero, which would spin forever.
    #[error("invalid repeating period: {0:?}")]
    InvalidPeriod(Duration),
    /// The owning context of a dispatched unit is gone.
    #[error("execution context {0} is unavailable")]
    ContextUnavailable(ContextId),
}

/// Cancellation handle for a scheduled task.
///
/// Cancelling is idempotent. A cancelled task never runs again, but a run that
/// is already executing is allowed to finish.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Creates a fresh, live handle.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the task as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The polymorphic scheduling capability implemented by every backend.
pub trait Scheduler: Send + Sync {
    /// Returns which backend this scheduler implements.
    fn kind(&self) -> BackendKind;

    /// Schedules `task` on the global context, first after `initial_delay`, then
    /// every `period` until the returned handle is cancelled.
    ///
    /// ## Arguments
    /// * `initial_delay` - Time before the first run. May be zero.
    /// * `period` - Time between runs. Must not be zero.
    /// * `task` - The work to repeat. A panic in one run does not stop later runs.
    ///
    /// ## Returns
    /// A handle that cancels the schedule, or [`SchedulingError::InvalidPeriod`]
    /// for a zero period and [`SchedulingError::ShutDown`] after shutdown.
    fn schedule_repeating(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> Result<TaskHandle, SchedulingError>;

    /// Schedules `task` once on the global context after `delay`.
    fn schedule_once(&self, delay: Duration, task: Task) -> Result<TaskHandle, SchedulingError>;

    /// Runs `task` on the execution context identified by `context`.
    ///
    /// Dispatch is fire-and-forget: the call returns as soon as the unit is queued.
    ///
    /// ## Arguments
    /// * `context` - The owning context. The unified backend has only one and
    ///   runs the unit directly on the caller.
    /// * `task` - The unit to run.
    ///
    /// ## Returns
    /// `Ok(())` once queued, or an error if the context cannot take work.
    fn schedule_on_context(&self, context: ContextId, task: Task) -> Result<(), SchedulingError>;

    /// Stops accepting work and releases the backend's threads.
    ///
    /// Idempotent. Units that are already running finish normally.
    fn shutdown(&self) {}
}

/// Runs a scheduled unit behind an unwind guard.
///
/// A panicking unit is logged and swallowed so that one broken object can never
/// take down a worker or a recurring timer.
/// Returns `false` if the unit panicked.
pub fn run_guarded<F: FnOnce()>(label: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            log::error!("Scheduler: unit '{label}' panicked: {}", panic_message(&*payload));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_handle_cancel_is_idempotent() {
        let handle = TaskHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());

        handle.cancel();
        handle.cancel();

        assert!(clone.is_cancelled());
    }

    #[test]
    fn run_guarded_reports_success() {
        let mut ran = false;
        assert!(run_guarded("ok", || ran = true));
        assert!(ran);
    }

    #[test]
    fn run_guarded_swallows_panics() {
        let survived = run_guarded("boom", || panic!("object exploded"));
        assert!(!survived);
    }

    #[test]
    fn context_id_display() {
        assert_eq!(ContextId(7).to_string(), "ctx#7");
        assert_eq!(BackendKind::Partitioned.to_string(), "Partitioned");
    }
}
