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

//! Fixed-period global triggers.

use gleaner_core::{RepeatingTask, Scheduler, SchedulingError, TaskHandle};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A repeating global-context task that fires every `period`, first after one
/// full period.
#[derive(Default)]
pub struct PeriodicTrigger {
    handle: Mutex<Option<TaskHandle>>,
}

impl PeriodicTrigger {
    /// A trigger that is not scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any running schedule with `task` every `period`.
    pub fn start(
        &self,
        scheduler: &dyn Scheduler,
        period: Duration,
        task: RepeatingTask,
    ) -> Result<(), SchedulingError> {
        let mut slot = self.lock();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        *slot = Some(scheduler.schedule_repeating(period, period, task)?);
        Ok(())
    }

    /// Cancels the schedule. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.lock().take() {
            handle.cancel();
        }
    }

    /// Whether a schedule is active.
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
