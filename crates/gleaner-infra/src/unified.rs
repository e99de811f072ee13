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

//! The single-queue backend.

use crate::timer::GlobalQueue;
use gleaner_core::{
    run_guarded, BackendKind, ContextId, RepeatingTask, Scheduler, SchedulingError, Task,
    TaskHandle,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One global serial task queue with no true parallelism.
///
/// Every context handle collapses onto the caller, so dispatching a unit "to its
/// owner" is a plain call.
pub struct UnifiedScheduler {
    queue: GlobalQueue,
    shut_down: AtomicBool,
}

impl UnifiedScheduler {
    /// Spawns the global queue thread.
    pub fn new() -> Result<Self, SchedulingError> {
        let queue = GlobalQueue::spawn("gleaner-global")?;
        log::info!("Scheduler: unified backend ready.");
        Ok(Self {
            queue,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Scheduler for UnifiedScheduler {
    fn kind(&self) -> BackendKind {
        BackendKind::Unified
    }

    fn schedule_repeating(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> Result<TaskHandle, SchedulingError> {
        self.queue.schedule_repeating(initial_delay, period, task)
    }

    fn schedule_once(&self, delay: Duration, task: Task) -> Result<TaskHandle, SchedulingError> {
        self.queue.schedule_once(delay, task)
    }

    fn schedule_on_context(&self, _context: ContextId, task: Task) -> Result<(), SchedulingError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SchedulingError::ShutDown);
        }
        run_guarded("unified-direct", task);
        Ok(())
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.queue.shutdown();
            log::info!("Scheduler: unified backend shut down.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn context_dispatch_is_a_direct_call() {
        let scheduler = UnifiedScheduler::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        scheduler
            .schedule_on_context(
                ContextId(42),
                Box::new(move || {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        // No waiting: the unit already ran on this thread.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.kind(), BackendKind::Unified);
    }

    #[test]
    fn shutdown_refuses_new_work() {
        let scheduler = UnifiedScheduler::new().unwrap();
        scheduler.shutdown();
        assert!(scheduler
            .schedule_on_context(ContextId(0), Box::new(|| {}))
            .is_err());
        assert!(scheduler
            .schedule_once(Duration::ZERO, Box::new(|| {}))
            .is_err());
    }
}
