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

//! A deterministic virtual-time scheduler for tests and tooling.
//!
//! Nothing runs until the owner calls [`ManualScheduler::advance`] (timers) or
//! [`ManualScheduler::run_pending`] (deferred context units). Everything runs on
//! the calling thread in due order, ties broken by scheduling order.

use crate::context::with_context;
use gleaner_core::{
    run_guarded, BackendKind, ContextId, RepeatingTask, Scheduler, SchedulingError, Task,
    TaskHandle,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How [`Scheduler::schedule_on_context`] units are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run the unit immediately, nested inside the dispatching call.
    Inline,
    /// Queue the unit until [`ManualScheduler::run_pending`] is called.
    Deferred,
}

enum Job {
    Once(Task),
    Repeating { period: Duration, task: RepeatingTask },
}

struct Timer {
    due: Duration,
    seq: u64,
    job: Job,
    handle: TaskHandle,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    timers: Vec<Timer>,
    pending: VecDeque<(ContextId, Task)>,
    dispatched: Vec<ContextId>,
}

/// Virtual-time [`Scheduler`] that can impersonate either backend.
pub struct ManualScheduler {
    kind: BackendKind,
    mode: DispatchMode,
    state: Mutex<ManualState>,
    failing: AtomicBool,
    shut_down: AtomicBool,
}

impl ManualScheduler {
    /// A scheduler reporting `kind` and running context units inline.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_mode(kind, DispatchMode::Inline)
    }

    /// A scheduler reporting `kind` with an explicit dispatch mode.
    pub fn with_mode(kind: BackendKind, mode: DispatchMode) -> Self {
        Self {
            kind,
            mode,
            state: Mutex::new(ManualState::default()),
            failing: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Makes every following scheduling call fail with
    /// [`SchedulingError::ContextUnavailable`] until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of timers that are scheduled and not cancelled.
    pub fn live_timers(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// Number of deferred context units waiting for [`run_pending`](Self::run_pending).
    pub fn pending_units(&self) -> usize {
        self.lock().pending.len()
    }

    /// Every context a unit was dispatched to, in dispatch order.
    pub fn dispatched_contexts(&self) -> Vec<ContextId> {
        self.lock().dispatched.clone()
    }

    /// Advances virtual time by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Advances virtual time by `by`, running every timer that falls due.
    ///
    /// A repeating timer fires once per elapsed period. Timers scheduled while
    /// advancing run within the same call when they fall inside the window.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;

        loop {
            let next = {
                let mut state = self.lock();
                state.timers.retain(|t| !t.handle.is_cancelled());
                let index = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.seq))
                    .map(|(i, _)| i);
                match index {
                    Some(i) => {
                        let timer = state.timers.swap_remove(i);
                        state.now = timer.due;
                        Some(timer)
                    }
                    None => None,
                }
            };

            let Some(Timer { due, job, handle, .. }) = next else {
                break;
            };

            match job {
                Job::Once(task) => {
                    with_context(None, || run_guarded("manual-once", task));
                }
                Job::Repeating { period, mut task } => {
                    with_context(None, || run_guarded("manual-repeating", || task()));
                    if !handle.is_cancelled() {
                        let mut state = self.lock();
                        let seq = state.next_seq;
                        state.next_seq += 1;
                        state.timers.push(Timer {
                            due: due + period,
                            seq,
                            job: Job::Repeating { period, task },
                            handle,
                        });
                    }
                }
            }
        }

        self.lock().now = target;
    }

    /// Runs deferred context units in dispatch order until none are left,
    /// including units dispatched by the units themselves. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.lock().pending.pop_front();
            let Some((context, task)) = next else {
                return ran;
            };
            with_context(Some(context), || run_guarded("manual-context", task));
            ran += 1;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check(&self, context: Option<ContextId>) -> Result<(), SchedulingError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SchedulingError::ShutDown);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SchedulingError::ContextUnavailable(
                context.unwrap_or(ContextId(0)),
            ));
        }
        Ok(())
    }

    fn push_timer(&self, delay: Duration, job: Job) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.timers.push(Timer {
            due,
            seq,
            job,
            handle: handle.clone(),
        });
        handle
    }
}

impl Scheduler for ManualScheduler {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn schedule_repeating(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> Result<TaskHandle, SchedulingError> {
        self.check(None)?;
        if period.is_zero() {
            return Err(SchedulingError::InvalidPeriod(period));
        }
        Ok(self.push_timer(initial_delay, Job::Repeating { period, task }))
    }

    fn schedule_once(&self, delay: Duration, task: Task) -> Result<TaskHandle, SchedulingError> {
        self.check(None)?;
        Ok(self.push_timer(delay, Job::Once(task)))
    }

    fn schedule_on_context(&self, context: ContextId, task: Task) -> Result<(), SchedulingError> {
        self.check(Some(context))?;
        match self.mode {
            DispatchMode::Inline => {
                self.lock().dispatched.push(context);
                // Unified has a single context: the caller's.
                let target = match self.kind {
                    BackendKind::Unified => crate::current_context(),
                    BackendKind::Partitioned => Some(context),
                };
                with_context(target, || run_guarded("manual-context", task));
            }
            DispatchMode::Deferred => {
                let mut state = self.lock();
                state.dispatched.push(context);
                state.pending.push_back((context, task));
            }
        }
        Ok(())
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            let mut state = self.lock();
            state.timers.clear();
            state.pending.clear();
        }
    }
}
