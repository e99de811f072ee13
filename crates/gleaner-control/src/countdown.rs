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

//! The one-second countdown towards the next sweep.
//!
//! The countdown is display state: it announces the pre-sweep warning and
//! reports the remaining time, but it never triggers a sweep itself.

use gleaner_core::{
    announce_quietly, Announcement, Broadcast, Scheduler, SchedulingError, TaskHandle,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Remaining seconds at which the pre-sweep warning fires.
pub const WARNING_AT_SECS: i64 = 10;

const TICK: Duration = Duration::from_secs(1);

/// What a single tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// The warning must be broadcast.
    pub warn: bool,
    /// The countdown reached zero and re-armed.
    pub wrapped: bool,
}

/// Pure countdown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownState {
    interval: i64,
    remaining: i64,
    warning_sent: bool,
}

impl CountdownState {
    /// A full cycle of `interval` seconds.
    pub fn new(interval: u32) -> Self {
        Self {
            interval: i64::from(interval),
            remaining: i64::from(interval),
            warning_sent: false,
        }
    }

    /// Seconds left in the current cycle.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Length of a full cycle.
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Whether this cycle's warning already went out.
    pub fn warning_sent(&self) -> bool {
        self.warning_sent
    }

    /// Starts a fresh cycle.
    pub fn rewind(&mut self) {
        self.remaining = self.interval;
        self.warning_sent = false;
    }

    /// Advances by one second.
    ///
    /// The warning check is strict equality, so a coalesced tick that skips
    /// past the mark loses the warning for that cycle.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        self.remaining -= 1;
        if self.remaining == WARNING_AT_SECS && !self.warning_sent {
            self.warning_sent = true;
            outcome.warn = true;
        }
        if self.remaining <= 0 {
            self.rewind();
            outcome.wrapped = true;
        }
        outcome
    }
}

struct Running {
    state: Arc<Mutex<CountdownState>>,
    handle: TaskHandle,
}

/// Drives a [`CountdownState`] with a repeating one-second tick.
pub struct Countdown {
    scheduler: Arc<dyn Scheduler>,
    broadcast: Arc<dyn Broadcast>,
    running: Mutex<Option<Running>>,
}

impl Countdown {
    /// A stopped countdown.
    pub fn new(scheduler: Arc<dyn Scheduler>, broadcast: Arc<dyn Broadcast>) -> Self {
        Self {
            scheduler,
            broadcast,
            running: Mutex::new(None),
        }
    }

    /// (Re)starts a full cycle of `interval` seconds.
    pub fn start(&self, interval: u32) -> Result<(), SchedulingError> {
        let mut running = self.lock();
        if let Some(previous) = running.take() {
            previous.handle.cancel();
        }

        let state = Arc::new(Mutex::new(CountdownState::new(interval)));
        let tick_state = Arc::clone(&state);
        let broadcast = Arc::clone(&self.broadcast);
        let handle = self.scheduler.schedule_repeating(
            TICK,
            TICK,
            Box::new(move || {
                let outcome = match tick_state.lock() {
                    Ok(mut s) => s.tick(),
                    Err(poisoned) => poisoned.into_inner().tick(),
                };
                if outcome.warn {
                    announce_quietly(
                        broadcast.as_ref(),
                        Announcement::SweepWarning {
                            seconds: WARNING_AT_SECS as u32,
                        },
                    );
                }
                if outcome.wrapped {
                    log::trace!("Countdown: cycle completed.");
                }
            }),
        )?;

        log::debug!("Countdown: started with {interval}s.");
        *running = Some(Running { state, handle });
        Ok(())
    }

    /// Restarts with `interval` if running; a stopped countdown stays stopped.
    pub fn reset(&self, interval: u32) -> Result<(), SchedulingError> {
        if !self.is_running() {
            return Ok(());
        }
        self.start(interval)
    }

    /// Begins a new cycle without touching the tick schedule.
    pub fn rewind(&self) {
        if let Some(running) = self.lock().as_ref() {
            match running.state.lock() {
                Ok(mut s) => s.rewind(),
                Err(poisoned) => poisoned.into_inner().rewind(),
            }
        }
    }

    /// Cancels the tick. Idempotent.
    pub fn stop(&self) {
        if let Some(running) = self.lock().take() {
            running.handle.cancel();
            log::debug!("Countdown: stopped.");
        }
    }

    /// Whether the tick is scheduled.
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Copy of the current state, `None` when stopped.
    pub fn snapshot(&self) -> Option<CountdownState> {
        self.lock().as_ref().map(|running| match running.state.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        })
    }

    /// Seconds until the next sweep, `None` when stopped.
    pub fn remaining(&self) -> Option<i64> {
        self.snapshot().map(|s| s.remaining())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: &mut CountdownState, ticks: usize) -> (usize, usize) {
        let mut warnings = 0;
        let mut wraps = 0;
        for _ in 0..ticks {
            let outcome = state.tick();
            warnings += usize::from(outcome.warn);
            wraps += usize::from(outcome.wrapped);
        }
        (warnings, wraps)
    }

    #[test]
    fn warns_once_per_cycle_at_ten() {
        let mut state = CountdownState::new(300);
        assert_eq!(run(&mut state, 289), (0, 0));
        assert_eq!(state.remaining(), 11);

        let outcome = state.tick();
        assert!(outcome.warn);
        assert!(state.warning_sent());

        assert_eq!(run(&mut state, 10), (0, 1));
        assert_eq!(state.remaining(), 300);
        assert!(!state.warning_sent());
    }

    #[test]
    fn eleven_second_interval_warns_on_first_tick() {
        let mut state = CountdownState::new(11);
        assert!(state.tick().warn);
    }

    #[test]
    fn short_intervals_never_warn() {
        for interval in 1..=10 {
            let mut state = CountdownState::new(interval);
            let (warnings, wraps) = run(&mut state, interval as usize * 3);
            assert_eq!(warnings, 0, "interval {interval}");
            assert_eq!(wraps, 3);
        }
    }

    #[test]
    fn every_cycle_gets_its_own_warning() {
        let mut state = CountdownState::new(20);
        assert_eq!(run(&mut state, 60), (3, 3));
    }

    #[test]
    fn rewind_restores_full_cycle() {
        let mut state = CountdownState::new(30);
        run(&mut state, 25);
        state.rewind();
        assert_eq!(state.remaining(), 30);
        assert!(!state.warning_sent());
    }
}
