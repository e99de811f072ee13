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

//! The sweep engine controller.
//!
//! State machine: `Disarmed --start--> Armed --stop--> Disarmed`. While armed, a
//! periodic trigger starts a sweep session every interval and an independent
//! countdown ticks towards it. At most one timer-driven session is in flight;
//! manual triggers always open a new, isolated session.

use crate::countdown::Countdown;
use crate::fanout::Pipeline;
use crate::gate::{Gated, OccupancyGate};
use crate::session::SweepSession;
use crate::status::EngineStatus;
use crate::trigger::PeriodicTrigger;
use gleaner_core::{
    BackendKind, Broadcast, CommitSink, ConfigSource, EngineError, Scheduler, WorldView,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

/// The collaborators a [`SweepEngine`] is wired to.
#[derive(Clone)]
pub struct SweepDeps {
    /// Backend all work is scheduled on.
    pub scheduler: Arc<dyn Scheduler>,
    /// Where the sweep configuration is read from.
    pub config: Arc<dyn ConfigSource>,
    /// The world being swept.
    pub world: Arc<dyn WorldView>,
    /// Where collected items are committed.
    pub sink: Arc<dyn CommitSink>,
    /// Where warnings and results are announced.
    pub broadcast: Arc<dyn Broadcast>,
}

/// What started a sweep session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOrigin {
    /// The periodic trigger.
    Timer,
    /// An explicit [`SweepEngine::trigger_now`] call.
    Manual,
}

#[derive(Default)]
struct Control {
    armed: bool,
    interval: u32,
}

#[derive(Default)]
struct SessionBook {
    next_id: u64,
    in_flight: usize,
    timer_in_flight: bool,
    last_collected: Option<usize>,
}

struct Inner {
    deps: SweepDeps,
    kind: BackendKind,
    gate: OccupancyGate,
    control: Mutex<Control>,
    trigger: PeriodicTrigger,
    countdown: Countdown,
    executions: AtomicU64,
    book: Mutex<SessionBook>,
    this: Weak<Inner>,
}

/// Periodically reclaims dropped items from the world into the public bin.
pub struct SweepEngine {
    inner: Arc<Inner>,
}

impl SweepEngine {
    /// Creates a disarmed engine. The backend kind is fixed from here on.
    ///
    /// ## Arguments
    /// * `deps` - The scheduler, world, sink and announcement channel to use.
    pub fn new(deps: SweepDeps) -> Self {
        let kind = deps.scheduler.kind();
        let countdown = Countdown::new(Arc::clone(&deps.scheduler), Arc::clone(&deps.broadcast));
        let inner = Arc::new_cyclic(|this| Inner {
            deps,
            kind,
            gate: OccupancyGate::new(),
            control: Mutex::new(Control::default()),
            trigger: PeriodicTrigger::new(),
            countdown,
            executions: AtomicU64::new(0),
            book: Mutex::new(SessionBook::default()),
            this: this.clone(),
        });
        log::info!("Sweeper: engine created on the {kind} backend.");
        Self { inner }
    }

    /// Arms the periodic sweep and the countdown. No-op when already armed.
    pub fn start(&self) -> Result<(), EngineError> {
        self.inner.start()
    }

    /// Disarms. Sessions already in flight still commit. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Runs a sweep right away and rewinds the countdown.
    ///
    /// Allowed whether or not the engine is armed and while earlier sessions
    /// are still settling. On the unified backend collection is queued on the
    /// global context, so nothing is touched before the queue gets to it.
    ///
    /// ## Returns
    /// The new session's id, or [`EngineError::Disabled`] when configuration
    /// turns the sweeper off.
    pub fn trigger_now(&self) -> Result<u64, EngineError> {
        let inner = &self.inner;
        if !inner.deps.config.sweep().enabled {
            return Err(EngineError::Disabled);
        }
        let id = inner.begin(SweepOrigin::Manual).unwrap_or_default();
        inner.countdown.rewind();
        Ok(id)
    }

    /// Current state.
    pub fn status(&self) -> EngineStatus {
        self.inner.status()
    }

    /// Re-reads the interval and restarts the countdown if armed.
    ///
    /// ## Returns
    /// An error only when the countdown tick could not be scheduled.
    pub fn reset_countdown(&self) -> Result<(), EngineError> {
        let interval = self.inner.deps.config.sweep().effective_interval();
        let _control = self.inner.lock_control();
        self.inner.countdown.reset(interval)?;
        log::debug!("Sweeper: countdown reset to {interval}s.");
        Ok(())
    }

    /// Applies a configuration change.
    ///
    /// Disarms when the sweeper became disabled. Re-arms with the new interval
    /// when armed. Arms when participants are present and the sweeper became
    /// enabled.
    ///
    /// ## Returns
    /// Any error from re-arming. The engine is left disarmed in that case.
    pub fn reload(&self) -> Result<(), EngineError> {
        let participants = self.inner.gate.count();
        let config = self.inner.deps.config.sweep();
        let armed = self.inner.is_armed();
        match (config.enabled, armed) {
            (false, true) => {
                self.inner.stop();
                log::info!("Sweeper: disabled by reconfiguration.");
            }
            (true, true) => {
                self.inner.stop();
                self.inner.start()?;
            }
            (true, false) if participants > 0 => self.inner.start()?,
            _ => {}
        }
        Ok(())
    }

    /// Stops the engine and forgets every participant.
    pub fn shutdown(&self) {
        self.inner.stop();
        self.inner.gate.reset();
        log::info!("Sweeper: shut down.");
    }

    /// A participant arrived. The first arrival arms the engine.
    ///
    /// ## Returns
    /// The new participant count.
    pub fn participant_joined(&self) -> i64 {
        self.inner.gate.joined(self.inner.as_ref())
    }

    /// A participant left. Returns the new count.
    pub fn participant_left(&self) -> i64 {
        self.inner.gate.left(self.inner.as_ref())
    }

    /// Whether the periodic sweep is scheduled.
    pub fn is_armed(&self) -> bool {
        self.inner.is_armed()
    }

    /// The backend this engine was built on.
    pub fn backend(&self) -> BackendKind {
        self.inner.kind
    }
}

impl Drop for SweepEngine {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_book(&self) -> MutexGuard<'_, SessionBook> {
        match self.book.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn start(&self) -> Result<(), EngineError> {
        let config = self.deps.config.sweep();
        if !config.enabled {
            return Err(EngineError::Disabled);
        }

        let mut control = self.lock_control();
        if control.armed {
            return Ok(());
        }

        let interval = config.effective_interval();
        if config.interval_secs == 0 {
            log::warn!("Sweeper: interval is not positive, using {interval}s.");
        }

        let this = self.this.clone();
        self.trigger.start(
            self.deps.scheduler.as_ref(),
            Duration::from_secs(u64::from(interval)),
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    inner.on_timer();
                }
            }),
        )?;
        if let Err(e) = self.countdown.start(interval) {
            self.trigger.stop();
            return Err(e.into());
        }

        control.armed = true;
        control.interval = interval;
        log::info!("Sweeper: armed, sweeping every {interval}s.");
        Ok(())
    }

    fn stop(&self) {
        let mut control = self.lock_control();
        self.trigger.stop();
        self.countdown.stop();
        if control.armed {
            control.armed = false;
            log::info!("Sweeper: disarmed.");
        }
    }

    fn is_armed(&self) -> bool {
        self.lock_control().armed
    }

    /// The periodic trigger fired: restart the countdown so it lines up with
    /// the trigger again, then open a timer session.
    fn on_timer(&self) {
        {
            let control = self.lock_control();
            if !control.armed {
                return;
            }
            // A restart, not a rewind: the tick due at this same instant is
            // cancelled instead of taking the fresh cycle down by one.
            if let Err(e) = self.countdown.reset(control.interval) {
                log::warn!("Sweeper: countdown could not be restarted: {e}");
            }
        }
        if self.begin(SweepOrigin::Timer).is_none() {
            log::debug!("Sweeper: previous timed sweep still settling, skipping this tick.");
        }
    }

    /// Opens a session and runs the pipeline. `None` when a timer-driven
    /// session is refused because another one is still in flight.
    fn begin(&self, origin: SweepOrigin) -> Option<u64> {
        let session = {
            let mut book = self.lock_book();
            if origin == SweepOrigin::Timer {
                if book.timer_in_flight {
                    return None;
                }
                book.timer_in_flight = true;
            }
            book.next_id += 1;
            book.in_flight += 1;
            Arc::new(SweepSession::new(book.next_id))
        };
        let id = session.id();
        self.executions.fetch_add(1, Ordering::SeqCst);

        let pipeline = Arc::new(Pipeline {
            scheduler: Arc::clone(&self.deps.scheduler),
            world: Arc::clone(&self.deps.world),
            sink: Arc::clone(&self.deps.sink),
            broadcast: Arc::clone(&self.deps.broadcast),
            config: self.deps.config.sweep(),
        });
        let this = self.this.clone();
        log::debug!("Sweeper: session #{id} opened ({origin:?}).");
        pipeline.run(
            session,
            Box::new(move |_session: &SweepSession, committed: usize| {
                if let Some(inner) = this.upgrade() {
                    inner.complete(origin, committed);
                }
            }),
        );
        Some(id)
    }

    fn complete(&self, origin: SweepOrigin, committed: usize) {
        let mut book = self.lock_book();
        book.in_flight = book.in_flight.saturating_sub(1);
        if origin == SweepOrigin::Timer {
            book.timer_in_flight = false;
        }
        book.last_collected = Some(committed);
    }

    fn status(&self) -> EngineStatus {
        let config = self.deps.config.sweep();
        let participants = self.gate.count();
        let (armed, interval) = {
            let control = self.lock_control();
            if control.armed {
                (true, control.interval)
            } else {
                (false, config.effective_interval())
            }
        };
        let (sessions_in_flight, last_collected) = {
            let book = self.lock_book();
            (book.in_flight, book.last_collected)
        };
        EngineStatus {
            armed,
            enabled: config.enabled,
            interval_secs: interval,
            remaining_secs: self.countdown.remaining(),
            executions: self.executions.load(Ordering::SeqCst),
            last_collected,
            participants,
            sessions_in_flight,
            backend: self.kind,
        }
    }
}

impl Gated for Inner {
    fn is_armed(&self) -> bool {
        Inner::is_armed(self)
    }

    fn is_enabled(&self) -> bool {
        self.deps.config.sweep().enabled
    }

    fn arm(&self) -> Result<(), EngineError> {
        self.start()
    }

    fn disarm(&self) {
        self.stop();
    }
}
