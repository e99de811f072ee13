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

//! The refresh engine: periodically empties the public bin.
//!
//! Same gate and trigger as the sweep engine, without fan-out or countdown.

use crate::gate::{Gated, OccupancyGate};
use crate::status::RefreshStatus;
use crate::trigger::PeriodicTrigger;
use gleaner_core::{
    announce_quietly, Announcement, Broadcast, CommitSink, ConfigSource, EngineError, Scheduler,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

/// The collaborators a [`RefreshEngine`] is wired to.
#[derive(Clone)]
pub struct RefreshDeps {
    /// Backend the periodic clear is scheduled on.
    pub scheduler: Arc<dyn Scheduler>,
    /// Where the refresh interval is read from.
    pub config: Arc<dyn ConfigSource>,
    /// The collection being cleared.
    pub sink: Arc<dyn CommitSink>,
    /// Where results are announced.
    pub broadcast: Arc<dyn Broadcast>,
}

#[derive(Default)]
struct Control {
    armed: bool,
    interval: u32,
    last_cleared: Option<usize>,
}

struct Inner {
    deps: RefreshDeps,
    gate: OccupancyGate,
    control: Mutex<Control>,
    trigger: PeriodicTrigger,
    executions: AtomicU64,
    this: Weak<Inner>,
}

/// Clears the public bin every configured interval while participants are present.
pub struct RefreshEngine {
    inner: Arc<Inner>,
}

impl RefreshEngine {
    /// Creates a disarmed engine.
    pub fn new(deps: RefreshDeps) -> Self {
        let inner = Arc::new_cyclic(|this| Inner {
            deps,
            gate: OccupancyGate::new(),
            control: Mutex::new(Control::default()),
            trigger: PeriodicTrigger::new(),
            executions: AtomicU64::new(0),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Arms the periodic clear. Fails with [`EngineError::Disabled`] when the
    /// interval is zero.
    pub fn start(&self) -> Result<(), EngineError> {
        self.inner.start()
    }

    /// Disarms. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Clears the bin immediately, armed or not. Returns how many items went.
    pub fn refresh_now(&self) -> Result<usize, EngineError> {
        self.inner.refresh()
    }

    /// Current state.
    pub fn status(&self) -> RefreshStatus {
        let interval_secs = self.inner.deps.config.refresh().interval_secs;
        let participants = self.inner.gate.count();
        let control = self.inner.lock_control();
        RefreshStatus {
            armed: control.armed,
            interval_secs: if control.armed {
                control.interval
            } else {
                interval_secs
            },
            executions: self.inner.executions.load(Ordering::SeqCst),
            last_cleared: control.last_cleared,
            participants,
        }
    }

    /// Applies a configuration change, following the same rules as the sweep
    /// engine.
    pub fn reload(&self) -> Result<(), EngineError> {
        let participants = self.inner.gate.count();
        let enabled = self.inner.deps.config.refresh().enabled();
        let armed = self.inner.is_armed();
        match (enabled, armed) {
            (false, true) => {
                self.inner.stop();
                log::info!("Refresh: disabled by reconfiguration.");
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
    }

    /// A participant arrived. Returns the new count.
    pub fn participant_joined(&self) -> i64 {
        self.inner.gate.joined(self.inner.as_ref())
    }

    /// A participant left. Returns the new count.
    pub fn participant_left(&self) -> i64 {
        self.inner.gate.left(self.inner.as_ref())
    }

    /// Whether the periodic clear is scheduled.
    pub fn is_armed(&self) -> bool {
        self.inner.is_armed()
    }
}

impl Drop for RefreshEngine {
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

    fn is_armed(&self) -> bool {
        self.lock_control().armed
    }

    fn start(&self) -> Result<(), EngineError> {
        let config = self.deps.config.refresh();
        if !config.enabled() {
            return Err(EngineError::Disabled);
        }
        let mut control = self.lock_control();
        if control.armed {
            return Ok(());
        }
        let this = self.this.clone();
        self.trigger.start(
            self.deps.scheduler.as_ref(),
            Duration::from_secs(u64::from(config.interval_secs)),
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    if let Err(e) = inner.refresh() {
                        log::error!("Refresh: periodic clear failed: {e}");
                    }
                }
            }),
        )?;
        control.armed = true;
        control.interval = config.interval_secs;
        log::info!("Refresh: armed, clearing every {}s.", config.interval_secs);
        Ok(())
    }

    fn stop(&self) {
        let mut control = self.lock_control();
        self.trigger.stop();
        if control.armed {
            control.armed = false;
            log::info!("Refresh: disarmed.");
        }
    }

    fn refresh(&self) -> Result<usize, EngineError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let cleared = self.deps.sink.clear()?;
        self.lock_control().last_cleared = Some(cleared);
        if cleared > 0 {
            announce_quietly(
                self.deps.broadcast.as_ref(),
                Announcement::BinRefreshed { cleared },
            );
        }
        log::info!("Refresh: public bin cleared, {cleared} items removed.");
        Ok(cleared)
    }
}

impl Gated for Inner {
    fn is_armed(&self) -> bool {
        Inner::is_armed(self)
    }

    fn is_enabled(&self) -> bool {
        self.deps.config.refresh().enabled()
    }

    fn arm(&self) -> Result<(), EngineError> {
        self.start()
    }

    fn disarm(&self) {
        self.stop();
    }
}
