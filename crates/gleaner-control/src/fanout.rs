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

//! Collection fan-out and fan-in.
//!
//! Under the partitioned backend a sweep is a two-level tree of work units: one
//! unit per partition, run on the partition's owner, which dispatches one unit
//! per object to that object's owner. Units report into the session buffer.
//! A settle callback on the global context then drains the buffer once and
//! commits it.
//!
//! Under the unified backend the whole enumeration runs as one task on the
//! global queue, so it never overlaps another sweep or any other queued work.
//! Only the commit is deferred further.
//!
//! Once a session has committed, the world is asked to forget what was removed.

use crate::session::SweepSession;
use gleaner_core::{
    announce_quietly, run_guarded, Announcement, BackendKind, Broadcast, CollectedItem, CommitSink,
    ContextId, PartitionRef, Scheduler, SweepConfig, WorldObject, WorldView,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Settle delay after a partitioned fan-out.
pub const PARTITIONED_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Settle delay after a unified sweep.
pub const UNIFIED_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// How many times settle waits again for outstanding units before sealing.
pub const MAX_SETTLE_EXTENSIONS: u32 = 5;

/// Source label attached to everything the sweeper collects.
pub const SWEEP_SOURCE: &str = "sweeper";

/// The settle delay for a backend.
pub fn settle_delay(kind: BackendKind) -> Duration {
    match kind {
        BackendKind::Partitioned => PARTITIONED_SETTLE_DELAY,
        BackendKind::Unified => UNIFIED_SETTLE_DELAY,
    }
}

/// A unit of sweep work, carrying the context it must run on.
pub enum WorkUnit {
    /// Enumerate one partition.
    Partition(PartitionRef),
    /// Validate, collect and remove one object.
    Object(Arc<dyn WorldObject>),
}

impl WorkUnit {
    /// The context that owns what this unit touches.
    pub fn affinity(&self) -> ContextId {
        match self {
            WorkUnit::Partition(partition) => partition.owner,
            WorkUnit::Object(object) => object.owner(),
        }
    }
}

/// The collaborators and the configuration snapshot of one sweep.
pub struct Pipeline {
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) world: Arc<dyn WorldView>,
    pub(crate) sink: Arc<dyn CommitSink>,
    pub(crate) broadcast: Arc<dyn Broadcast>,
    pub(crate) config: SweepConfig,
}

/// Called once per session with the number of items committed.
pub type Completion = Box<dyn FnOnce(&SweepSession, usize) + Send + 'static>;

impl Pipeline {
    /// Starts collection for `session` and arranges the settle.
    ///
    /// Partitioned: returns once every partition unit is dispatched.
    /// Unified: returns once the collection task is queued.
    /// `on_complete` runs after commit either way.
    pub fn run(self: Arc<Self>, session: Arc<SweepSession>, on_complete: Completion) {
        let kind = self.scheduler.kind();
        log::debug!(
            "Sweeper: session #{} fanning out on the {kind} backend.",
            session.id()
        );
        match kind {
            BackendKind::Partitioned => {
                self.fan_out(&session);
                self.schedule_settle(session, MAX_SETTLE_EXTENSIONS, on_complete);
            }
            BackendKind::Unified => self.defer(
                Duration::ZERO,
                session,
                on_complete,
                |pipeline, session, on_complete| {
                    run_guarded("sweep-collect", || pipeline.collect_in_place(&session));
                    pipeline.schedule_settle(session, MAX_SETTLE_EXTENSIONS, on_complete);
                },
            ),
        }
    }

    fn eligible_zones(&self) -> Vec<String> {
        self.world
            .zones()
            .into_iter()
            .filter(|zone| self.config.in_scope(zone))
            .collect()
    }

    fn fan_out(self: &Arc<Self>, session: &Arc<SweepSession>) {
        for zone in self.eligible_zones() {
            for partition in self.world.partitions(&zone) {
                self.dispatch(session, WorkUnit::Partition(partition));
            }
        }
    }

    fn collect_in_place(&self, session: &Arc<SweepSession>) {
        for zone in self.eligible_zones() {
            for object in self.world.objects_in_zone(&zone) {
                run_guarded("sweep-object", || self.collect_object(session, object.as_ref()));
            }
        }
    }

    fn dispatch(self: &Arc<Self>, session: &Arc<SweepSession>, unit: WorkUnit) {
        let context = unit.affinity();
        let guard = session.track_unit();
        let pipeline = Arc::clone(self);
        let unit_session = Arc::clone(session);
        let result = self.scheduler.schedule_on_context(
            context,
            Box::new(move || {
                let _guard = guard;
                match unit {
                    WorkUnit::Partition(partition) => {
                        pipeline.run_partition(&unit_session, &partition)
                    }
                    WorkUnit::Object(object) => {
                        pipeline.collect_object(&unit_session, object.as_ref());
                    }
                }
            }),
        );
        if let Err(e) = result {
            log::warn!("Sweeper: could not dispatch unit to {context}: {e}");
        }
    }

    fn run_partition(self: &Arc<Self>, session: &Arc<SweepSession>, partition: &PartitionRef) {
        if session.is_sealed() {
            return;
        }
        for object in self.world.objects_in(partition) {
            self.dispatch(session, WorkUnit::Object(object));
        }
    }

    /// Validates `object` and moves it into the session buffer.
    fn collect_object(&self, session: &SweepSession, object: &dyn WorldObject) {
        let config = &self.config;
        session.collect_with(|| {
            let Some(stack) = object.stack() else {
                log::trace!("Sweeper: object #{} vanished before collection.", object.id());
                return None;
            };
            if stack.is_empty() || config.is_excluded(&stack.item_type) {
                return None;
            }
            let item = CollectedItem::from_stack(&stack, SWEEP_SOURCE);
            if !object.remove() {
                log::debug!("Sweeper: object #{} was removed concurrently.", object.id());
                return None;
            }
            Some(item)
        });
    }

    fn schedule_settle(
        self: Arc<Self>,
        session: Arc<SweepSession>,
        extensions_left: u32,
        on_complete: Completion,
    ) {
        let delay = settle_delay(self.scheduler.kind());
        self.defer(delay, session, on_complete, move |pipeline, session, on_complete| {
            pipeline.settle(session, extensions_left, on_complete)
        });
    }

    /// Runs `step` on the global context after `delay`.
    ///
    /// When the backend refuses the task, the session is committed right away
    /// with whatever it already holds.
    fn defer<F>(
        self: Arc<Self>,
        delay: Duration,
        session: Arc<SweepSession>,
        on_complete: Completion,
        step: F,
    ) where
        F: FnOnce(Arc<Self>, Arc<SweepSession>, Completion) + Send + 'static,
    {
        let scheduler = Arc::clone(&self.scheduler);
        // Taken exactly once, by the task or by the fallback below.
        let slot = Arc::new(Mutex::new(Some((self, session, on_complete))));
        let task_slot = Arc::clone(&slot);
        let scheduled = scheduler.schedule_once(
            delay,
            Box::new(move || {
                if let Some((pipeline, session, on_complete)) = take(&task_slot) {
                    step(pipeline, session, on_complete);
                }
            }),
        );
        if let Err(e) = scheduled {
            log::warn!("Sweeper: next step could not be scheduled ({e}), committing now.");
            if let Some((pipeline, session, on_complete)) = take(&slot) {
                pipeline.finish(session, on_complete);
            }
        }
    }

    fn settle(
        self: Arc<Self>,
        session: Arc<SweepSession>,
        extensions_left: u32,
        on_complete: Completion,
    ) {
        let outstanding = session.outstanding();
        if outstanding > 0 && extensions_left > 0 {
            log::debug!(
                "Sweeper: session #{} still has {outstanding} units running, waiting.",
                session.id()
            );
            self.schedule_settle(session, extensions_left - 1, on_complete);
            return;
        }
        if outstanding > 0 {
            log::warn!(
                "Sweeper: session #{} sealed with {outstanding} units unfinished; their objects stay in the world.",
                session.id()
            );
        }
        self.finish(session, on_complete);
    }

    fn finish(&self, session: Arc<SweepSession>, on_complete: Completion) {
        let items = session.seal();
        let buffered = items.len();
        let committed = if items.is_empty() {
            0
        } else {
            match self.sink.add_all(items) {
                Ok(n) => n,
                Err(e) => {
                    log::error!(
                        "Sweeper: session #{} lost {buffered} items, commit failed: {e}",
                        session.id()
                    );
                    0
                }
            }
        };

        if committed > 0 {
            announce_quietly(
                self.broadcast.as_ref(),
                Announcement::SweepCompleted { count: committed },
            );
        }
        log::info!(
            "Sweeper: session #{} committed {committed} items in {:?}.",
            session.id(),
            session.elapsed()
        );
        let pruned = self.world.prune();
        if pruned > 0 {
            log::debug!("Sweeper: world forgot {pruned} removed objects.");
        }
        on_complete(&session, committed);
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}
