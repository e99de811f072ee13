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

//! Per-run sweep state shared by every work unit of one sweep.

use crossbeam_channel::{Receiver, Sender};
use gleaner_core::CollectedItem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// One sweep run: a multi-writer item buffer, a running total, and the count of
/// work units that have been dispatched but not finished.
///
/// Units collect under a shared read lock; [`seal`](Self::seal) takes the write
/// lock, so once it returns no unit is mid-collection and every later unit sees
/// the seal and leaves its object alone.
pub struct SweepSession {
    id: u64,
    started: Instant,
    tx: Sender<CollectedItem>,
    rx: Receiver<CollectedItem>,
    collected: AtomicUsize,
    outstanding: AtomicUsize,
    sealed: RwLock<bool>,
}

impl SweepSession {
    /// A fresh, empty session.
    pub fn new(id: u64) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            id,
            started: Instant::now(),
            tx,
            rx,
            collected: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            sealed: RwLock::new(false),
        }
    }

    /// Session number, unique per engine.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wall time since the session was opened.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Items buffered so far.
    pub fn collected(&self) -> usize {
        self.collected.load(Ordering::SeqCst)
    }

    /// Dispatched units that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Whether [`seal`](Self::seal) has run.
    pub fn is_sealed(&self) -> bool {
        match self.sealed.read() {
            Ok(sealed) => *sealed,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Counts one dispatched unit until the returned guard drops.
    ///
    /// The guard also drops when the unit panics or is never run.
    pub fn track_unit(self: &Arc<Self>) -> UnitGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        UnitGuard {
            session: Arc::clone(self),
        }
    }

    /// Runs `take` and buffers what it yields, unless the session is sealed.
    ///
    /// `take` must validate and remove the source object, returning the
    /// collected descriptor only if the removal happened. Returns `true` if an
    /// item was buffered.
    pub fn collect_with(&self, take: impl FnOnce() -> Option<CollectedItem>) -> bool {
        let sealed = match self.sealed.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *sealed {
            return false;
        }
        let Some(item) = take() else {
            return false;
        };
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.tx.send(item);
        self.collected.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Closes the session and drains every buffered item, in arrival order.
    ///
    /// Idempotent: later calls return nothing.
    pub fn seal(&self) -> Vec<CollectedItem> {
        let mut sealed = match self.sealed.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sealed = true;
        self.rx.try_iter().collect()
    }
}

/// Marks one unit of a [`SweepSession`] as finished when dropped.
pub struct UnitGuard {
    session: Arc<SweepSession>,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.session.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn item(n: u32) -> CollectedItem {
        CollectedItem {
            item_type: "STONE".to_string(),
            quantity: n,
            source: "sweeper".to_string(),
        }
    }

    #[test]
    fn sealed_session_rejects_late_items() {
        let session = SweepSession::new(1);
        assert!(session.collect_with(|| Some(item(1))));
        assert_eq!(session.seal(), vec![item(1)]);

        let mut touched = false;
        assert!(!session.collect_with(|| {
            touched = true;
            Some(item(2))
        }));
        assert!(!touched, "a sealed session must not remove objects");
        assert!(session.seal().is_empty());
    }

    #[test]
    fn failed_take_is_not_counted() {
        let session = SweepSession::new(1);
        assert!(!session.collect_with(|| None));
        assert_eq!(session.collected(), 0);
    }

    #[test]
    fn unit_guards_track_outstanding_work() {
        let session = Arc::new(SweepSession::new(7));
        let first = session.track_unit();
        let second = session.track_unit();
        assert_eq!(session.outstanding(), 2);
        drop(first);
        assert_eq!(session.outstanding(), 1);

        let panicking = thread::spawn(move || {
            let _guard = second;
            panic!("unit blew up");
        });
        assert!(panicking.join().is_err());
        assert_eq!(session.outstanding(), 0);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let session = Arc::new(SweepSession::new(3));
        let writers: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    for n in 0..250 {
                        session.collect_with(|| Some(item(n)));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(session.collected(), 2000);
        assert_eq!(session.seal().len(), 2000);
    }
}
