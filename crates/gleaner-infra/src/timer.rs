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

//! The global serial timer queue shared by both real backends.
//!
//! A single thread owns a min-heap of due instants. Producers hand it entries
//! over a channel; the thread wakes on whichever comes first, a new entry or the
//! next deadline.

use crate::context::with_context;
use crossbeam_channel::{RecvTimeoutError, Sender};
use gleaner_core::{run_guarded, RepeatingTask, SchedulingError, Task, TaskHandle};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

enum Job {
    Once(Task),
    Repeating { period: Duration, task: RepeatingTask },
}

struct Entry {
    due: Instant,
    job: Job,
    handle: TaskHandle,
}

enum Command {
    Schedule(Entry),
    Shutdown,
}

/// Serial queue of delayed and repeating tasks running on one named thread.
pub(crate) struct GlobalQueue {
    tx: Sender<Command>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl GlobalQueue {
    /// Spawns the queue thread.
    pub(crate) fn spawn(name: &str) -> Result<Self, SchedulingError> {
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut heap: BinaryHeap<Reverse<(Instant, u64)>> = BinaryHeap::new();
                let mut entries: HashMap<u64, Entry> = HashMap::new();
                let mut next_seq: u64 = 0;

                log::info!("Scheduler: global queue '{thread_name}' started.");

                while thread_running.load(Ordering::Relaxed) {
                    // 1. Run everything that is due.
                    let now = Instant::now();
                    while let Some(&Reverse((due, seq))) = heap.peek() {
                        if due > now {
                            break;
                        }
                        heap.pop();
                        let Some(entry) = entries.remove(&seq) else {
                            continue;
                        };
                        if entry.handle.is_cancelled() {
                            continue;
                        }
                        if let Some(rescheduled) = run_entry(entry) {
                            let seq = next_seq;
                            next_seq += 1;
                            heap.push(Reverse((rescheduled.due, seq)));
                            entries.insert(seq, rescheduled);
                        }
                    }

                    // 2. Wait for new work or the next deadline.
                    let received = match heap.peek() {
                        Some(&Reverse((due, _))) => {
                            rx.recv_timeout(due.saturating_duration_since(Instant::now()))
                        }
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match received {
                        Ok(Command::Schedule(entry)) => {
                            let seq = next_seq;
                            next_seq += 1;
                            heap.push(Reverse((entry.due, seq)));
                            entries.insert(seq, entry);
                        }
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }

                log::info!(
                    "Scheduler: global queue '{thread_name}' stopped ({} pending entries dropped).",
                    entries.len()
                );
            })
            .map_err(|e| {
                log::error!("Scheduler: failed to spawn global queue: {e}");
                SchedulingError::ShutDown
            })?;

        Ok(Self {
            tx,
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn schedule_once(
        &self,
        delay: Duration,
        task: Task,
    ) -> Result<TaskHandle, SchedulingError> {
        self.submit(delay, Job::Once(task))
    }

    pub(crate) fn schedule_repeating(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> Result<TaskHandle, SchedulingError> {
        if period.is_zero() {
            return Err(SchedulingError::InvalidPeriod(period));
        }
        self.submit(initial_delay, Job::Repeating { period, task })
    }

    fn submit(&self, delay: Duration, job: Job) -> Result<TaskHandle, SchedulingError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulingError::ShutDown);
        }
        let handle = TaskHandle::new();
        let entry = Entry {
            due: Instant::now() + delay,
            job,
            handle: handle.clone(),
        };
        self.tx
            .send(Command::Schedule(entry))
            .map_err(|_| SchedulingError::ShutDown)?;
        Ok(handle)
    }

    /// Stops the queue thread. Pending entries are dropped without running.
    pub(crate) fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Command::Shutdown);
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            // A task may shut the scheduler down from inside the queue thread.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for GlobalQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs one due entry, returning it again if it repeats.
fn run_entry(entry: Entry) -> Option<Entry> {
    let Entry { due, job, handle } = entry;
    match job {
        Job::Once(task) => {
            with_context(None, || run_guarded("global-once", task));
            None
        }
        Job::Repeating { period, mut task } => {
            with_context(None, || run_guarded("global-repeating", || task()));
            if handle.is_cancelled() {
                return None;
            }
            // Late ticks coalesce instead of bursting to catch up.
            let next = (due + period).max(Instant::now());
            Some(Entry {
                due: next,
                job: Job::Repeating { period, task },
                handle,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn once_task_runs_after_delay() {
        let queue = GlobalQueue::spawn("test-global").unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        queue
            .schedule_once(
                Duration::from_millis(20),
                Box::new(move || {
                    tx.send(Instant::now()).unwrap();
                }),
            )
            .unwrap();
        let started = Instant::now();
        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(fired.duration_since(started) >= Duration::from_millis(15));
        queue.shutdown();
    }

    #[test]
    fn cancelled_repeating_task_stops() {
        let queue = GlobalQueue::spawn("test-global").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = queue
            .schedule_repeating(
                Duration::ZERO,
                Duration::from_millis(5),
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(60));
        handle.cancel();
        thread::sleep(Duration::from_millis(20));
        let after_cancel = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(40));

        assert!(after_cancel >= 2);
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
        queue.shutdown();
    }

    #[test]
    fn zero_period_is_rejected() {
        let queue = GlobalQueue::spawn("test-global").unwrap();
        let result = queue.schedule_repeating(Duration::ZERO, Duration::ZERO, Box::new(|| {}));
        assert!(matches!(result, Err(SchedulingError::InvalidPeriod(_))));
    }

    #[test]
    fn panicking_task_does_not_kill_queue() {
        let queue = GlobalQueue::spawn("test-global").unwrap();
        queue
            .schedule_once(Duration::ZERO, Box::new(|| panic!("broken unit")))
            .unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        queue
            .schedule_once(
                Duration::from_millis(5),
                Box::new(move || {
                    tx.send(()).unwrap();
                }),
            )
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn schedule_after_shutdown_fails() {
        let queue = GlobalQueue::spawn("test-global").unwrap();
        queue.shutdown();
        queue.shutdown();
        let result = queue.schedule_once(Duration::ZERO, Box::new(|| {}));
        assert!(matches!(result, Err(SchedulingError::ShutDown)));
    }
}
