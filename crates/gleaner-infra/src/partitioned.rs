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

//! The partition-affine worker pool backend.
//!
//! Each worker thread is one execution context. A [`ContextId`] always maps to
//! the same worker (`id % workers`), so everything pinned to a context is only
//! ever touched from that worker's thread. Timers still run on the global queue.

use crate::context::with_context;
use crate::timer::GlobalQueue;
use crossbeam_channel::{Receiver, Sender};
use gleaner_core::{
    run_guarded, BackendKind, ContextId, RepeatingTask, Scheduler, SchedulingError, Task,
    TaskHandle,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

enum WorkerMessage {
    Run(Task),
    Stop,
}

struct Worker {
    tx: Sender<WorkerMessage>,
    handle: Option<thread::JoinHandle<()>>,
}

/// A global timer queue plus a fixed pool of pinned worker contexts.
pub struct PartitionedScheduler {
    queue: GlobalQueue,
    senders: Vec<Sender<WorkerMessage>>,
    workers: Mutex<Vec<Worker>>,
    shut_down: AtomicBool,
}

impl PartitionedScheduler {
    /// Spawns the global queue and `workers` context threads (at least one).
    pub fn new(workers: usize) -> Result<Self, SchedulingError> {
        let count = workers.max(1);
        let queue = GlobalQueue::spawn("gleaner-global")?;

        let mut pool = Vec::with_capacity(count);
        for index in 0..count {
            let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
            let context = ContextId(index as u32);
            let handle = thread::Builder::new()
                .name(format!("gleaner-worker-{index}"))
                .spawn(move || worker_loop(context, rx))
                .map_err(|e| {
                    log::error!("Scheduler: failed to spawn worker {index}: {e}");
                    SchedulingError::ContextUnavailable(context)
                })?;
            pool.push(Worker {
                tx,
                handle: Some(handle),
            });
        }

        log::info!("Scheduler: partitioned backend ready with {count} worker contexts.");
        Ok(Self {
            queue,
            senders: pool.iter().map(|w| w.tx.clone()).collect(),
            workers: Mutex::new(pool),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Number of worker contexts.
    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// The worker index that owns `context`.
    pub fn worker_for(&self, context: ContextId) -> usize {
        context.0 as usize % self.senders.len()
    }
}

fn worker_loop(context: ContextId, rx: Receiver<WorkerMessage>) {
    log::debug!("Scheduler: worker {context} started.");
    with_context(Some(context), || {
        while let Ok(message) = rx.recv() {
            match message {
                WorkerMessage::Run(task) => {
                    run_guarded("context-unit", task);
                }
                WorkerMessage::Stop => break,
            }
        }
    });
    log::debug!("Scheduler: worker {context} stopped.");
}

impl Scheduler for PartitionedScheduler {
    fn kind(&self) -> BackendKind {
        BackendKind::Partitioned
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

    fn schedule_on_context(&self, context: ContextId, task: Task) -> Result<(), SchedulingError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SchedulingError::ShutDown);
        }
        let worker = self.worker_for(context);
        self.senders[worker]
            .send(WorkerMessage::Run(task))
            .map_err(|_| SchedulingError::ContextUnavailable(context))
    }

    /// Stops the timer queue, then lets every worker drain what it already
    /// accepted before joining it.
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.shutdown();

        let mut pool = match self.workers.lock() {
            Ok(mut pool) => std::mem::take(&mut *pool),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for worker in &pool {
            let _ = worker.tx.send(WorkerMessage::Stop);
        }
        let current = thread::current().id();
        for worker in &mut pool {
            if let Some(handle) = worker.handle.take() {
                if handle.thread().id() != current {
                    let _ = handle.join();
                }
            }
        }
        log::info!("Scheduler: partitioned backend shut down.");
    }
}

impl Drop for PartitionedScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
