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

//! Runs the sweep on the real threaded backends.

use gleaner_control::{SweepDeps, SweepEngine};
use gleaner_core::{
    Announcement, BackendKind, BusBroadcast, CommitSink, ContextId, EventBus, ItemStack,
    PartitionRef, Scheduler, WorldObject, WorldView,
};
use gleaner_data::{GridWorld, PublicBin, Settings, SharedSettings};
use gleaner_infra::{build_scheduler, current_context};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const WORKERS: usize = 4;

fn wait_for(mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}

fn engine(
    scheduler: Arc<dyn Scheduler>,
    world: Arc<dyn WorldView>,
    bin: Arc<PublicBin>,
    bus: Arc<EventBus<Announcement>>,
) -> SweepEngine {
    SweepEngine::new(SweepDeps {
        scheduler,
        config: Arc::new(SharedSettings::new(Settings::default())),
        world,
        sink: bin,
        broadcast: Arc::new(BusBroadcast::new(bus)),
    })
}

#[test]
fn every_object_is_touched_only_by_its_owner() {
    // --- 1. ARRANGE ---
    let scheduler = build_scheduler(BackendKind::Partitioned, Some(WORKERS)).unwrap();
    let world = Arc::new(GridWorld::with_affinity_check(
        WORKERS as u32,
        current_context,
    ));
    let bin = Arc::new(PublicBin::in_memory());
    let bus = Arc::new(EventBus::new());

    let mut expected = 0;
    for x in (-1024..1024).step_by(97) {
        for z in (-1024..1024).step_by(113) {
            let item = world.spawn("world", x, z, ItemStack::new("arrow", 2));
            // Every third item wanders into a neighbouring region.
            if (x + z) % 3 == 0 {
                world.move_item(&item, x + 128, z - 128);
            }
            expected += 1;
        }
    }
    let sweep = engine(Arc::clone(&scheduler), world.clone(), bin.clone(), bus.clone());

    // --- 2. ACT ---
    sweep.trigger_now().unwrap();

    // --- 3. ASSERT ---
    assert!(
        wait_for(|| sweep.status().sessions_in_flight == 0, Duration::from_secs(10)),
        "session should settle"
    );
    assert_eq!(bin.size(), expected);
    assert_eq!(world.total_live(), 0);
    assert_eq!(world.affinity_violations(), 0);
    assert!(bus
        .drain()
        .contains(&Announcement::SweepCompleted { count: expected }));

    scheduler.shutdown();
}

#[test]
fn concurrent_manual_triggers_commit_each_item_once() {
    let scheduler = build_scheduler(BackendKind::Partitioned, Some(WORKERS)).unwrap();
    let world = Arc::new(GridWorld::with_affinity_check(
        WORKERS as u32,
        current_context,
    ));
    let bin = Arc::new(PublicBin::in_memory());
    let bus = Arc::new(EventBus::new());
    for i in 0..500 {
        world.spawn("world", i * 7 - 1750, i * 3 - 750, ItemStack::new("bone", 1));
    }
    let sweep = Arc::new(engine(
        Arc::clone(&scheduler),
        world.clone(),
        bin.clone(),
        bus,
    ));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let sweep = Arc::clone(&sweep);
            thread::spawn(move || sweep.trigger_now().unwrap())
        })
        .collect();
    let mut ids: Vec<u64> = callers.into_iter().map(|c| c.join().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4, "each trigger opens its own session");

    assert!(wait_for(
        || sweep.status().sessions_in_flight == 0,
        Duration::from_secs(10)
    ));
    assert_eq!(bin.size(), 500);
    assert_eq!(sweep.status().executions, 4);
    assert_eq!(world.affinity_violations(), 0);

    scheduler.shutdown();
}

#[test]
fn unified_backend_sweeps_on_the_global_queue() {
    let scheduler = build_scheduler(BackendKind::Unified, None).unwrap();
    let world = Arc::new(GridWorld::new(1));
    let bin = Arc::new(PublicBin::in_memory());
    for i in 0..50 {
        world.spawn("world", i * 16, -i * 16, ItemStack::new("slime_ball", 1));
    }
    let sweep = engine(
        Arc::clone(&scheduler),
        world.clone(),
        bin.clone(),
        Arc::new(EventBus::new()),
    );
    assert_eq!(sweep.backend(), BackendKind::Unified);

    sweep.trigger_now().unwrap();
    assert!(wait_for(|| bin.size() == 50, Duration::from_secs(5)));
    scheduler.shutdown();
}

/// Remembers which thread touched the world.
#[derive(Default)]
struct ThreadLog(Mutex<Vec<Option<String>>>);

impl ThreadLog {
    fn record(&self) {
        let name = thread::current().name().map(str::to_string);
        self.0.lock().unwrap().push(name);
    }

    fn names(&self) -> Vec<Option<String>> {
        self.0.lock().unwrap().clone()
    }
}

struct LoggedItem {
    id: u64,
    stack: Mutex<Option<ItemStack>>,
    log: Arc<ThreadLog>,
}

impl WorldObject for LoggedItem {
    fn id(&self) -> u64 {
        self.id
    }

    fn owner(&self) -> ContextId {
        ContextId(0)
    }

    fn stack(&self) -> Option<ItemStack> {
        self.log.record();
        self.stack.lock().unwrap().clone()
    }

    fn remove(&self) -> bool {
        self.log.record();
        self.stack.lock().unwrap().take().is_some()
    }
}

struct LoggedWorld {
    items: Vec<Arc<LoggedItem>>,
    log: Arc<ThreadLog>,
}

impl WorldView for LoggedWorld {
    fn zones(&self) -> Vec<String> {
        vec!["world".to_string()]
    }

    fn partitions(&self, zone: &str) -> Vec<PartitionRef> {
        vec![PartitionRef {
            zone: zone.to_string(),
            x: 0,
            z: 0,
            owner: ContextId(0),
        }]
    }

    fn objects_in(&self, _partition: &PartitionRef) -> Vec<Arc<dyn WorldObject>> {
        self.log.record();
        self.items
            .iter()
            .map(|item| Arc::clone(item) as Arc<dyn WorldObject>)
            .collect()
    }
}

#[test]
fn unified_manual_sweep_touches_the_world_only_from_the_global_queue() {
    // --- 1. ARRANGE ---
    let scheduler = build_scheduler(BackendKind::Unified, None).unwrap();
    let log = Arc::new(ThreadLog::default());
    let world = Arc::new(LoggedWorld {
        items: (0..8)
            .map(|id| {
                Arc::new(LoggedItem {
                    id,
                    stack: Mutex::new(Some(ItemStack::new("cod", 1))),
                    log: Arc::clone(&log),
                })
            })
            .collect(),
        log: Arc::clone(&log),
    });
    let bin = Arc::new(PublicBin::in_memory());
    let sweep = engine(
        Arc::clone(&scheduler),
        world,
        bin.clone(),
        Arc::new(EventBus::new()),
    );

    // --- 2. ACT ---
    sweep.trigger_now().unwrap();

    // --- 3. ASSERT ---
    assert!(wait_for(|| bin.size() == 8, Duration::from_secs(5)));
    let names = log.names();
    assert!(!names.is_empty());
    assert!(
        names
            .iter()
            .all(|name| name.as_deref() == Some("gleaner-global")),
        "world touched from {names:?}"
    );
    scheduler.shutdown();
}
