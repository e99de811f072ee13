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

#![allow(dead_code)]

use gleaner_control::{RefreshDeps, RefreshEngine, SweepDeps, SweepEngine};
use gleaner_core::{
    Announcement, BackendKind, BusBroadcast, CommitSink, EventBus, ItemStack, Scheduler,
};
use gleaner_data::{GridWorld, PublicBin, Settings, SharedSettings};
use gleaner_infra::{current_context, DispatchMode, ManualScheduler};
use std::sync::Arc;

pub const CONTEXTS: u32 = 4;

pub struct Harness {
    pub scheduler: Arc<ManualScheduler>,
    pub world: Arc<GridWorld>,
    pub bin: Arc<PublicBin>,
    pub bus: Arc<EventBus<Announcement>>,
    pub settings: Arc<SharedSettings>,
    pub sweep: SweepEngine,
    pub refresh: RefreshEngine,
}

impl Harness {
    pub fn new(kind: BackendKind) -> Self {
        Self::with(kind, DispatchMode::Inline, Settings::default())
    }

    pub fn with(kind: BackendKind, mode: DispatchMode, settings: Settings) -> Self {
        Self::with_sink(kind, mode, settings, Arc::new(PublicBin::in_memory()))
    }

    pub fn with_sink(
        kind: BackendKind,
        mode: DispatchMode,
        settings: Settings,
        bin: Arc<PublicBin>,
    ) -> Self {
        let scheduler = Arc::new(ManualScheduler::with_mode(kind, mode));
        let world = Arc::new(GridWorld::with_affinity_check(CONTEXTS, current_context));
        let bus = Arc::new(EventBus::new());
        let settings = Arc::new(SharedSettings::new(settings));
        let broadcast = Arc::new(BusBroadcast::new(Arc::clone(&bus)));

        let sweep = SweepEngine::new(SweepDeps {
            scheduler: Arc::clone(&scheduler) as Arc<dyn Scheduler>,
            config: settings.clone(),
            world: world.clone(),
            sink: bin.clone(),
            broadcast: broadcast.clone(),
        });
        let refresh = RefreshEngine::new(RefreshDeps {
            scheduler: Arc::clone(&scheduler) as Arc<dyn Scheduler>,
            config: settings.clone(),
            sink: bin.clone(),
            broadcast,
        });

        Self {
            scheduler,
            world,
            bin,
            bus,
            settings,
            sweep,
            refresh,
        }
    }

    /// Drops `count` stacks of `kind` spread across several regions.
    pub fn scatter(&self, zone: &str, kind: &str, count: usize) {
        for i in 0..count {
            let x = (i as i32 * 37) % 400 - 200;
            let z = (i as i32 * 91) % 400 - 200;
            self.world.spawn(zone, x, z, ItemStack::new(kind, 1 + i as u32 % 64));
        }
    }

    pub fn committed(&self) -> usize {
        self.bin.size()
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.bus.drain()
    }

    pub fn settings_with(&self, edit: impl FnOnce(&mut Settings)) {
        let mut next = (*self.settings.snapshot()).clone();
        edit(&mut next);
        self.settings.replace(next);
    }
}

pub fn settings_with(edit: impl FnOnce(&mut Settings)) -> Settings {
    let mut settings = Settings::default();
    edit(&mut settings);
    settings
}

pub const BOTH: [BackendKind; 2] = [BackendKind::Unified, BackendKind::Partitioned];
