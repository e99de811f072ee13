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

//! The wired-up host: engines, world, and bin behind one command dispatcher.

use crate::console::{Command, RefreshAction, SweepAction, HELP};
use gleaner_control::{RefreshDeps, RefreshEngine, SweepDeps, SweepEngine};
use gleaner_core::{Broadcast, CommitSink, EngineError, ItemStack, Scheduler, SinkError};
use gleaner_data::{GridWorld, PublicBin, SettingsError, SharedSettings};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print this and keep reading.
    Text(String),
    /// Leave the console loop.
    Quit,
}

/// A command that could not be carried out.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("public bin: {0}")]
    Sink(#[from] SinkError),
}

pub struct App {
    settings: Arc<SharedSettings>,
    scheduler: Arc<dyn Scheduler>,
    world: Arc<GridWorld>,
    bin: Arc<PublicBin>,
    sweep: SweepEngine,
    refresh: RefreshEngine,
}

impl App {
    pub fn new(
        settings: Arc<SharedSettings>,
        scheduler: Arc<dyn Scheduler>,
        world: Arc<GridWorld>,
        bin: Arc<PublicBin>,
        broadcast: Arc<dyn Broadcast>,
    ) -> Self {
        let sweep = SweepEngine::new(SweepDeps {
            scheduler: Arc::clone(&scheduler),
            config: settings.clone(),
            world: world.clone(),
            sink: bin.clone(),
            broadcast: Arc::clone(&broadcast),
        });
        let refresh = RefreshEngine::new(RefreshDeps {
            scheduler: Arc::clone(&scheduler),
            config: settings.clone(),
            sink: bin.clone(),
            broadcast,
        });
        log::info!("App: engines wired on the {} backend.", scheduler.kind());
        Self {
            settings,
            scheduler,
            world,
            bin,
            sweep,
            refresh,
        }
    }

    pub fn execute(&self, command: Command) -> Result<Reply, AppError> {
        let text = match command {
            Command::Join => {
                let count = self.sweep.participant_joined();
                self.refresh.participant_joined();
                format!("Participant joined, {count} present.")
            }
            Command::Leave => {
                let count = self.sweep.participant_left();
                self.refresh.participant_left();
                format!("Participant left, {count} present.")
            }
            Command::Status => format!("{}\n{}", self.sweep.status(), self.refresh.status()),
            Command::Sweep(action) => self.sweep_command(action)?,
            Command::Refresh(RefreshAction::Now) => {
                let cleared = self.refresh.refresh_now()?;
                format!("Public bin refreshed, {cleared} items cleared.")
            }
            Command::Refresh(RefreshAction::Status) => self.refresh.status().to_string(),
            Command::Reset => {
                self.sweep.reset_countdown()?;
                "Sweep countdown reset.".to_string()
            }
            Command::Reload => self.reload()?,
            Command::Clear => {
                let cleared = self.bin.clear()?;
                format!("Public bin emptied, {cleared} items removed.")
            }
            Command::Bin(page) => self.list_bin(page),
            Command::Spawn {
                zone,
                x,
                z,
                item_type,
                quantity,
            } => {
                let stack = ItemStack::new(&item_type, quantity);
                let text = format!("Dropped {stack} in {zone} at ({x}, {z}).");
                self.world.spawn(&zone, x, z, stack);
                text
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    /// Stops both engines and the backend.
    pub fn shutdown(&self) {
        self.sweep.shutdown();
        self.refresh.shutdown();
        self.scheduler.shutdown();
        log::info!("App: shut down.");
    }

    fn sweep_command(&self, action: SweepAction) -> Result<String, AppError> {
        Ok(match action {
            SweepAction::Now => {
                let session = self.sweep.trigger_now()?;
                format!("Sweep session #{session} started.")
            }
            SweepAction::Start => {
                self.sweep.start()?;
                "Sweeper started.".to_string()
            }
            SweepAction::Stop => {
                self.sweep.stop();
                "Sweeper stopped.".to_string()
            }
            SweepAction::Status => self.sweep.status().to_string(),
        })
    }

    fn reload(&self) -> Result<String, AppError> {
        self.settings.reload()?;
        let items = self.bin.reload()?;
        self.sweep.reload()?;
        self.refresh.reload()?;
        Ok(format!("Reloaded settings, public bin holds {items} items."))
    }

    fn list_bin(&self, page: usize) -> String {
        let per_page = self.settings.snapshot().public_bin.items_per_page;
        let total = self.bin.total_pages(per_page);
        let page = page.clamp(1, total);
        let entries = self.bin.page(page - 1, per_page);

        let mut out = format!("Public bin, page {page}/{total}:");
        if entries.is_empty() {
            out.push_str("\n  (empty)");
        }
        let first = (page - 1) * per_page;
        for (i, entry) in entries.iter().enumerate() {
            let _ = write!(
                out,
                "\n  {:>3}. {} x{} (from {}, at {})",
                first + i + 1,
                entry.item.item_type,
                entry.item.quantity,
                entry.owner(),
                entry.discarded_at
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::{Announcement, BackendKind, BusBroadcast, EventBus};
    use gleaner_data::Settings;
    use gleaner_infra::ManualScheduler;

    struct Fixture {
        scheduler: Arc<ManualScheduler>,
        bin: Arc<PublicBin>,
        bus: Arc<EventBus<Announcement>>,
        app: App,
    }

    fn fixture(settings: SharedSettings) -> Fixture {
        let scheduler = Arc::new(ManualScheduler::new(BackendKind::Partitioned));
        let bin = Arc::new(PublicBin::in_memory());
        let bus = Arc::new(EventBus::new());
        let app = App::new(
            Arc::new(settings),
            Arc::clone(&scheduler) as Arc<dyn Scheduler>,
            Arc::new(GridWorld::new(4)),
            bin.clone(),
            Arc::new(BusBroadcast::new(bus.clone())),
        );
        Fixture {
            scheduler,
            bin,
            bus,
            app,
        }
    }

    fn run(app: &App, line: &str) -> String {
        let command = Command::parse(line).unwrap().unwrap();
        match app.execute(command).unwrap() {
            Reply::Text(text) => text,
            Reply::Quit => panic!("'{line}' quit the console"),
        }
    }

    #[test]
    fn spawned_items_end_up_in_the_bin() {
        // --- 1. ARRANGE ---
        let f = fixture(SharedSettings::new(Settings::default()));
        run(&f.app, "spawn world 10 10 cobblestone 64");
        run(&f.app, "spawn world -300 40 dirt");

        // --- 2. ACT ---
        let reply = run(&f.app, "sweep now");
        f.scheduler.advance_secs(1);

        // --- 3. ASSERT ---
        assert!(reply.starts_with("Sweep session #"));
        assert_eq!(f.bin.size(), 2);
        assert_eq!(
            f.bus.drain(),
            vec![Announcement::SweepCompleted { count: 2 }]
        );
        let listing = run(&f.app, "bin");
        assert!(listing.contains("page 1/1"));
        assert!(listing.contains("COBBLESTONE x64"));
        assert!(listing.contains("DIRT x1"));
    }

    #[test]
    fn join_arms_both_engines() {
        let f = fixture(SharedSettings::new(Settings::default()));
        assert!(run(&f.app, "join").contains("1 present"));
        let status = run(&f.app, "status");
        assert!(status.contains("running"));
        assert!(status.contains("next sweep in: 300s"));

        run(&f.app, "leave");
        assert!(run(&f.app, "sweep status").contains("idle"));
    }

    #[test]
    fn engine_errors_surface_to_the_console() {
        let mut settings = Settings::default();
        settings.sweeper.enabled = false;
        let f = fixture(SharedSettings::new(settings));
        let err = f
            .app
            .execute(Command::Sweep(SweepAction::Now))
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(EngineError::Disabled)));
    }

    #[test]
    fn bin_listing_pages() {
        let mut settings = Settings::default();
        settings.public_bin.items_per_page = 2;
        let f = fixture(SharedSettings::new(settings));
        for i in 0..5 {
            run(&f.app, &format!("spawn world {} 0 stone {}", i * 16, i + 1));
        }
        run(&f.app, "sweep now");
        f.scheduler.advance_secs(1);

        let last = run(&f.app, "bin 9");
        assert!(last.contains("page 3/3"));
        assert!(last.contains("  5. "));
        assert!(run(&f.app, "clear").contains("5 items removed"));
        assert!(run(&f.app, "bin").contains("(empty)"));
    }

    #[test]
    fn reload_picks_up_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gleaner.ron");
        let f = fixture(SharedSettings::from_file(&path).unwrap());
        run(&f.app, "join");

        let mut edited = Settings::load_or_create(&path).unwrap();
        edited.sweeper.interval = 60;
        edited.save(&path).unwrap();

        run(&f.app, "reload");
        assert!(run(&f.app, "sweep status").contains("interval:      60s"));
    }

    #[test]
    fn quit_leaves_the_loop() {
        let f = fixture(SharedSettings::new(Settings::default()));
        assert_eq!(f.app.execute(Command::Quit).unwrap(), Reply::Quit);
        f.app.shutdown();
        assert!(!f.app.sweep.is_armed());
    }
}
