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

//! Gleaner host: loads the settings, wires the engines to an in-memory world,
//! and drives them from an interactive console on stdin.

mod app;
mod console;

use anyhow::{Context, Result};
use app::{App, Reply};
use clap::{Parser, ValueEnum};
use console::Command;
use gleaner_core::{Announcement, BackendKind, BackendPreference, BusBroadcast, EventBus};
use gleaner_data::{GridWorld, PublicBin, Settings, SharedSettings};
use gleaner_infra::{build_scheduler, current_context, default_workers, detect_backend};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file, created with defaults when missing
    #[arg(short, long, default_value = "gleaner.ron")]
    config: PathBuf,

    /// Scheduling backend, overriding the settings file
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Worker contexts for the partitioned backend
    #[arg(short, long)]
    workers: Option<usize>,

    /// Public bin data file, overriding the settings file
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    Unified,
    Partitioned,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendPreference::Auto,
            BackendArg::Unified => BackendPreference::Unified,
            BackendArg::Partitioned => BackendPreference::Partitioned,
        }
    }
}

/// Peeks at the settings file before logging is up. Any problem is reported
/// again, with logging, by the real load.
fn wants_debug(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| Settings::from_ron(&text).ok())
        .is_some_and(|settings| settings.debug)
}

fn init_logging(debug: bool) {
    use env_logger::{Builder, Env};

    let default = if debug { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default)).init();
}

fn spawn_announcer(
    bus: &EventBus<Announcement>,
    running: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    let receiver = bus.receiver().clone();
    thread::Builder::new()
        .name("gleaner-announcer".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                if let Ok(announcement) = receiver.recv_timeout(Duration::from_millis(100)) {
                    println!("\n>> {announcement}");
                }
            }
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug || wants_debug(&cli.config));

    let settings = Arc::new(
        SharedSettings::from_file(&cli.config)
            .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?,
    );
    let mut effective = (*settings.snapshot()).clone();
    if let Some(backend) = cli.backend {
        effective.backend = backend.into();
    }
    if let Some(workers) = cli.workers {
        effective.workers = Some(workers);
    }
    if let Some(data_file) = cli.data_file {
        effective.public_bin.data_file = data_file;
    }
    settings.replace(effective);
    let current = settings.snapshot();

    let kind = detect_backend(current.backend);
    let contexts = match kind {
        BackendKind::Unified => 1,
        BackendKind::Partitioned => current.workers.unwrap_or_else(default_workers).max(1),
    };
    let scheduler = build_scheduler(kind, Some(contexts)).context("Failed to start the scheduler")?;

    let world = Arc::new(GridWorld::with_affinity_check(
        u32::try_from(contexts).context("Too many worker contexts")?,
        current_context,
    ));
    for zone in &current.enabled_zones {
        world.load_zone(zone);
    }

    let data_file = &current.public_bin.data_file;
    if let Some(parent) = data_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let bin = Arc::new(
        PublicBin::open(data_file)
            .with_context(|| format!("Failed to open the public bin at {}", data_file.display()))?,
    );

    let bus = Arc::new(EventBus::new());
    let running = Arc::new(AtomicBool::new(true));
    let announcer = spawn_announcer(&bus, Arc::clone(&running))?;

    let app = App::new(
        settings,
        scheduler,
        world,
        bin,
        Arc::new(BusBroadcast::new(Arc::clone(&bus))),
    );
    log::info!(
        "Gleaner v{} ready on the {kind} backend with {contexts} context(s). Type 'help'.",
        env!("CARGO_PKG_VERSION")
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match app.execute(command) {
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => break,
            Err(e) => println!("Error: {e}"),
        }
        stdout.flush()?;
    }

    app.shutdown();
    running.store(false, Ordering::SeqCst);
    if announcer.join().is_err() {
        log::warn!("Gleaner: announcer thread panicked.");
    }
    Ok(())
}
