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

//! The settings file and the hot-reloadable handle the engines read from.
//!
//! Settings are authored in RON. Out-of-range values are never an error: they
//! are replaced by bounded defaults during [`Settings::normalize`], and every
//! substitution is logged.

use gleaner_core::config::{
    DEFAULT_SWEEP_INTERVAL_SECS, MAX_SWEEP_INTERVAL_SECS, MIN_SWEEP_INTERVAL_SECS,
};
use gleaner_core::{normalize_type, BackendPreference, ConfigSource, RefreshConfig, SweepConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Zone used when the settings list none.
pub const DEFAULT_ZONE: &str = "world";

/// Default number of public bin entries per listing page.
pub const DEFAULT_ITEMS_PER_PAGE: usize = 45;

/// Errors raised while loading or writing the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read or written.
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid RON for [`Settings`].
    #[error("settings file is malformed: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The settings could not be encoded.
    #[error("settings could not be encoded: {0}")]
    Encode(#[from] ron::Error),
}

/// Sweeper section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperSettings {
    /// Whether the sweeper runs at all.
    pub enabled: bool,
    /// Seconds between sweeps; normalized into `10..=3600`.
    pub interval: i64,
    /// Item types that are never collected.
    pub blacklist: Vec<String>,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: i64::from(DEFAULT_SWEEP_INTERVAL_SECS),
            blacklist: Vec::new(),
        }
    }
}

/// Public bin section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicBinSettings {
    /// Seconds between automatic clears; `0` disables them.
    pub auto_refresh: i64,
    /// Entries shown per listing page.
    pub items_per_page: usize,
    /// Location of the JSON data file.
    pub data_file: PathBuf,
}

impl Default for PublicBinSettings {
    fn default() -> Self {
        Self {
            auto_refresh: 3600,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            data_file: PathBuf::from("data/public_bin.json"),
        }
    }
}

/// The whole settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Raises the default log filter to `debug`.
    pub debug: bool,
    /// Which scheduling backend to run.
    pub backend: BackendPreference,
    /// Worker contexts for the partitioned backend; `None` uses every core.
    pub workers: Option<usize>,
    /// Zones eligible for sweeping.
    pub enabled_zones: Vec<String>,
    /// Sweeper section.
    pub sweeper: SweeperSettings,
    /// Public bin section.
    pub public_bin: PublicBinSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            backend: BackendPreference::Auto,
            workers: None,
            enabled_zones: vec![DEFAULT_ZONE.to_string()],
            sweeper: SweeperSettings::default(),
            public_bin: PublicBinSettings::default(),
        }
    }
}

impl Settings {
    /// Parses settings from RON text and normalizes them.
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = ron::de::from_str(text)?;
        settings.normalize();
        Ok(settings)
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            let defaults = Settings::default();
            defaults.save(path)?;
            log::info!("Settings: wrote defaults to '{}'.", path.display());
            return Ok(defaults);
        }
        let text = fs::read_to_string(path)?;
        let settings = Self::from_ron(&text)?;
        log::info!(
            "Settings: sweeper enabled={}, interval={}s, auto-refresh={}s.",
            settings.sweeper.enabled,
            settings.sweeper.interval,
            settings.public_bin.auto_refresh
        );
        Ok(settings)
    }

    /// Writes the settings as pretty RON.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        let text = ron::ser::to_string_pretty(self, pretty)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Brings every value into its valid range, returning how many were changed.
    pub fn normalize(&mut self) -> usize {
        let mut corrections = 0;

        let interval = self.sweeper.interval;
        if interval < i64::from(MIN_SWEEP_INTERVAL_SECS) {
            log::warn!(
                "Settings: sweep interval {interval}s is too small, using {DEFAULT_SWEEP_INTERVAL_SECS}s."
            );
            self.sweeper.interval = i64::from(DEFAULT_SWEEP_INTERVAL_SECS);
            corrections += 1;
        } else if interval > i64::from(MAX_SWEEP_INTERVAL_SECS) {
            log::warn!(
                "Settings: sweep interval {interval}s is too large, using {MAX_SWEEP_INTERVAL_SECS}s."
            );
            self.sweeper.interval = i64::from(MAX_SWEEP_INTERVAL_SECS);
            corrections += 1;
        }

        let blacklist: Vec<String> = self
            .sweeper
            .blacklist
            .iter()
            .map(|entry| normalize_type(entry))
            .filter(|entry| !entry.is_empty())
            .collect();
        if blacklist != self.sweeper.blacklist {
            corrections += 1;
            self.sweeper.blacklist = blacklist;
        }

        if self.enabled_zones.is_empty() {
            log::warn!("Settings: no enabled zones, defaulting to '{DEFAULT_ZONE}'.");
            self.enabled_zones.push(DEFAULT_ZONE.to_string());
            corrections += 1;
        }

        if self.public_bin.auto_refresh < 0 {
            log::warn!("Settings: negative auto-refresh disables the refresh.");
            self.public_bin.auto_refresh = 0;
            corrections += 1;
        }

        if self.public_bin.items_per_page == 0 {
            self.public_bin.items_per_page = DEFAULT_ITEMS_PER_PAGE;
            corrections += 1;
        }

        corrections
    }

    /// Sweep configuration snapshot.
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            interval_secs: u32::try_from(self.sweeper.interval.max(0)).unwrap_or(u32::MAX),
            enabled: self.sweeper.enabled,
            exclusions: self.sweeper.blacklist.iter().map(|s| normalize_type(s)).collect(),
            scope: self.enabled_zones.iter().cloned().collect(),
        }
    }

    /// Refresh configuration snapshot.
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval_secs: u32::try_from(self.public_bin.auto_refresh.max(0)).unwrap_or(u32::MAX),
        }
    }
}

/// A shared, atomically swappable settings snapshot.
///
/// Readers always see a complete snapshot; a failed reload keeps the previous one.
pub struct SharedSettings {
    path: Option<PathBuf>,
    current: RwLock<Arc<Settings>>,
}

impl SharedSettings {
    /// Wraps already-loaded settings with no backing file.
    pub fn new(mut settings: Settings) -> Self {
        settings.normalize();
        Self {
            path: None,
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Loads `path` (creating it with defaults if missing) and remembers it for
    /// [`reload`](Self::reload).
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = Settings::load_or_create(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(settings)),
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swaps in new settings after normalizing them.
    pub fn replace(&self, mut settings: Settings) {
        settings.normalize();
        let next = Arc::new(settings);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Re-reads the backing file. Without one, the current snapshot is kept.
    pub fn reload(&self) -> Result<Arc<Settings>, SettingsError> {
        if let Some(path) = &self.path {
            let settings = Settings::load_or_create(path)?;
            self.replace(settings);
            log::info!("Settings: reloaded '{}'.", path.display());
        }
        Ok(self.snapshot())
    }
}

impl ConfigSource for SharedSettings {
    fn sweep(&self) -> SweepConfig {
        self.snapshot().sweep_config()
    }

    fn refresh(&self) -> RefreshConfig {
        self.snapshot().refresh_config()
    }
}
