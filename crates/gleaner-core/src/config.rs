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

//! Configuration snapshots read by the engines.

use crate::item::normalize_type;
use std::collections::BTreeSet;

/// Smallest sweep interval accepted from configuration, in seconds.
pub const MIN_SWEEP_INTERVAL_SECS: u32 = 10;
/// Largest sweep interval accepted from configuration, in seconds.
pub const MAX_SWEEP_INTERVAL_SECS: u32 = 3600;
/// Interval used when a configured value falls below the minimum.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u32 = 300;
/// Interval substituted at start time when none is usable.
pub const FALLBACK_SWEEP_INTERVAL_SECS: u32 = 60;

/// Immutable snapshot of the sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Seconds between two sweeps.
    pub interval_secs: u32,
    /// Master switch for the sweeper.
    pub enabled: bool,
    /// Normalized item types that are never collected.
    pub exclusions: BTreeSet<String>,
    /// Zones eligible for sweeping.
    pub scope: BTreeSet<String>,
}

impl SweepConfig {
    /// Returns `true` if `item_type` is on the exclusion list.
    pub fn is_excluded(&self, item_type: &str) -> bool {
        self.exclusions.contains(&normalize_type(item_type))
    }

    /// Returns `true` if `zone` is eligible for sweeping.
    pub fn in_scope(&self, zone: &str) -> bool {
        self.scope.contains(zone)
    }

    /// The interval to arm with, substituting a safe default for zero.
    pub fn effective_interval(&self) -> u32 {
        if self.interval_secs == 0 {
            FALLBACK_SWEEP_INTERVAL_SECS
        } else {
            self.interval_secs
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            enabled: true,
            exclusions: BTreeSet::new(),
            scope: BTreeSet::from(["world".to_string()]),
        }
    }
}

/// Immutable snapshot of the public bin refresh configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Seconds between two refreshes; `0` disables the refresh.
    pub interval_secs: u32,
}

impl RefreshConfig {
    /// The refresh is enabled whenever it has a positive interval.
    pub fn enabled(&self) -> bool {
        self.interval_secs > 0
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

/// Source of configuration snapshots.
///
/// Read once per start, reset, or reload; never watched continuously.
pub trait ConfigSource: Send + Sync {
    /// Current sweep configuration.
    fn sweep(&self) -> SweepConfig;

    /// Current refresh configuration.
    fn refresh(&self) -> RefreshConfig;
}
