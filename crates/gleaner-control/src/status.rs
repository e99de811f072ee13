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

//! Human-readable engine status snapshots.

use gleaner_core::BackendKind;
use std::fmt;

/// Snapshot of a [`SweepEngine`](crate::SweepEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    /// Whether the periodic sweep is scheduled.
    pub armed: bool,
    /// Whether configuration enables the sweeper.
    pub enabled: bool,
    /// Configured interval in seconds.
    pub interval_secs: u32,
    /// Seconds until the next sweep, `None` when not running.
    pub remaining_secs: Option<i64>,
    /// Sweeps started since creation.
    pub executions: u64,
    /// Items committed by the most recent completed sweep.
    pub last_collected: Option<usize>,
    /// Current participant count.
    pub participants: i64,
    /// Sessions started but not yet committed.
    pub sessions_in_flight: usize,
    /// Backend the engine runs on.
    pub backend: BackendKind,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sweeper: {} ({} backend)",
            if !self.enabled {
                "disabled"
            } else if self.armed {
                "running"
            } else {
                "idle"
            },
            self.backend
        )?;
        writeln!(f, "  interval:      {}s", self.interval_secs)?;
        match self.remaining_secs {
            Some(secs) => writeln!(f, "  next sweep in: {secs}s")?,
            None => writeln!(f, "  next sweep in: not running")?,
        }
        writeln!(f, "  executions:    {}", self.executions)?;
        match self.last_collected {
            Some(count) => writeln!(f, "  last sweep:    {count} items")?,
            None => writeln!(f, "  last sweep:    never")?,
        }
        writeln!(f, "  participants:  {}", self.participants)?;
        write!(f, "  in flight:     {}", self.sessions_in_flight)
    }
}

/// Snapshot of a [`RefreshEngine`](crate::RefreshEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStatus {
    /// Whether the periodic refresh is scheduled.
    pub armed: bool,
    /// Configured interval in seconds; `0` means disabled.
    pub interval_secs: u32,
    /// Refreshes run since creation.
    pub executions: u64,
    /// Items cleared by the most recent refresh.
    pub last_cleared: Option<usize>,
    /// Current participant count.
    pub participants: i64,
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interval_secs == 0 {
            writeln!(f, "Refresh: disabled")?;
        } else {
            writeln!(
                f,
                "Refresh: every {}s, {}",
                self.interval_secs,
                if self.armed { "running" } else { "idle" }
            )?;
        }
        writeln!(f, "  executions:   {}", self.executions)?;
        match self.last_cleared {
            Some(count) => writeln!(f, "  last refresh: {count} items cleared")?,
            None => writeln!(f, "  last refresh: never")?,
        }
        write!(f, "  participants: {}", self.participants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_engine_reports_not_running() {
        let status = EngineStatus {
            armed: false,
            enabled: true,
            interval_secs: 300,
            remaining_secs: None,
            executions: 2,
            last_collected: Some(14),
            participants: 0,
            sessions_in_flight: 0,
            backend: BackendKind::Unified,
        };
        let text = status.to_string();
        assert!(text.contains("idle"));
        assert!(text.contains("not running"));
        assert!(text.contains("14 items"));
    }

    #[test]
    fn disabled_refresh_says_so() {
        let status = RefreshStatus {
            armed: false,
            interval_secs: 0,
            executions: 0,
            last_cleared: None,
            participants: 3,
        };
        assert!(status.to_string().starts_with("Refresh: disabled"));
    }
}
