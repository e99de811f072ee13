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

//! Backend selection, detected once per process.

use crate::partitioned::PartitionedScheduler;
use crate::unified::UnifiedScheduler;
use gleaner_core::{BackendKind, BackendPreference, Scheduler, SchedulingError};
use std::sync::{Arc, OnceLock};
use std::thread;

static PARTITIONED_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Returns whether the host can run the partitioned backend.
///
/// Detection runs on first call only; later calls return the cached answer.
pub fn partitioned_available() -> bool {
    *PARTITIONED_AVAILABLE.get_or_init(|| {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        log::debug!("Backend: host reports {parallelism} units of parallelism.");
        parallelism > 1
    })
}

/// Resolves a preference to the backend that will run.
///
/// Never fails: without partitioned support `Auto` yields `Unified`. An explicit
/// preference always wins over detection.
pub fn detect_backend(preference: BackendPreference) -> BackendKind {
    let kind = match preference {
        BackendPreference::Unified => BackendKind::Unified,
        BackendPreference::Partitioned => BackendKind::Partitioned,
        BackendPreference::Auto => {
            if partitioned_available() {
                BackendKind::Partitioned
            } else {
                BackendKind::Unified
            }
        }
    };
    log::info!("Backend: {preference:?} resolved to {kind}.");
    kind
}

/// Default worker count for the partitioned backend.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builds the scheduler for `kind`.
///
/// `workers` only applies to [`BackendKind::Partitioned`]; `None` uses one
/// worker per unit of available parallelism.
pub fn build_scheduler(
    kind: BackendKind,
    workers: Option<usize>,
) -> Result<Arc<dyn Scheduler>, SchedulingError> {
    Ok(match kind {
        BackendKind::Unified => Arc::new(UnifiedScheduler::new()?),
        BackendKind::Partitioned => Arc::new(PartitionedScheduler::new(
            workers.unwrap_or_else(default_workers),
        )?),
    })
}
