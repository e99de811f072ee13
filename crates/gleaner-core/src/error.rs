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

//! Errors surfaced by the engines to their direct callers.
//!
//! Failures inside scheduled units never reach these types: they are logged
//! where they happen and the unit moves on.

use crate::scheduler::SchedulingError;
use crate::sink::SinkError;
use thiserror::Error;

/// An error returned by an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configured value was out of bounds and could not be substituted.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
    /// The backend refused to schedule the engine's work.
    #[error("scheduling failed: {0}")]
    SchedulingFailure(#[from] SchedulingError),
    /// The feature is switched off in the configuration.
    #[error("feature is disabled by configuration")]
    Disabled,
    /// The commit sink rejected a write.
    #[error("commit sink unavailable: {0}")]
    SinkUnavailable(#[from] SinkError),
}
