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

//! Server-wide announcements emitted by the engines.

use crate::event::EventBus;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Something the engines want every participant to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// A sweep is about to run.
    SweepWarning {
        /// Seconds left before the sweep.
        seconds: u32,
    },
    /// A sweep committed items to the public bin.
    SweepCompleted {
        /// Number of items collected.
        count: usize,
    },
    /// The public bin was emptied by the refresh engine.
    BinRefreshed {
        /// Number of items removed.
        cleared: usize,
    },
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::SweepWarning { seconds } => write!(
                f,
                "[Sweeper] Ground items will be swept in {seconds} seconds, pick up anything important!"
            ),
            Announcement::SweepCompleted { count } => write!(
                f,
                "Ground litter was swept into the public bin, {count} items collected"
            ),
            Announcement::BinRefreshed { cleared } => {
                write!(f, "The public bin was refreshed, {cleared} items cleared")
            }
        }
    }
}

/// Errors raised while delivering an announcement.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Nobody is listening on the other end.
    #[error("broadcast channel disconnected")]
    Disconnected,
    /// Delivery failed for a transport-specific reason.
    #[error("broadcast failed: {0}")]
    Failed(String),
}

/// Fire-and-forget broadcast channel.
///
/// Engines log and swallow every error returned here.
pub trait Broadcast: Send + Sync {
    /// Delivers `announcement` to every participant.
    fn announce(&self, announcement: &Announcement) -> Result<(), BroadcastError>;
}

/// A [`Broadcast`] that publishes onto an [`EventBus`].
#[derive(Debug, Clone)]
pub struct BusBroadcast {
    bus: Arc<EventBus<Announcement>>,
}

impl BusBroadcast {
    /// Wraps an existing bus.
    pub fn new(bus: Arc<EventBus<Announcement>>) -> Self {
        Self { bus }
    }

    /// The bus announcements are published on.
    pub fn bus(&self) -> &Arc<EventBus<Announcement>> {
        &self.bus
    }
}

impl Broadcast for BusBroadcast {
    fn announce(&self, announcement: &Announcement) -> Result<(), BroadcastError> {
        self.bus
            .try_publish(announcement.clone())
            .map_err(|_| BroadcastError::Disconnected)
    }
}

/// Delivers an announcement, logging and swallowing any failure.
pub fn announce_quietly(channel: &dyn Broadcast, announcement: Announcement) {
    if let Err(e) = channel.announce(&announcement) {
        log::warn!("Broadcast: failed to deliver '{announcement}': {e}");
    }
}
