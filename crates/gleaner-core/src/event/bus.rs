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

use flume::{Receiver, SendError, Sender};

/// A generic, thread-safe event channel.
///
/// Generic over the event type `T` so that `gleaner-core` stays decoupled from
/// the concrete events defined by the engines and their hosts.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new bus backed by an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus initialized.");
        Self { sender, receiver }
    }

    /// Sends an event, logging instead of failing if every receiver is gone.
    pub fn publish(&self, event: T) {
        if let Err(e) = self.try_publish(event) {
            log::error!("EventBus: failed to publish: {e}. Receiver likely disconnected.");
        }
    }

    /// Sends an event, handing it back if the channel is disconnected.
    pub fn try_publish(&self, event: T) -> Result<(), SendError<T>> {
        self.sender.send(event)
    }

    /// Returns a clone of the sending half, for producers on other threads.
    pub fn sender(&self) -> Sender<T> {
        self.sender.clone()
    }

    /// Returns the receiving half, for the owner of the bus.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.receiver
    }

    /// Takes every event currently queued, without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
