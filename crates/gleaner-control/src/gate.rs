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

//! Arms and disarms an engine as participants come and go.

use gleaner_core::EngineError;
use std::sync::{Mutex, MutexGuard};

/// Something the [`OccupancyGate`] can arm and disarm.
pub trait Gated {
    /// Whether the gated work is currently scheduled.
    fn is_armed(&self) -> bool;
    /// Whether configuration allows the work at all.
    fn is_enabled(&self) -> bool;
    /// Schedules the work.
    fn arm(&self) -> Result<(), EngineError>;
    /// Cancels the work. Idempotent.
    fn disarm(&self);
}

/// A signed participant counter.
///
/// The counter is never clamped: unmatched leaves drive it negative and the
/// same number of joins is then needed before the target arms again.
#[derive(Debug, Default)]
pub struct OccupancyGate {
    count: Mutex<i64>,
}

impl OccupancyGate {
    /// An empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current participant count.
    pub fn count(&self) -> i64 {
        *self.lock()
    }

    /// Records a join and arms `target` on the way up.
    ///
    /// Arming failures are logged and not retried; the next join tries again.
    pub fn joined(&self, target: &dyn Gated) -> i64 {
        let mut count = self.lock();
        *count += 1;
        if *count > 0 && target.is_enabled() && !target.is_armed() {
            if let Err(e) = target.arm() {
                log::error!("Gate: failed to arm with {} participants: {e}", *count);
            }
        }
        *count
    }

    /// Records a leave and disarms `target` once nobody is left.
    pub fn left(&self, target: &dyn Gated) -> i64 {
        let mut count = self.lock();
        *count -= 1;
        if *count <= 0 && target.is_armed() {
            target.disarm();
        }
        *count
    }

    /// Forgets every participant.
    pub fn reset(&self) {
        *self.lock() = 0;
    }

    fn lock(&self) -> MutexGuard<'_, i64> {
        match self.count.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::SchedulingError;
    use std::cell::Cell;

    #[derive(Default)]
    struct Target {
        armed: Cell<bool>,
        disabled: bool,
        fail: bool,
        arms: Cell<usize>,
    }

    impl Gated for Target {
        fn is_armed(&self) -> bool {
            self.armed.get()
        }
        fn is_enabled(&self) -> bool {
            !self.disabled
        }
        fn arm(&self) -> Result<(), EngineError> {
            self.arms.set(self.arms.get() + 1);
            if self.fail {
                return Err(SchedulingError::ShutDown.into());
            }
            self.armed.set(true);
            Ok(())
        }
        fn disarm(&self) {
            self.armed.set(false);
        }
    }

    #[test]
    fn armed_iff_positive_and_enabled() {
        // Every join/leave sequence up to eight calls, bit set = join.
        for len in 1..=8u32 {
            for bits in 0..(1u32 << len) {
                for disabled in [false, true] {
                    let gate = OccupancyGate::new();
                    let target = Target {
                        disabled,
                        ..Default::default()
                    };
                    for step in 0..len {
                        if bits & (1 << step) != 0 {
                            gate.joined(&target);
                        } else {
                            gate.left(&target);
                        }
                        assert_eq!(
                            target.is_armed(),
                            !disabled && gate.count() > 0,
                            "sequence {bits:b} of {len}, step {step}, count {}",
                            gate.count()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn counter_goes_negative() {
        let gate = OccupancyGate::new();
        let target = Target::default();
        assert_eq!(gate.left(&target), -1);
        assert_eq!(gate.joined(&target), 0);
        assert!(!target.is_armed());
        assert_eq!(gate.joined(&target), 1);
        assert!(target.is_armed());
    }

    #[test]
    fn disabled_target_never_arms() {
        let gate = OccupancyGate::new();
        let target = Target {
            disabled: true,
            ..Default::default()
        };
        gate.joined(&target);
        assert!(!target.is_armed());
        assert_eq!(target.arms.get(), 0);
    }

    #[test]
    fn arming_failure_leaves_target_disarmed() {
        let gate = OccupancyGate::new();
        let target = Target {
            fail: true,
            ..Default::default()
        };
        gate.joined(&target);
        assert!(!target.is_armed());
        assert_eq!(gate.count(), 1);

        // The next join attempts again.
        gate.joined(&target);
        assert_eq!(target.arms.get(), 2);
    }
}
