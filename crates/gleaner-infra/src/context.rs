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

//! Tracks which execution context the current thread is serving.

use gleaner_core::ContextId;
use std::cell::Cell;

thread_local! {
    static CURRENT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// The context the calling thread is currently executing for.
///
/// `None` on the global context and on threads that no scheduler owns.
pub fn current_context() -> Option<ContextId> {
    CURRENT.with(|c| c.get())
}

/// Runs `f` with the current context set to `context`, restoring the previous
/// value afterwards (units may nest under the manual scheduler).
pub(crate) fn with_context<R>(context: Option<ContextId>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|c| c.replace(context));
    let result = f();
    CURRENT.with(|c| c.set(previous));
    result
}
