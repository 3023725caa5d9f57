// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug counters for the dispatcher's silent decisions.
//!
//! Dropping a unicast for a process that has exited, or cancelling a timer
//! whose owner is gone, is correct behavior -- but invisible. Each such
//! decision bumps a counter so tests and debuggers can see it happen.

use enum_map::{Enum, EnumMap};

use crate::Kernel;

/// The silent decisions worth counting.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Drop {
    /// Unicast event dropped because its target is not registered.
    UnknownTarget,
    /// Event timer expiry cancelled because the owner exited.
    ExitedEtimerOwner,
    /// Callback timer expiry cancelled because the owner exited.
    ExitedCtimerOwner,
    /// Event timer expiry deferred because the event ring was full.
    RefirePending,
}

pub(crate) struct DropCounters {
    map: EnumMap<Drop, u32>,
}

impl DropCounters {
    pub(crate) fn new() -> Self {
        Self {
            map: EnumMap::default(),
        }
    }

    pub(crate) fn bump(&mut self, reason: Drop) {
        self.map[reason] = self.map[reason].saturating_add(1);
    }
}

impl Kernel {
    /// How many times `reason` has occurred since boot.
    pub fn drop_count(&self, reason: Drop) -> u32 {
        self.drops.map[reason]
    }
}
