// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback timers: software timers that invoke a function on expiry, with
//! the process that started them restored as the active context.
//!
//! The callback runs from the interrupt path and is subject to the same
//! rules as any timer handler: keep it short, post events rather than doing
//! work. The saved context is what lets a callback start further timers or
//! post events that are attributed to the right process.

use abi::{NoContext, TimerId, Timespan};

use crate::ptimer::{CtimerFn, TimerHandler};
use crate::Kernel;

impl Kernel {
    /// Arms `t` to call `func(data)` in `span` ticks, owned by the process
    /// currently executing. Fails outside of any process context.
    ///
    /// If the owner exits before expiry the callback is cancelled quietly.
    pub fn ctimer_start(
        &mut self,
        t: TimerId,
        span: Timespan,
        func: CtimerFn,
        data: u32,
    ) -> Result<(), NoContext> {
        let owner = self.current().ok_or(NoContext)?;
        self.ptimer_start(t, span, TimerHandler::Ctimer { owner, func, data });
        Ok(())
    }

    /// Re-arms with the previous span and callback, measured from now.
    pub fn ctimer_restart(&mut self, t: TimerId) {
        self.ptimer_restart(t);
    }

    pub fn ctimer_stop(&mut self, t: TimerId) {
        self.ptimer_stop(t);
    }

    pub fn ctimer_expired(&self, t: TimerId) -> bool {
        self.ptimer_expired(t)
    }
}
