// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event timers: software timers that post an event to an owning process on
//! expiry.
//!
//! An etimer whose post hits a full event ring is never silently dropped;
//! the expiry is flagged and retried at every subsequent poll (and whenever
//! the scheduler frees a ring slot) until it lands. An etimer whose owner
//! has exited is cancelled quietly; the cancellation shows up in the debug
//! counters.

use abi::{config, EventData, EventId, ProcId, TimerId, Timespan};

use crate::counters::Drop;
use crate::ptimer::TimerHandler;
use crate::Kernel;

impl Kernel {
    /// Arms `t` to post `id`/`data` to `owner` in `span` ticks.
    ///
    /// Processes conventionally pass their own id, `EVENT_TIMEOUT`, and
    /// `EventData::Timer(t)` so the receiving arm can tell its timers
    /// apart.
    pub fn etimer_start(
        &mut self,
        t: TimerId,
        span: Timespan,
        owner: ProcId,
        id: EventId,
        data: EventData,
    ) {
        self.ptimer_start(t, span, TimerHandler::Etimer { owner, id, data });
    }

    /// Re-arms with the previous span, measured from now.
    pub fn etimer_restart(&mut self, t: TimerId) {
        self.ptimer_restart(t);
    }

    /// Re-arms with the previous span, measured from the previous deadline
    /// (phase-preserving; see [`Kernel::ptimer_reset`]).
    pub fn etimer_reset(&mut self, t: TimerId) {
        self.ptimer_reset(t);
    }

    pub fn etimer_stop(&mut self, t: TimerId) {
        self.ptimer_stop(t);
    }

    pub fn etimer_expired(&self, t: TimerId) -> bool {
        self.ptimer_expired(t)
    }

    /// Retries expiries whose event post found the ring full. Runs at the
    /// head of every poll and after the scheduler dequeues an event.
    pub(crate) fn etimer_retry_pending(&mut self) {
        for index in 0..config::MAX_TIMERS {
            let pending = match &self.timers.slots[index] {
                Some(slot) if slot.refire => Some(slot.handler),
                _ => None,
            };
            let Some(TimerHandler::Etimer { owner, id, data }) = pending
            else {
                continue;
            };
            if !self.alive(owner) {
                if let Some(slot) = self.timers.slots[index].as_mut() {
                    slot.refire = false;
                }
                self.count_drop(Drop::ExitedEtimerOwner);
            } else if self.post(Some(owner), id, data).is_ok() {
                if let Some(slot) = self.timers.slots[index].as_mut() {
                    slot.refire = false;
                }
            }
        }
    }
}
