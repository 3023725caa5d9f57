// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Software timers.
//!
//! Timers occupy a fixed pool of slots and, while armed, are threaded onto a
//! single intrusive list sorted by deadline under the wrap-safe order. The
//! hardware one-shot timer is always programmed for the head of that list,
//! so [`Kernel::isr_entry`] only ever has to walk expired heads.
//!
//! Timer handlers run from the interrupt path. They must be short and may
//! only post events, read the clock, or dispatch the ctimer callback; the
//! handler is a tagged variant rather than a bare function pointer so the
//! poll loop can apply the owner-liveness and queue-full rules per kind.
//!
//! List mutations happen inside the critical section because `start`/`stop`
//! run at task level while `poll` runs from the interrupt.

use abi::{
    config, timestamp_diff, timestamp_reached, EventData, EventId, OutOfSlots,
    ProcId, TimerId, Timespan, Timestamp,
};
use unwrap_lite::UnwrapLite;

use crate::arch;
use crate::counters::Drop;
use crate::time;
use crate::Kernel;

/// Signature of a ctimer callback. Receives the kernel (the callback runs
/// with the owning process as active context) and the word registered at
/// start.
pub type CtimerFn = fn(&mut Kernel, u32);

/// What to do when a timer expires.
#[derive(Copy, Clone, Debug)]
pub enum TimerHandler {
    /// Post `id`/`data` to `owner`. Cancelled if the owner exited; retried
    /// at later polls if the event ring was full.
    Etimer {
        owner: ProcId,
        id: EventId,
        data: EventData,
    },
    /// Invoke `func(data)` with `owner` as the active context. Cancelled if
    /// the owner exited.
    Ctimer {
        owner: ProcId,
        func: CtimerFn,
        data: u32,
    },
    /// Invoke a bare function. The function may re-arm the timer.
    Raw(fn(&mut Kernel, TimerId)),
}

fn unarmed(_: &mut Kernel, _: TimerId) {}

#[derive(Copy, Clone)]
pub(crate) struct TimerSlot {
    pub(crate) start: Timestamp,
    pub(crate) span: Timespan,
    pub(crate) handler: TimerHandler,
    pub(crate) linked: bool,
    /// Set when a poll pass removed the timer because it expired.
    pub(crate) fired: bool,
    /// Expiry happened but the event ring was full; the post is retried at
    /// each subsequent poll until it lands.
    pub(crate) refire: bool,
    pub(crate) next: Option<u8>,
}

pub(crate) struct TimerTable {
    pub(crate) slots: [Option<TimerSlot>; config::MAX_TIMERS],
    pub(crate) head: Option<u8>,
}

impl TimerTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: [None; config::MAX_TIMERS],
            head: None,
        }
    }

    pub(crate) fn slot(&self, t: TimerId) -> Option<&TimerSlot> {
        self.slots.get(t.index()).and_then(|s| s.as_ref())
    }

    pub(crate) fn slot_mut(&mut self, t: TimerId) -> Option<&mut TimerSlot> {
        self.slots.get_mut(t.index()).and_then(|s| s.as_mut())
    }

    fn deadline_of(&self, index: usize) -> Timestamp {
        let slot = self.slots[index].as_ref().unwrap_lite();
        slot.start.wrapping_add(slot.span)
    }

    pub(crate) fn head_deadline(&self) -> Option<Timestamp> {
        self.head.map(|h| self.deadline_of(h as usize))
    }

    fn insert_sorted(&mut self, index: usize) {
        let deadline = self.deadline_of(index);
        let mut prev: Option<u8> = None;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            if timestamp_diff(deadline, self.deadline_of(c as usize)) < 0 {
                break;
            }
            prev = Some(c);
            cursor = self.slots[c as usize].as_ref().unwrap_lite().next;
        }

        let slot = self.slots[index].as_mut().unwrap_lite();
        slot.next = cursor;
        slot.linked = true;
        match prev {
            None => self.head = Some(index as u8),
            Some(p) => {
                self.slots[p as usize].as_mut().unwrap_lite().next =
                    Some(index as u8);
            }
        }
    }

    fn unlink(&mut self, index: usize) {
        let linked = self.slots[index].as_ref().map_or(false, |s| s.linked);
        if !linked {
            return;
        }
        let successor = self.slots[index].as_ref().unwrap_lite().next;
        let mut prev: Option<u8> = None;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            if c as usize == index {
                match prev {
                    None => self.head = successor,
                    Some(p) => {
                        self.slots[p as usize].as_mut().unwrap_lite().next =
                            successor;
                    }
                }
                break;
            }
            prev = Some(c);
            cursor = self.slots[c as usize].as_ref().unwrap_lite().next;
        }
        let slot = self.slots[index].as_mut().unwrap_lite();
        slot.linked = false;
        slot.next = None;
    }

    fn is_sorted(&self) -> bool {
        let mut cursor = self.head;
        let mut last: Option<Timestamp> = None;
        while let Some(c) = cursor {
            let deadline = self.deadline_of(c as usize);
            if let Some(prior) = last {
                if timestamp_diff(deadline, prior) < 0 {
                    return false;
                }
            }
            last = Some(deadline);
            cursor = self.slots[c as usize].as_ref().unwrap_lite().next;
        }
        true
    }
}

impl Kernel {
    /// Claims a timer slot for the caller. The slot stays claimed until
    /// [`Kernel::timer_release`]; modules claim their timers once at init.
    pub fn timer_claim(&mut self) -> Result<TimerId, OutOfSlots> {
        let index = self
            .timers
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(OutOfSlots)?;
        self.timers.slots[index] = Some(TimerSlot {
            start: 0,
            span: 0,
            handler: TimerHandler::Raw(unarmed),
            linked: false,
            fired: false,
            refire: false,
            next: None,
        });
        Ok(TimerId(index as u8))
    }

    /// Stops and frees a timer slot.
    pub fn timer_release(&mut self, t: TimerId) {
        self.ptimer_stop(t);
        if t.index() < config::MAX_TIMERS {
            self.timers.slots[t.index()] = None;
        }
    }

    /// Arms `t` to expire `span` ticks from now, replacing any previous
    /// arming. The handler runs from the interrupt path on expiry.
    pub fn ptimer_start(
        &mut self,
        t: TimerId,
        span: Timespan,
        handler: TimerHandler,
    ) {
        let now = time::now();
        arch::critical(|| {
            self.timers.unlink(t.index());
            let Some(slot) = self.timers.slot_mut(t) else {
                return;
            };
            slot.start = now;
            slot.span = span;
            slot.handler = handler;
            slot.fired = false;
            slot.refire = false;
            self.timers.insert_sorted(t.index());
        });
        debug_assert!(self.timers.is_sorted(), "timer list out of order");
        self.rtimer_sync();
    }

    /// Re-arms `t` with its previous span, measured from now.
    pub fn ptimer_restart(&mut self, t: TimerId) {
        let now = time::now();
        self.relink(t, |_, _| now);
    }

    /// Re-arms `t` with its previous span, measured from its previous
    /// deadline. Successive resets keep a periodic timer phase-locked to
    /// `start + k * span` no matter how late each expiry was observed; a
    /// deadline already in the past simply fires once at the next poll.
    pub fn ptimer_reset(&mut self, t: TimerId) {
        self.relink(t, |start, span| start.wrapping_add(span));
    }

    fn relink(
        &mut self,
        t: TimerId,
        new_start: impl FnOnce(Timestamp, Timespan) -> Timestamp,
    ) {
        arch::critical(|| {
            self.timers.unlink(t.index());
            let Some(slot) = self.timers.slot_mut(t) else {
                return;
            };
            slot.start = new_start(slot.start, slot.span);
            slot.fired = false;
            slot.refire = false;
            self.timers.insert_sorted(t.index());
        });
        debug_assert!(self.timers.is_sorted(), "timer list out of order");
        self.rtimer_sync();
    }

    /// Disarms `t`. Idempotent; a timer that already expired or was never
    /// started is left alone.
    pub fn ptimer_stop(&mut self, t: TimerId) {
        arch::critical(|| {
            self.timers.unlink(t.index());
            if let Some(slot) = self.timers.slot_mut(t) {
                slot.refire = false;
            }
        });
        self.rtimer_sync();
    }

    /// True once `t`'s deadline has been reached, or once a poll pass has
    /// removed it.
    pub fn ptimer_expired(&self, t: TimerId) -> bool {
        match self.timers.slot(t) {
            None => true,
            Some(slot) => {
                slot.fired
                    || timestamp_reached(
                        time::now(),
                        slot.start.wrapping_add(slot.span),
                    )
            }
        }
    }

    /// Walks expired timers off the head of the list and runs their
    /// handlers. Called from the interrupt path via [`Kernel::isr_entry`].
    ///
    /// A handler may re-arm its own timer; the re-inserted deadline is in
    /// the future, so the walk terminates. The unlink and the expiry
    /// decision happen inside one critical section so a concurrent `stop`
    /// cannot race the dispatch.
    pub(crate) fn ptimer_poll(&mut self) {
        self.etimer_retry_pending();
        loop {
            let expired = arch::critical(|| {
                let head = self.timers.head?;
                let index = head as usize;
                if !timestamp_reached(
                    time::now(),
                    self.timers.deadline_of(index),
                ) {
                    return None;
                }
                self.timers.unlink(index);
                let slot = self.timers.slots[index].as_mut().unwrap_lite();
                slot.fired = true;
                Some((TimerId(head), slot.handler))
            });
            let Some((t, handler)) = expired else {
                break;
            };
            self.fire(t, handler);
        }
        self.rtimer_sync();
    }

    fn fire(&mut self, t: TimerId, handler: TimerHandler) {
        match handler {
            TimerHandler::Etimer { owner, id, data } => {
                if !self.alive(owner) {
                    // Owner exited since arming; cancel quietly.
                    self.count_drop(Drop::ExitedEtimerOwner);
                } else if self.post(Some(owner), id, data).is_err() {
                    if let Some(slot) = self.timers.slot_mut(t) {
                        slot.refire = true;
                    }
                    self.count_drop(Drop::RefirePending);
                }
            }
            TimerHandler::Ctimer { owner, func, data } => {
                if !self.alive(owner) {
                    self.count_drop(Drop::ExitedCtimerOwner);
                } else {
                    self.ctx.push(owner);
                    func(self, data);
                    self.ctx.pop(owner);
                }
            }
            TimerHandler::Raw(func) => func(self, t),
        }
    }
}
