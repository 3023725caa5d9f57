// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event queue and scheduler loop.
//!
//! Pending events sit in a bounded ring. Producers include interrupt-context
//! code (timer expiries), so both ends of the ring are touched only inside
//! the critical section. The ring never drops silently: a full ring fails
//! the post and the caller decides what to do (the event timer layer, for
//! one, retries at the next poll).

use abi::{config, Event, EventData, EventId, ProcId, QueueFull, EVENT_POLL};

use crate::arch;
use crate::counters::Drop;
use crate::Kernel;

pub(crate) struct EventQueue {
    ring: [Option<Event>; config::EVENT_QUEUE_CAPACITY],
    head: usize,
    count: usize,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self {
            ring: [None; config::EVENT_QUEUE_CAPACITY],
            head: 0,
            count: 0,
        }
    }

    pub(crate) fn push(&mut self, ev: Event) -> Result<(), QueueFull> {
        if self.count == config::EVENT_QUEUE_CAPACITY {
            return Err(QueueFull);
        }
        let tail = (self.head + self.count) % config::EVENT_QUEUE_CAPACITY;
        self.ring[tail] = Some(ev);
        self.count += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<Event> {
        if self.count == 0 {
            return None;
        }
        let ev = self.ring[self.head].take();
        self.head = (self.head + 1) % config::EVENT_QUEUE_CAPACITY;
        self.count -= 1;
        debug_assert!(ev.is_some(), "occupied ring entry was empty");
        ev
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }
}

/// Outcome of one scheduler step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunResult {
    /// An event or poll was delivered; call again.
    Worked,
    /// Nothing pending. The host may sleep until the next interrupt.
    Idle,
}

impl Kernel {
    /// Enqueues an event for later delivery by [`Kernel::run`].
    ///
    /// `target == None` broadcasts to every process registered at delivery
    /// time. Safe to call from the interrupt path. Fails (rather than
    /// dropping) when the ring is full.
    pub fn post(
        &mut self,
        target: Option<ProcId>,
        id: EventId,
        data: EventData,
    ) -> Result<(), QueueFull> {
        let ev = Event { id, data, target };
        arch::critical(|| self.queue.push(ev))
    }

    /// Delivers an event immediately, bypassing the queue, before returning
    /// to the caller. Used for notifications that must not race with queued
    /// traffic. Unicast to a process that has exited is dropped (counted).
    pub fn post_sync(
        &mut self,
        target: Option<ProcId>,
        id: EventId,
        data: EventData,
    ) {
        let ev = Event { id, data, target };
        match target {
            Some(pid) => {
                if self.alive(pid) {
                    self.dispatch(pid, &ev);
                } else {
                    self.count_drop(Drop::UnknownTarget);
                }
            }
            None => {
                let snap = self.procs.snapshot();
                for pid in snap.iter() {
                    self.dispatch(pid, &ev);
                }
            }
        }
    }

    /// Number of events waiting in the ring.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// One scheduler step: drain poll requests, then deliver at most one
    /// queued event.
    ///
    /// Returns [`RunResult::Idle`] only when no poll request and no queued
    /// event remained, so pending polls are always drained before the
    /// scheduler reports idle.
    pub fn run_once(&mut self) -> RunResult {
        let polled = self.drain_polls();

        let Some(ev) = arch::critical(|| self.queue.pop()) else {
            return if polled { RunResult::Worked } else { RunResult::Idle };
        };

        // Space just opened up in the ring; let any timer whose post hit a
        // full ring land its event now.
        self.etimer_retry_pending();

        match ev.target {
            Some(pid) => {
                if self.alive(pid) {
                    self.dispatch(pid, &ev);
                } else {
                    // The target exited while the event was in flight.
                    self.count_drop(Drop::UnknownTarget);
                }
            }
            None => {
                let snap = self.procs.snapshot();
                for pid in snap.iter() {
                    self.dispatch(pid, &ev);
                }
            }
        }
        RunResult::Worked
    }

    /// Runs the scheduler until it reports idle. The host then waits for
    /// the next timer interrupt and calls [`Kernel::isr_entry`].
    pub fn run(&mut self) {
        while self.run_once() == RunResult::Worked {}
        debug_assert!(self.ctx.is_empty(), "run() returned inside a dispatch");
    }

    fn drain_polls(&mut self) -> bool {
        let mut worked = false;
        let snap = self.procs.snapshot();
        for pid in snap.iter() {
            if self.take_poll_request(pid) {
                worked = true;
                let ev = Event {
                    id: EVENT_POLL,
                    data: EventData::None,
                    target: Some(pid),
                };
                self.dispatch(pid, &ev);
            }
        }
        worked
    }
}
