// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The myos cooperative core.
//!
//! This crate implements a process abstraction built on stackless
//! protothreads, an event-driven scheduler, and a two-level timer system:
//!
//! - [`proc`] / [`proto`] -- processes are plain functions re-entered at a
//!   stored resume point; between yields a process runs to completion and is
//!   never preempted by another process.
//! - [`sched`] -- a bounded ring of pending events drained by
//!   [`Kernel::run`], delivering unicast and broadcast events to process
//!   thread functions.
//! - [`ptimer`] -- software timers kept in a deadline-sorted list and polled
//!   from the hardware timer interrupt; [`etimer`] and [`ctimer`] specialize
//!   them to "post an event" and "call back in a process context".
//! - [`rtimer`] -- bookkeeping for the single one-shot hardware timer that
//!   drives the whole thing.
//!
//! All state lives in one [`Kernel`] value; there are no global tables. The
//! platform supplies the clock, the hardware timer, and the critical-section
//! primitive through [`arch`], and calls [`Kernel::isr_entry`] from its timer
//! interrupt.
//!
//! # Execution model
//!
//! There is exactly one logical executor. The only "concurrency" is the
//! interrupt-context path through [`Kernel::isr_entry`], which may only poll
//! timers, post events, and run timer handlers; everything it touches that is
//! shared with task-level code (the event ring, the timer list) is mutated
//! under the [`arch::critical`] section.

#![cfg_attr(target_os = "none", no_std)]

pub mod arch;
pub mod counters;
pub mod ctimer;
pub mod etimer;
pub mod proc;
pub mod proto;
pub mod ptimer;
pub mod rtimer;
pub mod sched;
pub mod time;
pub mod util;

pub use proc::{ProcessDesc, ThreadFn};
pub use proto::ThreadResult;
pub use ptimer::{CtimerFn, TimerHandler};
pub use sched::RunResult;

/// The whole operating system core: process table, event ring, timer table,
/// and the active-context stack.
///
/// Applications create exactly one of these, register their processes, and
/// then alternate [`Kernel::run`] with the platform's wait-for-interrupt
/// primitive, feeding timer interrupts back in through
/// [`Kernel::isr_entry`].
pub struct Kernel {
    pub(crate) procs: proc::ProcessTable,
    pub(crate) ctx: proc::ContextStack,
    pub(crate) queue: sched::EventQueue,
    pub(crate) timers: ptimer::TimerTable,
    pub(crate) rtimer: rtimer::RtimerState,
    pub(crate) drops: counters::DropCounters,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            procs: proc::ProcessTable::new(),
            ctx: proc::ContextStack::new(),
            queue: sched::EventQueue::new(),
            timers: ptimer::TimerTable::new(),
            rtimer: rtimer::RtimerState::new(),
            drops: counters::DropCounters::new(),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
