// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protothread resume state.
//!
//! A process is a plain function that gets called once per delivered event.
//! To look like a linear task, the function stores a small resume label in
//! its [`ProtoState`] before returning and dispatches on that label on the
//! next entry. There is no stack to save: any state that must survive a
//! yield lives in the process's own static storage, not in locals.
//!
//! # Writing a process
//!
//! The control constructs of the original macro-based formulation map onto a
//! `match` over the resume label:
//!
//! ```text
//! BEGIN                  label 0 (the initial resume point); runs on INIT
//! END / EXIT             return ThreadResult::Exited
//! WAIT_EVENT             store a label, return Waiting; the labelled arm
//!                        runs on the next delivered event
//! WAIT_EVENT_UNTIL(c)    as WAIT_EVENT, but the labelled arm returns
//!                        Waiting again while `c` is false
//! WAIT_UNTIL(c)          test `c` first and fall through if already true,
//!                        else park exactly like WAIT_EVENT_UNTIL(c)
//! YIELD                  store a label, return Yielded
//! PAUSE                  store a label, call `kernel.poll_request(self)`,
//!                        return Yielded; the POLL event re-enters promptly
//! SPAWN(child)           `kernel.start(child, data)`; if the child is
//!                        already gone (it exited during INIT) fall through,
//!                        else wait for the EXIT broadcast carrying
//!                        `EventData::Proc(child)`
//! ```
//!
//! A minimal periodic process:
//!
//! ```ignore
//! fn blink(kernel: &mut Kernel, this: ProcId, ev: &Event) -> ThreadResult {
//!     const TICK: u16 = 1;
//!     match kernel.resume_point(this) {
//!         0 => {
//!             let t = kernel.timer_claim().unwrap_lite();
//!             kernel.etimer_start(t, 500, this, EVENT_TIMEOUT, EventData::Timer(t));
//!             kernel.set_resume_point(this, TICK);
//!             ThreadResult::Waiting
//!         }
//!         TICK => {
//!             if let EventData::Timer(t) = ev.data {
//!                 if kernel.etimer_expired(t) {
//!                     toggle_led();
//!                     kernel.etimer_reset(t);
//!                 }
//!             }
//!             ThreadResult::Waiting
//!         }
//!         _ => ThreadResult::Exited,
//!     }
//! }
//! ```

/// Resume token of a process. Zero is the initial label; a freshly started
/// process always begins there.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProtoState {
    resume: u16,
}

impl ProtoState {
    pub(crate) fn resume(&self) -> u16 {
        self.resume
    }

    pub(crate) fn jump(&mut self, label: u16) {
        self.resume = label;
    }
}

/// What a thread function reports back to the dispatcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ThreadResult {
    /// The process yielded and wants to run again on the next event.
    Yielded,
    /// The process parked at a wait point.
    Waiting,
    /// The process is done; the kernel tears it down.
    Exited,
}
