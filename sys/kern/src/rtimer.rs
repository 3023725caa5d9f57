// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware one-shot timer bookkeeping.
//!
//! There is exactly one hardware timer and at most one outstanding deadline;
//! re-arming replaces it. Everything the kernel wants woken up for funnels
//! through [`Kernel::rtimer_sync`], which programs the hardware for the
//! earliest software-timer deadline (or disarms it when none is armed).
//!
//! The hardware counter is narrower and faster than the millisecond clock.
//! A deadline further out than the wrap-safe horizon is clamped: the
//! interrupt fires early, the poll finds nothing expired, and the timer is
//! simply re-armed for the remainder.

use abi::{config, timestamp_diff, RtimerStamp};

use crate::arch;
use crate::time;
use crate::Kernel;

/// Furthest future the hardware counter can unambiguously represent.
const MAX_FUTURE: RtimerStamp = i16::MAX as RtimerStamp;

pub(crate) struct RtimerState {
    setting: Option<RtimerStamp>,
}

impl RtimerState {
    pub(crate) fn new() -> Self {
        Self { setting: None }
    }
}

impl Kernel {
    /// Reprograms (or disarms) the hardware timer to match the head of the
    /// software timer list. Every arming in the system goes through here,
    /// which is what keeps "at most one outstanding" true by construction.
    pub(crate) fn rtimer_sync(&mut self) {
        match self.timers.head_deadline() {
            None => {
                if self.rtimer.setting.is_some() {
                    arch::rtimer_disarm();
                    self.rtimer.setting = None;
                }
            }
            Some(deadline) => {
                let stop = stop_for(deadline);
                if self.rtimer.setting != Some(stop) {
                    arch::rtimer_arm(stop);
                    self.rtimer.setting = Some(stop);
                }
            }
        }
    }

    /// The deadline currently programmed into the hardware, if any. Mirrors
    /// the hardware state exactly.
    pub fn rtimer_setting(&self) -> Option<RtimerStamp> {
        self.rtimer.setting
    }

    /// Platform entry point for the timer interrupt: polls the software
    /// timers and re-arms for whatever is next.
    pub fn isr_entry(&mut self) {
        // The one-shot has fired; nothing is outstanding now.
        self.rtimer.setting = None;
        self.ptimer_poll();
    }
}

/// Converts a millisecond deadline into a hardware stop stamp, clamped to
/// the wrap-safe horizon. A deadline already in the past maps to "now",
/// i.e. fire as soon as possible.
fn stop_for(deadline: abi::Timestamp) -> RtimerStamp {
    let arch_now = arch::rtimer_now();
    let remaining = timestamp_diff(deadline, time::now());
    if remaining <= 0 {
        return arch_now;
    }
    let ticks = (remaining as u64 * config::RTIMER_TICKS_PER_SEC as u64)
        / config::TIMESTAMP_TICKS_PER_SEC as u64;
    arch_now.wrapping_add(ticks.min(MAX_FUTURE as u64) as RtimerStamp)
}
