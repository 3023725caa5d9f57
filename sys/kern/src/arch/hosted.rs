// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hosted platform: a virtual clock under the control of the host program.
//!
//! Nothing here ticks by itself. Tests and the demo binary move time with
//! [`set_time`] / [`advance`], watch the "hardware" one-shot with [`armed`]
//! and [`timer_fired`], and call `Kernel::isr_entry` when it fires --
//! standing in for the interrupt a real platform would deliver. Everything
//! is thread-local, so parallel test threads get independent platforms.
//!
//! The critical section only counts its nesting depth: there are no real
//! interrupts to mask, but the depth is observable so tests can assert
//! balance.

use core::cell::Cell;

use abi::{config, rtimer_diff, RtimerStamp, Timespan, Timestamp};

use crate::time::read_stable;

thread_local! {
    static NOW: Cell<Timestamp> = Cell::new(0);
    static RTIMER: Cell<Option<RtimerStamp>> = Cell::new(None);
    static CRITICAL_DEPTH: Cell<u32> = Cell::new(0);
}

pub fn now() -> Timestamp {
    read_stable(|| NOW.with(|c| c.get()))
}

/// The fine tick, derived from the millisecond clock at the configured
/// rate and truncated to the hardware width.
pub fn rtimer_now() -> RtimerStamp {
    let ms = NOW.with(|c| c.get());
    let ticks = ms as u64 * config::RTIMER_TICKS_PER_SEC as u64
        / config::TIMESTAMP_TICKS_PER_SEC as u64;
    ticks as RtimerStamp
}

pub fn rtimer_arm(stop: RtimerStamp) {
    RTIMER.with(|c| c.set(Some(stop)));
}

pub fn rtimer_disarm() {
    RTIMER.with(|c| c.set(None));
}

pub fn critical_enter() {
    CRITICAL_DEPTH.with(|c| c.set(c.get() + 1));
}

pub fn critical_exit() {
    CRITICAL_DEPTH.with(|c| {
        let depth = c.get();
        debug_assert!(depth > 0, "unbalanced critical section exit");
        c.set(depth.saturating_sub(1));
    });
}

// ---- host-loop and test controls ----------------------------------------

/// Jumps the clock to an absolute reading.
pub fn set_time(t: Timestamp) {
    NOW.with(|c| c.set(t));
}

/// Moves the clock forward.
pub fn advance(span: Timespan) {
    NOW.with(|c| c.set(c.get().wrapping_add(span)));
}

/// The one-shot deadline currently "programmed into the hardware".
pub fn armed() -> Option<RtimerStamp> {
    RTIMER.with(|c| c.get())
}

/// True once the programmed one-shot deadline has been reached.
pub fn timer_fired() -> bool {
    match armed() {
        Some(stop) => rtimer_diff(rtimer_now(), stop) >= 0,
        None => false,
    }
}

/// Current critical-section nesting depth (diagnostic).
pub fn critical_depth() -> u32 {
    CRITICAL_DEPTH.with(|c| c.get())
}

/// Sleeps until the programmed one-shot fires, by jumping the clock to it.
/// Returns false (without touching the clock) when nothing is armed --
/// a real host would block forever.
pub fn wait_for_interrupt() -> bool {
    let Some(stop) = armed() else {
        return false;
    };
    // Round the tick delta up to whole milliseconds, then nudge until the
    // conversion agrees the deadline has passed.
    let delta = rtimer_diff(stop, rtimer_now());
    if delta > 0 {
        let ms = (delta as u64 * config::TIMESTAMP_TICKS_PER_SEC as u64)
            .div_ceil(config::RTIMER_TICKS_PER_SEC as u64);
        advance(ms as Timespan);
    }
    while !timer_fired() {
        advance(1);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_is_controllable() {
        set_time(41);
        advance(1);
        assert_eq!(now(), 42);
    }

    #[test]
    fn wait_for_interrupt_lands_on_the_deadline() {
        set_time(0);
        let stop = rtimer_now().wrapping_add(
            (50 * config::RTIMER_TICKS_PER_SEC
                / config::TIMESTAMP_TICKS_PER_SEC) as RtimerStamp,
        );
        rtimer_arm(stop);
        assert!(!timer_fired());
        assert!(wait_for_interrupt());
        assert!(timer_fired());
        assert!(now() >= 50);
        assert!(now() <= 52);
    }

    #[test]
    fn wait_for_interrupt_without_a_deadline_returns() {
        set_time(0);
        rtimer_disarm();
        assert!(!wait_for_interrupt());
        assert_eq!(now(), 0);
    }
}
