// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bare-metal platform binding.
//!
//! Board glue provides the clock and the one-shot timer as link-time
//! symbols; the ISR it installs is responsible for calling
//! `Kernel::isr_entry`. The critical section is implemented here for the
//! architectures we know about.

use abi::{RtimerStamp, Timestamp};

extern "Rust" {
    fn myos_timestamp_now() -> Timestamp;
    fn myos_rtimer_now() -> RtimerStamp;
    fn myos_rtimer_arm(stop: RtimerStamp);
    fn myos_rtimer_disarm();
}

#[inline(always)]
pub fn now() -> Timestamp {
    // Safety: board glue contract; the symbol must be interrupt-safe.
    unsafe { myos_timestamp_now() }
}

#[inline(always)]
pub fn rtimer_now() -> RtimerStamp {
    unsafe { myos_rtimer_now() }
}

#[inline(always)]
pub fn rtimer_arm(stop: RtimerStamp) {
    unsafe { myos_rtimer_arm(stop) }
}

#[inline(always)]
pub fn rtimer_disarm() {
    unsafe { myos_rtimer_disarm() }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        use core::cell::Cell;
        use core::sync::atomic::{compiler_fence, Ordering};

        // Saved PRIMASK state per nesting level would need a stack; instead
        // we keep the depth and the state captured at the outermost enter,
        // which is sufficient because inner sections never re-enable.
        struct CriticalState {
            depth: Cell<u32>,
            outer_enabled: Cell<bool>,
        }
        // Safety: single core, and this is only touched with interrupts
        // masked once depth > 0.
        unsafe impl Sync for CriticalState {}

        static CRITICAL: CriticalState = CriticalState {
            depth: Cell::new(0),
            outer_enabled: Cell::new(false),
        };

        /// Saves the interrupt-enable state and masks interrupts (PRIMASK).
        pub fn critical_enter() {
            let enabled = cortex_m::register::primask::read().is_active();
            cortex_m::interrupt::disable();
            compiler_fence(Ordering::SeqCst);
            if CRITICAL.depth.get() == 0 {
                CRITICAL.outer_enabled.set(enabled);
            }
            CRITICAL.depth.set(CRITICAL.depth.get() + 1);
        }

        /// Restores the state saved by the matching outermost enter.
        pub fn critical_exit() {
            let depth = CRITICAL.depth.get();
            CRITICAL.depth.set(depth - 1);
            compiler_fence(Ordering::SeqCst);
            if depth == 1 && CRITICAL.outer_enabled.get() {
                // Safety: re-enabling interrupts outside any section.
                unsafe { cortex_m::interrupt::enable() };
            }
        }
    } else {
        extern "Rust" {
            fn myos_critical_enter();
            fn myos_critical_exit();
        }

        pub fn critical_enter() {
            unsafe { myos_critical_enter() }
        }

        pub fn critical_exit() {
            unsafe { myos_critical_exit() }
        }
    }
}
