// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform-specific support.
//!
//! In practice, this works by
//!
//! - Conditionally defining a nested module (below).
//! - `pub use`-ing its contents
//!
//! Thus, all platform-specific functions show up right here in the `arch`
//! module, tailored for the current target. For this to work, each platform
//! module must define the same set of names:
//!
//! 1. `now` -- the coarse monotonic clock, readable from task and interrupt
//!    context.
//! 2. `rtimer_now` -- the fine hardware tick.
//! 3. `rtimer_arm` / `rtimer_disarm` -- program (or cancel) the single
//!    one-shot interrupt.
//! 4. `critical_enter` / `critical_exit` -- nestable interrupt masking.
//!
//! The fifth piece of the platform contract is the interrupt path itself:
//! whatever the platform installs as its timer ISR must call
//! `Kernel::isr_entry` when the one-shot fires.
//!
//! Hosted builds get a deterministic virtual clock (see [`hosted`]); tests
//! and the demo advance it explicitly. Bare-metal builds bind the clock and
//! timer to link-time symbols supplied by board glue (see `bare`).

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod bare;
        pub use bare::{
            critical_enter, critical_exit, now, rtimer_arm, rtimer_disarm,
            rtimer_now,
        };
    } else {
        pub mod hosted;
        pub use hosted::{
            critical_enter, critical_exit, now, rtimer_arm, rtimer_disarm,
            rtimer_now,
        };
    }
}

/// Runs `body` with interrupts masked. Nestable: only the outermost exit
/// restores the interrupt-enable state saved at the matching enter.
#[inline(always)]
pub fn critical<R>(body: impl FnOnce() -> R) -> R {
    critical_enter();
    let result = body();
    critical_exit();
    result
}
