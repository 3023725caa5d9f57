// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Button input pipeline.
//!
//! Each button is sampled at a fixed cadence (50 Hz, driven by the process
//! in [`process`]) and run through a small state machine that debounces the
//! raw level and derives higher-order gestures from it. Several engines
//! stack on top of each other, each gated by a cargo feature:
//!
//! - **Edges**: `RisingEdge` on confirmed press, `FallingEdge` on confirmed
//!   release.
//! - **Single press**: `ShortPress` on release (without the long-press
//!   engine it fires on every release).
//! - **Repeat press**: when you press and hold, the button repeats itself
//!   like a keyboard key. The confirmed press fires the first
//!   `RepeatPress`; after `REPEAT_DELAY` further polls the repeats arrive
//!   every `REPEAT_RATE` polls.
//! - **Long press**: three escalating hold thresholds, each firing its
//!   press event exactly once while held; the release reports which bucket
//!   the hold fell into (`ShortPress`, `LongRelease`, `LongerRelease`,
//!   `LongestRelease`).
//! - **Multi click**: press-release sequences that land within
//!   `CLICK_TIMEOUT` of each other aggregate into `SingleClick`,
//!   `DoubleClick`, or `TripleClick` (clamped at triple), reported once the
//!   gap exceeds the timeout.
//!
//! Debouncing sits underneath all of them: a raw transition parks the
//! machine in a debounce state for `DEBOUNCE_COUNT` polls, dropping
//! straight back if the level reverts, and only then lets the transition
//! through. State is re-derived from the raw level every tick, so a missed
//! poll degrades timing, never correctness.

#![cfg_attr(target_os = "none", no_std)]

use abi::{EventData, EventId, EventIdRaw, EVENT_USER_BASE};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

pub mod process;

pub mod config {
    //! Cadence and thresholds, all in units of 20 ms polls.

    /// Poll rate of the pipeline.
    pub const POLL_HZ: u32 = 50;
    /// Polls a raw transition must survive before it is believed.
    pub const DEBOUNCE_COUNT: u8 = 3;
    /// Maximum gap between clicks of one multi-click gesture (300 ms).
    pub const CLICK_TIMEOUT: u8 = 15;
    /// Polls between the first repeat and the second (500 ms).
    pub const REPEAT_DELAY: u8 = 25;
    /// Polls between subsequent repeats (100 ms).
    pub const REPEAT_RATE: u8 = 5;
    /// Hold thresholds: one, two, and three seconds.
    pub const LONG_PRESS_TIMEOUT: u8 = 50;
    pub const LONGER_PRESS_TIMEOUT: u8 = 100;
    pub const LONGEST_PRESS_TIMEOUT: u8 = 150;
}

/// Reads the raw button level; true is pressed. Must be callable at any
/// time -- the pipeline samples it once per poll.
pub type ButtonGetFn = fn() -> bool;

/// Index of a registered button.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ButtonId(pub u8);

/// Gestures the pipeline emits. Broadcast as events at
/// [`EVENT_USER_BASE`] + discriminant, with the button index as payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum ButtonEvent {
    RisingEdge = 0,
    FallingEdge,
    ShortPress,
    LongPress,
    LongerPress,
    LongestPress,
    RepeatPress,
    SingleClick,
    DoubleClick,
    TripleClick,
    LongRelease,
    LongerRelease,
    LongestRelease,
}

impl ButtonEvent {
    pub fn event_id(self) -> EventId {
        EventId(EVENT_USER_BASE + self as EventIdRaw)
    }

    pub fn from_event_id(id: EventId) -> Option<Self> {
        let code = (id.0 as u32).checked_sub(EVENT_USER_BASE as u32)?;
        Self::from_u32(code)
    }
}

/// Decodes a broadcast kernel event back into (button, gesture).
pub fn decode(ev: &abi::Event) -> Option<(ButtonId, ButtonEvent)> {
    let gesture = ButtonEvent::from_event_id(ev.id)?;
    match ev.data {
        EventData::Word(index) => Some((ButtonId(index as u8), gesture)),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RawState {
    Released,
    Pressed,
    ReleasedDebounce,
    PressedDebounce,
}

/// Most gestures one poll can produce (an edge plus a repeat, or an edge
/// plus a release bucket, plus a click resolution).
const MAX_EMITTED: usize = 4;

/// Gestures emitted by one poll of one button.
#[derive(Copy, Clone, Debug)]
pub struct Emitted {
    events: [ButtonEvent; MAX_EMITTED],
    len: usize,
}

impl Emitted {
    fn new() -> Self {
        Self {
            events: [ButtonEvent::RisingEdge; MAX_EMITTED],
            len: 0,
        }
    }

    fn push(&mut self, ev: ButtonEvent) {
        debug_assert!(self.len < MAX_EMITTED, "poll emitted too many gestures");
        if self.len < MAX_EMITTED {
            self.events[self.len] = ev;
            self.len += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ButtonEvent> + '_ {
        self.events[..self.len].iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One button's sampler state.
#[derive(Copy, Clone)]
pub struct Button {
    get: ButtonGetFn,
    prev_state: RawState,
    /// Polls left before a pending raw transition is believed. Kept apart
    /// from `hold_timer` so a release being debounced does not destroy the
    /// hold measurement its bucket is judged by.
    debounce_timer: u8,
    hold_timer: u8,
    repeat_timer: u8,
    click_timer: u8,
    click_count: u8,
}

impl Button {
    pub const fn new(get: ButtonGetFn) -> Self {
        Self {
            get,
            prev_state: RawState::Released,
            debounce_timer: 0,
            hold_timer: 0,
            repeat_timer: 0,
            click_timer: 0,
            click_count: 0,
        }
    }

    /// Primes the state from the live level so a button held at boot does
    /// not read as an edge on the first poll.
    pub fn init(&mut self) {
        self.prev_state = if (self.get)() {
            RawState::Pressed
        } else {
            RawState::Released
        };
    }

    fn transition_pressed(&self, curr: bool) -> bool {
        self.prev_state == RawState::Released && curr
    }

    fn transition_released(&self, curr: bool) -> bool {
        self.prev_state == RawState::Pressed && !curr
    }

    fn transition_held(&self, curr: bool) -> bool {
        self.prev_state == RawState::Pressed && curr
    }

    /// Samples the button once and advances every engine by one tick.
    pub fn poll(&mut self) -> Emitted {
        let mut out = Emitted::new();
        let curr = (self.get)();

        // Debouncing. A fresh transition parks the machine; a parked
        // machine either reverts (level went back) or, once the countdown
        // is spent, forces its prev_state to the opposite level so the
        // transition logic below sees the confirmed edge.
        #[cfg(feature = "debounce")]
        {
            if self.transition_pressed(curr) {
                self.prev_state = RawState::PressedDebounce;
                self.debounce_timer = config::DEBOUNCE_COUNT;
            } else if self.transition_released(curr) {
                self.prev_state = RawState::ReleasedDebounce;
                self.debounce_timer = config::DEBOUNCE_COUNT;
            }

            if self.prev_state == RawState::PressedDebounce {
                if curr {
                    if self.debounce_timer != 0 {
                        self.debounce_timer -= 1;
                        return out;
                    }
                    self.prev_state = RawState::Released;
                } else {
                    self.prev_state = RawState::Released;
                    return out;
                }
            } else if self.prev_state == RawState::ReleasedDebounce {
                if !curr {
                    if self.debounce_timer != 0 {
                        self.debounce_timer -= 1;
                        return out;
                    }
                    self.prev_state = RawState::Pressed;
                } else {
                    self.prev_state = RawState::Pressed;
                    return out;
                }
            }
        }

        // Confirmed press.
        if self.transition_pressed(curr) {
            #[cfg(feature = "multi-click")]
            {
                self.click_timer = config::CLICK_TIMEOUT;
            }
            #[cfg(feature = "edges")]
            out.push(ButtonEvent::RisingEdge);
            #[cfg(feature = "long-press")]
            {
                self.hold_timer = 0;
            }
            #[cfg(feature = "repeat-press")]
            {
                // The first edge also counts as a repeat.
                out.push(ButtonEvent::RepeatPress);
                self.repeat_timer = config::REPEAT_DELAY;
            }
        }

        // Held.
        if self.transition_held(curr) {
            #[cfg(feature = "multi-click")]
            {
                self.click_timer = config::CLICK_TIMEOUT;
            }
            #[cfg(feature = "long-press")]
            {
                if self.hold_timer != u8::MAX {
                    self.hold_timer += 1;
                }
            }
            #[cfg(feature = "repeat-press")]
            {
                self.repeat_timer = self.repeat_timer.wrapping_sub(1);
                if self.repeat_timer == 0 {
                    out.push(ButtonEvent::RepeatPress);
                    self.repeat_timer = config::REPEAT_RATE;
                }
            }
            #[cfg(feature = "long-press")]
            {
                if self.hold_timer == config::LONG_PRESS_TIMEOUT {
                    out.push(ButtonEvent::LongPress);
                } else if self.hold_timer == config::LONGER_PRESS_TIMEOUT {
                    out.push(ButtonEvent::LongerPress);
                } else if self.hold_timer == config::LONGEST_PRESS_TIMEOUT {
                    out.push(ButtonEvent::LongestPress);
                }
            }
        }

        // Confirmed release.
        if self.transition_released(curr) {
            #[cfg(feature = "multi-click")]
            {
                self.click_timer = config::CLICK_TIMEOUT;
                self.click_count += 1;
            }
            #[cfg(feature = "edges")]
            out.push(ButtonEvent::FallingEdge);
            #[cfg(feature = "long-press")]
            {
                if self.hold_timer < config::LONG_PRESS_TIMEOUT {
                    out.push(ButtonEvent::ShortPress);
                } else if self.hold_timer < config::LONGER_PRESS_TIMEOUT {
                    out.push(ButtonEvent::LongRelease);
                } else if self.hold_timer < config::LONGEST_PRESS_TIMEOUT {
                    out.push(ButtonEvent::LongerRelease);
                } else {
                    out.push(ButtonEvent::LongestRelease);
                }
            }
            #[cfg(all(not(feature = "long-press"), feature = "single-press"))]
            out.push(ButtonEvent::ShortPress);
        }

        // Click aggregation: once the gap since the last activity exceeds
        // the timeout, report what accumulated.
        #[cfg(feature = "multi-click")]
        {
            if self.click_timer != 0 {
                self.click_timer -= 1;
            } else {
                match self.click_count {
                    0 => {}
                    1 => out.push(ButtonEvent::SingleClick),
                    2 => out.push(ButtonEvent::DoubleClick),
                    _ => out.push(ButtonEvent::TripleClick),
                }
                self.click_count = 0;
            }
        }

        self.prev_state = if curr {
            RawState::Pressed
        } else {
            RawState::Released
        };
        out
    }
}
