// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common type vocabulary shared between the kernel and application code.
//!
//! This crate deliberately contains no behavior beyond arithmetic on its own
//! types: it exists so that the kernel, the input pipeline, and applications
//! can agree on ids, timestamps, and event shapes without depending on each
//! other.
//!
//! # Time
//!
//! Two clocks exist in the system:
//!
//! - The coarse millisecond clock ([`Timestamp`], [`config::TIMESTAMP_TICKS_PER_SEC`]).
//!   Software timers are scheduled against this one.
//! - The fine hardware tick ([`RtimerStamp`], [`config::RTIMER_TICKS_PER_SEC`]).
//!   The single one-shot hardware timer is programmed in these units.
//!
//! Both counters wrap. Every comparison anywhere in the system must therefore
//! go through the signed-difference helpers in this crate ([`timestamp_diff`],
//! [`rtimer_diff`]): two stamps are ordered by the sign of their wrapping
//! difference reinterpreted at the same width. This is exact as long as the
//! real distance between the stamps is less than half the counter range,
//! which is why the fine tick rate is pinned to half the counter range per
//! second -- the furthest representable future is then one second out and
//! never ambiguous.

#![cfg_attr(target_os = "none", no_std)]

pub mod config {
    //! Compile-time configuration of the core.

    /// Rate of the coarse monotonic clock. One tick is one millisecond.
    pub const TIMESTAMP_TICKS_PER_SEC: u32 = 1000;

    /// Rate of the fine hardware tick: half the counter range per second, so
    /// that wrap-safe ordering covers the whole useful scheduling horizon.
    pub const RTIMER_TICKS_PER_SEC: u32 = (crate::RtimerStamp::MAX as u32 + 1) / 2;

    /// Capacity of the pending-event ring.
    pub const EVENT_QUEUE_CAPACITY: usize = 8;

    /// Number of process slots.
    pub const MAX_PROCESSES: usize = 8;

    /// Number of software timer slots.
    pub const MAX_TIMERS: usize = 8;

    /// Depth of the active-context stack. Bounds how deeply synchronous
    /// dispatch may nest.
    pub const CONTEXT_DEPTH: usize = 8;
}

/// A point on the coarse monotonic clock. Wraps at its width.
pub type Timestamp = u32;

/// A distance between two [`Timestamp`]s.
pub type Timespan = u32;

/// A point on the fine hardware clock. Deliberately narrow; see the crate
/// docs for why its rate is tied to its width.
pub type RtimerStamp = u16;

/// Wrap-safe ordering of coarse timestamps: the sign of the result orders
/// `a` relative to `b`.
#[inline(always)]
pub fn timestamp_diff(a: Timestamp, b: Timestamp) -> i32 {
    a.wrapping_sub(b) as i32
}

/// True once the clock reading `now` has reached (or passed) `deadline`.
#[inline(always)]
pub fn timestamp_reached(now: Timestamp, deadline: Timestamp) -> bool {
    timestamp_diff(now, deadline) >= 0
}

/// Wrap-safe ordering of fine hardware stamps.
#[inline(always)]
pub fn rtimer_diff(a: RtimerStamp, b: RtimerStamp) -> i16 {
    a.wrapping_sub(b) as i16
}

/// Names a process slot plus the generation of its occupant.
///
/// Slots are reused after a process exits. The generation number is bumped on
/// every reuse, so an id held across an exit stops matching and stale
/// references are detected rather than misdelivered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct ProcId(u16);

impl ProcId {
    pub fn new(index: usize, generation: u8) -> Self {
        ProcId((generation as u16) << 8 | index as u16 & 0xff)
    }

    pub fn index(self) -> usize {
        (self.0 & 0xff) as usize
    }

    pub fn generation(self) -> u8 {
        (self.0 >> 8) as u8
    }
}

/// Names a software timer slot. Timer slots are claimed for the life of the
/// owning module, so no generation is carried.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct TimerId(pub u8);

impl TimerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(feature = "event-id-32")]
pub type EventIdRaw = u32;
#[cfg(not(feature = "event-id-32"))]
pub type EventIdRaw = u16;

/// Identifies a kind of event. Ids below [`EVENT_USER_BASE`] are reserved for
/// the kernel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub struct EventId(pub EventIdRaw);

/// Delivered to a process exactly once, as its first event, when it starts.
pub const EVENT_INIT: EventId = EventId(0);
/// Delivered when a process exits: to the exiting process itself (with no
/// payload) and, separately, to every other process with the exited process
/// in the payload.
pub const EVENT_EXIT: EventId = EventId(1);
/// Posted by an event timer when its deadline passes.
pub const EVENT_TIMEOUT: EventId = EventId(2);
/// Delivered to a process that has requested a poll.
pub const EVENT_POLL: EventId = EventId(3);
/// First id available to applications.
pub const EVENT_USER_BASE: EventIdRaw = 0x10;

/// Payload carried by an event.
///
/// The original design passed an untyped pointer here; every actual use is
/// one of a handful of small identities, so the payload is a tagged value
/// instead and receivers match rather than cast.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventData {
    None,
    /// A process, e.g. the exited child in an `EVENT_EXIT` broadcast.
    Proc(ProcId),
    /// A timer, e.g. which event timer fired in an `EVENT_TIMEOUT`.
    Timer(TimerId),
    /// A small scalar, e.g. a button index.
    Word(u32),
}

/// A queued or delivered event. `target == None` is a broadcast.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub data: EventData,
    pub target: Option<ProcId>,
}

/// The pending-event ring is at capacity. The event was not enqueued; the
/// caller decides whether to drop, retry, or propagate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueueFull;

/// A fixed table (process or timer slots) has no free entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutOfSlots;

/// The operation requires a current process context and none is active.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NoContext;
