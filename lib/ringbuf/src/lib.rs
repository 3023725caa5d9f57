// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static trace rings.
//!
//! A module that wants cheap diagnostics declares an enum of the things
//! worth recording (with a `None` variant for the initial fill) and a ring:
//!
//! ```ignore
//! #[derive(Copy, Clone, PartialEq)]
//! enum Trace {
//!     None,
//!     Edge(u8, bool),
//! }
//! ringbuf!(Trace, 16, Trace::None);
//! ```
//!
//! and then records with `ringbuf_entry!(Trace::Edge(0, true))`. Recording
//! never formats and never blocks; consecutive identical entries from the
//! same line coalesce into one entry with a bumped count. The contents are
//! for post-mortem inspection -- a debugger, a dump routine -- not a live
//! output stream.
//!
//! Enabling this crate's `disabled` feature turns every ring and entry into
//! nothing, without touching the declaring code.

#![cfg_attr(target_os = "none", no_std)]

/// Re-export so that code generated by the macros can find it.
pub use kern::util::StaticCell;

/// One recorded entry: where (`line`), which lap of the ring
/// (`generation`), how many times in a row (`count`), and what.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring of parametrized size. In practice, instantiating this directly
/// is strange -- see the [`ringbuf!`] macro.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    pub fn entry(&mut self, line: u16, payload: T) {
        // Repeat of the most recent entry? Coalesce.
        if let Some(last) = self.last {
            let entry = &mut self.buffer[last];
            if entry.line == line
                && entry.payload == payload
                && entry.count < u32::MAX
            {
                entry.count += 1;
                return;
            }
        }

        let ndx = match self.last {
            None => 0,
            Some(last) => {
                if last + 1 >= self.buffer.len() {
                    0
                } else {
                    last + 1
                }
            }
        };
        let generation = self.buffer[ndx].generation.wrapping_add(1);
        self.buffer[ndx] = RingbufEntry {
            line,
            generation,
            count: 1,
            payload,
        };
        self.last = Some(ndx);
    }
}

/// Declares a trace ring in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ring named `NAME` with room for
/// `N` entries, all initialized to `expr`. The resulting ring is static, so
/// `NAME` should be uppercase. If you omit the name it defaults to
/// `__RINGBUF`, which is what the unnamed form of [`ringbuf_entry!`]
/// records into.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, { $n }>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: () = {
            let _ = $init;
        };
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Records into a ring declared with [`ringbuf!`].
///
/// `ringbuf_entry!(NAME, expr)` records `expr` into the ring `NAME`;
/// `ringbuf_entry!(expr)` records into the module's unnamed ring.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:ident, $payload:expr) => {{
        let mut buf = $buf.borrow_mut();
        buf.entry(line!() as u16, $payload);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload)
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:ident, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}
