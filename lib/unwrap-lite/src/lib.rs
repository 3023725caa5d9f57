// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unwrap for cases that are proven infallible, without dragging in the
//! formatting machinery that `unwrap`/`expect` cost on small targets.
//!
//! Use this only where the surrounding code maintains an invariant that
//! makes failure impossible; propagate real errors with `?`.

#![no_std]

pub trait UnwrapLite {
    type Output;

    fn unwrap_lite(self) -> Self::Output;
}

impl<T> UnwrapLite for Option<T> {
    type Output = T;

    #[inline(always)]
    fn unwrap_lite(self) -> T {
        match self {
            Some(v) => v,
            None => panic!(),
        }
    }
}

impl<T, E> UnwrapLite for Result<T, E> {
    type Output = T;

    #[inline(always)]
    fn unwrap_lite(self) -> T {
        match self {
            Ok(v) => v,
            Err(_) => panic!(),
        }
    }
}
