// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small utility types.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A RefCell-style container that can be placed in a `static`.
///
/// Borrows are tracked with a single flag: there is at most one outstanding
/// borrow, and taking a second one panics. On this single-executor system a
/// double borrow is always a program structure bug, not a race to wait out.
#[derive(Default)]
pub struct StaticCell<T> {
    borrowed: AtomicBool,
    cell: UnsafeCell<T>,
}

/// Safety: access to the contents is serialized by the `borrowed` flag.
unsafe impl<T: Send> Sync for StaticCell<T> {}

impl<T> StaticCell<T> {
    pub const fn new(contents: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            cell: UnsafeCell::new(contents),
        }
    }

    /// Takes the single borrow, or panics if it is already out.
    pub fn borrow_mut(&self) -> StaticRef<'_, T> {
        let taken = self.borrowed.swap(true, Ordering::Acquire);
        if taken {
            panic!();
        }
        StaticRef { owner: self }
    }
}

/// Smart pointer representing the borrow of a [`StaticCell`]; releases the
/// borrow on drop.
pub struct StaticRef<'a, T> {
    owner: &'a StaticCell<T>,
}

impl<T> Deref for StaticRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the borrow flag guarantees exclusivity.
        unsafe { &*self.owner.cell.get() }
    }
}

impl<T> DerefMut for StaticRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as above, and we hold the unique StaticRef.
        unsafe { &mut *self.owner.cell.get() }
    }
}

impl<T> core::ops::Drop for StaticRef<'_, T> {
    fn drop(&mut self) {
        self.owner.borrowed.store(false, Ordering::Release);
    }
}
