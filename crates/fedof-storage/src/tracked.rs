//! Accounting for the dynamic sub-allocations owned by value blocks.
//!
//! Strings, arrays and time series each own a separate heap buffer. Every
//! such buffer is wrapped in [`Tracked`], which bumps a per-thread live
//! counter when created or cloned and decrements it when dropped. Tests use
//! [`live_dynamic_allocations`] to prove blocks neither leak nor release
//! twice.

use std::cell::Cell;
use std::ops::Deref;

thread_local! {
    /// Live dynamic sub-allocations on this thread.
    static LIVE: Cell<usize> = const { Cell::new(0) };
}

/// Number of dynamic sub-allocations currently alive on this thread.
pub fn live_dynamic_allocations() -> usize {
    LIVE.with(Cell::get)
}

/// A heap value counted in [`live_dynamic_allocations`].
#[derive(Debug, PartialEq)]
pub(crate) struct Tracked<T> {
    value: T,
}

impl<T> Tracked<T> {
    pub(crate) fn new(value: T) -> Self {
        LIVE.with(|live| live.set(live.get() + 1));
        Self { value }
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Clone> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        LIVE.with(|live| live.set(live.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_and_drop_balance() {
        let before = live_dynamic_allocations();
        let a = Tracked::new(String::from("x"));
        let b = a.clone();
        assert_eq!(live_dynamic_allocations(), before + 2);
        drop(a);
        drop(b);
        assert_eq!(live_dynamic_allocations(), before);
    }
}
