// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalid set: draw units pending a rebind, plus a pending-sort flag.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashSet;

use crate::draw_unit::DrawUnitId;

#[derive(Debug, Default)]
struct Inner {
    rebind: HashSet<DrawUnitId>,
    sort: bool,
    generation: u64,
}

/// Draw units whose bindings or program are stale, shared between a pool and
/// the store subscriptions that invalidate its units.
///
/// Cloning shares the set. Every mutation bumps a generation counter.
///
/// ```
/// use trellis_draw::{DrawUnitId, InvalidSet};
///
/// let invalid = InvalidSet::new();
/// let watcher = invalid.clone();
/// watcher.mark(DrawUnitId(7));
/// watcher.mark(DrawUnitId(3));
/// assert!(invalid.contains(DrawUnitId(7)));
/// assert_eq!(invalid.drain(), [DrawUnitId(3), DrawUnitId(7)]);
/// assert!(invalid.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InvalidSet {
    inner: Rc<RefCell<Inner>>,
}

impl InvalidSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    /// Marks `id` for rebinding.
    ///
    /// Returns `true` if it was not already marked.
    pub fn mark(&self, id: DrawUnitId) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.generation = inner.generation.wrapping_add(1);
        inner.rebind.insert(id)
    }

    /// Returns `true` if `id` is pending a rebind.
    #[must_use]
    pub fn contains(&self, id: DrawUnitId) -> bool {
        self.inner.borrow().rebind.contains(&id)
    }

    /// Returns the number of units pending a rebind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().rebind.len()
    }

    /// Returns `true` if no unit is pending a rebind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().rebind.is_empty()
    }

    /// Removes and returns the units pending a rebind, in id order.
    pub fn drain(&self) -> Vec<DrawUnitId> {
        let mut inner = self.inner.borrow_mut();
        if inner.rebind.is_empty() {
            return Vec::new();
        }
        inner.generation = inner.generation.wrapping_add(1);
        let mut ids: Vec<_> = inner.rebind.drain().collect();
        ids.sort_unstable();
        ids
    }

    /// Forgets `id`, typically because the unit was destroyed.
    pub fn remove(&self, id: DrawUnitId) {
        let mut inner = self.inner.borrow_mut();
        if inner.rebind.remove(&id) {
            inner.generation = inner.generation.wrapping_add(1);
        }
    }

    /// Requests a re-sort of the draw order.
    pub fn request_sort(&self) {
        let mut inner = self.inner.borrow_mut();
        if !inner.sort {
            inner.sort = true;
            inner.generation = inner.generation.wrapping_add(1);
        }
    }

    /// Returns whether a sort was requested, clearing the request.
    pub fn take_sort(&self) -> bool {
        core::mem::take(&mut self.inner.borrow_mut().sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_tracks_changes() {
        let invalid = InvalidSet::new();
        let g0 = invalid.generation();
        assert!(invalid.mark(DrawUnitId(1)));
        assert!(!invalid.mark(DrawUnitId(1)));
        assert!(invalid.generation() > g0);

        let g1 = invalid.generation();
        invalid.remove(DrawUnitId(2));
        assert_eq!(invalid.generation(), g1);
        invalid.remove(DrawUnitId(1));
        assert!(invalid.is_empty());
        assert!(invalid.drain().is_empty());
    }

    #[test]
    fn sort_requests_are_taken_once() {
        let invalid = InvalidSet::new();
        assert!(!invalid.take_sort());
        invalid.request_sort();
        invalid.request_sort();
        assert!(invalid.take_sort());
        assert!(!invalid.take_sort());
    }
}
