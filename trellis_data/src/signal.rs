// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronous, single-threaded signals.
//!
//! A [`Signal`] owns a list of callbacks. [`Signal::emit`] calls them in
//! connection order on the caller's thread before returning. Connecting
//! returns a [`Slot`]; dropping the slot disconnects the callback.
//!
//! # Re-entrancy
//!
//! Dispatch iterates over a snapshot of the connected callbacks, so a callback
//! may connect or disconnect slots (on this or any other signal) and may
//! mutate stores that emit further signals. Callbacks connected during a
//! dispatch are first called by the next emission. A callback disconnected
//! during a dispatch is not called for the remainder of it.
//!
//! Nothing bounds the depth of nested emissions: a callback that,
//! directly or through other stores, re-emits the signal it is handling will
//! recurse until the stack overflows.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

type Callback<A> = Box<dyn Fn(&A)>;

struct Connection<A> {
    id: u64,
    live: Cell<bool>,
    callback: Callback<A>,
}

struct SignalInner<A> {
    next_id: Cell<u64>,
    connections: RefCell<Vec<Rc<Connection<A>>>>,
}

trait Disconnect {
    fn disconnect(&self, id: u64);
}

impl<A> Disconnect for SignalInner<A> {
    fn disconnect(&self, id: u64) {
        let removed = {
            let mut connections = self.connections.borrow_mut();
            connections
                .iter()
                .position(|c| c.id == id)
                .map(|index| connections.remove(index))
        };
        // Dropped outside the borrow: the callback may own slots of this signal.
        if let Some(connection) = removed {
            connection.live.set(false);
        }
    }
}

/// A list of callbacks invoked synchronously with `&A`.
///
/// Cloning a signal shares it.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_data::Signal;
///
/// let signal = Signal::<u32>::new();
/// let total = Rc::new(Cell::new(0));
///
/// let slot = {
///     let total = total.clone();
///     signal.connect(move |v| total.set(total.get() + *v))
/// };
/// signal.emit(&2);
/// signal.emit(&3);
/// assert_eq!(total.get(), 5);
///
/// drop(slot);
/// signal.emit(&100);
/// assert_eq!(total.get(), 5);
/// ```
pub struct Signal<A: 'static> {
    inner: Rc<SignalInner<A>>,
}

impl<A: 'static> Signal<A> {
    /// Creates a signal with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                next_id: Cell::new(0),
                connections: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Connects `callback`, returning the slot that keeps it connected.
    #[must_use = "dropping the slot disconnects the callback"]
    pub fn connect(&self, callback: impl Fn(&A) + 'static) -> Slot {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.connections.borrow_mut().push(Rc::new(Connection {
            id,
            live: Cell::new(true),
            callback: Box::new(callback),
        }));
        let signal: Weak<dyn Disconnect> = Rc::downgrade(&self.inner) as Weak<dyn Disconnect>;
        Slot {
            signal: Some(signal),
            id,
        }
    }

    /// Calls every connected callback with `args`.
    pub fn emit(&self, args: &A) {
        let snapshot: SmallVec<[Rc<Connection<A>>; 4]> =
            self.inner.connections.borrow().iter().cloned().collect();
        for connection in snapshot {
            if connection.live.get() {
                (connection.callback)(args);
            }
        }
    }

    /// Returns the number of connected callbacks.
    #[must_use]
    pub fn num_callbacks(&self) -> usize {
        self.inner.connections.borrow().len()
    }

    /// Returns `true` if no callback is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_callbacks() == 0
    }

    /// Returns `true` if both handles refer to the same signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A: 'static> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("num_callbacks", &self.num_callbacks())
            .finish()
    }
}

/// A connection to a [`Signal`]; disconnects when dropped.
pub struct Slot {
    signal: Option<Weak<dyn Disconnect>>,
    id: u64,
}

impl Slot {
    /// Disconnects the callback now.
    pub fn disconnect(mut self) {
        self.release();
    }

    /// Returns `true` while the callback is connected to a live signal.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.signal
            .as_ref()
            .is_some_and(|signal| signal.strong_count() > 0)
    }

    fn release(&mut self) {
        if let Some(signal) = self.signal.take().and_then(|weak| weak.upgrade()) {
            signal.disconnect(self.id);
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
