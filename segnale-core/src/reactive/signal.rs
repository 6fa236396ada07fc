//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a computation (memo/effect), the signal
//!    registers that computation as a subscriber.
//!
//! 2. When a signal's value changes, every clean subscriber is marked dirty
//!    and scheduled, then every external listener is called.
//!
//! 3. Writing a value equal to the current one does nothing at all.
//!
//! # Memory Layout
//!
//! The typed value lives in the handle (`Rc<RefCell<T>>` shared by all
//! clones). The runtime only stores the cell's untyped subscriber set and
//! listeners, keyed by [`CellId`]. Dropping the last handle removes the
//! cell from the graph.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::Unsubscribe;
use crate::graph::CellId;

struct SignalInner<T> {
    id: CellId,
    runtime: Weak<RuntimeInner>,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_cell(self.id);
        }
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Clones share the same cell.
///
/// # Example
///
/// ```
/// use segnale_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(0);
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: runtime.inner.add_cell(),
                runtime: runtime.downgrade(),
                value: RefCell::new(value),
            }),
        }
    }

    /// Get the cell's ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    fn track(&self) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track_read(self.inner.id);
        }
    }

    /// Borrow the current value.
    ///
    /// Inside a computation this registers the computation as a
    /// subscriber, exactly like [`get`](Signal::get). `f` must not write to
    /// this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&*self.inner.value.borrow())
    }

    /// Borrow the current value without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Register `listener` to be called after every change.
    ///
    /// Listeners run synchronously inside the write, in registration order,
    /// and receive no payload; they read the signal themselves.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Unsubscribe {
        let listener_id = self
            .inner
            .runtime
            .upgrade()
            .and_then(|runtime| runtime.add_listener(self.inner.id, Rc::new(listener)));
        Unsubscribe::new(self.inner.runtime.clone(), self.inner.id, listener_id)
    }

    /// Number of computations that read this signal during their last run.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.subscriber_count(self.inner.id))
    }

    /// Number of external listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.listener_count(self.inner.id))
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a computation, this also registers the computation
    /// as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify dependents.
    ///
    /// Does nothing if `value` equals the current value.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.notify_write(self.inner.id);
        }
    }

    /// Update the value using a function of the current value.
    ///
    /// Same semantics as [`set`](Signal::set) with the resolved value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&*self.inner.value.borrow());
        self.set(next);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

impl Runtime {
    /// Create a signal owned by this runtime.
    pub fn create_signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal::new(self, value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
