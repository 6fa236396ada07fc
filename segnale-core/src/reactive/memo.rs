//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when one of the
//! signals it read has changed.
//!
//! # How Memos Work
//!
//! 1. Creating a memo runs nothing. The computation starts dirty.
//!
//! 2. [`Memo::get`] recomputes synchronously if the memo is dirty, then
//!    returns the cached value.
//!
//! 3. A write to a signal the memo read marks it dirty and schedules it;
//!    the next flush recomputes it, or an earlier `get` does.
//!
//! # Nesting
//!
//! A memo recomputes under its own context frame. Reading a memo from
//! inside another computation therefore subscribes the caller neither to
//! the memo nor to the signals the memo read; only direct signal reads
//! subscribe.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use super::runtime::{Runtime, RuntimeInner};
use crate::error::{ReactiveError, Result};
use crate::graph::{Body, ComputationId, ComputationKind};

struct MemoInner<T> {
    id: ComputationId,
    runtime: Weak<RuntimeInner>,
    value: RefCell<Option<T>>,
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.dispose(self.id);
        }
    }
}

/// A lazily computed, cached derived value.
///
/// Clones share the same computation and cache. The computation is removed
/// from the runtime when the last clone drops.
///
/// # Example
///
/// ```
/// use segnale_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(2);
///
/// let count_clone = count.clone();
/// let doubled = runtime.create_memo(move || count_clone.get() * 2);
/// assert_eq!(doubled.get(), 4);
///
/// count.set(3);
/// assert_eq!(doubled.get(), 6);
/// ```
pub struct Memo<T> {
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let id = ComputationId::new();
        let inner = Rc::new(MemoInner {
            id,
            runtime: runtime.downgrade(),
            value: RefCell::new(None),
        });

        let target: Weak<MemoInner<T>> = Rc::downgrade(&inner);
        let body: Body = Rc::new(move || {
            let Some(memo) = target.upgrade() else {
                return;
            };
            let value = compute();
            *memo.value.borrow_mut() = Some(value);
        });
        runtime.inner.add_computation(id, ComputationKind::Memo, body);

        Self { inner }
    }

    /// Get the computation's ID.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Recompute if dirty.
    fn refresh(&self) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.execute(self.inner.id);
        }
    }

    /// Borrow the current value, recomputing first if necessary.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.refresh();
        let value = self.inner.value.borrow();
        match value.as_ref() {
            Some(value) => Ok(f(value)),
            None if self.inner.runtime.strong_count() == 0 => Err(ReactiveError::RuntimeDropped),
            None => Err(ReactiveError::Reentrant(self.inner.id)),
        }
    }

    /// Whether the memo needs to recompute before its value can be trusted.
    pub fn is_dirty(&self) -> bool {
        self.inner
            .runtime
            .upgrade()
            .is_some_and(|runtime| runtime.graph.borrow().is_dirty(self.inner.id))
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the memo is read from inside its own first computation.
    /// Use [`try_get`](Memo::try_get) to handle that case.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

impl Runtime {
    /// Create a lazily computed memo.
    pub fn create_memo<T, F>(&self, compute: F) -> Memo<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        Memo::new(self, compute)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
