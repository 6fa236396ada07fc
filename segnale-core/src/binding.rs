//! Host bindings for UI layers.
//!
//! A UI layer needs two things from the reactive core:
//!
//! - [`SignalBinding<T>`]: an external-store subscription. The host reads
//!   the current value while rendering and gets a callback whenever the
//!   signal changes, so it can schedule a re-render.
//! - [`LifecycleEffect<D>`]: a per-component effect registrar. Each render
//!   passes the component's dependency values; the effect is recreated when
//!   they change and torn down when the component unmounts.
//!
//! # Invariants
//!
//! 1. `SignalBinding::current()` always returns the signal's current value.
//! 2. Dropping a `SignalBinding` removes its listener; the callback never
//!    runs again.
//! 3. A `LifecycleEffect` owns at most one computation at a time. Replacing
//!    or unmounting it removes the old computation from the runtime, so it
//!    cannot run again even if it was already scheduled.
//!
//! # Failure Modes
//!
//! - Runtime dropped while a binding is alive: `current()` still works,
//!   `render` does nothing and returns `false`.

use std::fmt;
use std::future::Future;
use std::rc::Weak;

use crate::error::BoxError;
use crate::graph::ComputationId;
use crate::reactive::{Runtime, RuntimeInner, Signal, Unsubscribe};

// ---------------------------------------------------------------------------
// SignalBinding<T>
// ---------------------------------------------------------------------------

/// Read-and-subscribe binding to a [`Signal`].
///
/// # Example
///
/// ```
/// use segnale_core::binding::SignalBinding;
/// use segnale_core::Runtime;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(0);
/// let renders = Rc::new(Cell::new(0));
///
/// let renders_clone = renders.clone();
/// let binding = SignalBinding::new(&count, move || renders_clone.set(renders_clone.get() + 1));
///
/// count.set(1);
/// assert_eq!(renders.get(), 1);
/// assert_eq!(binding.current(), 1);
///
/// drop(binding);
/// count.set(2);
/// assert_eq!(renders.get(), 1);
/// ```
pub struct SignalBinding<T> {
    signal: Signal<T>,
    subscription: Option<Unsubscribe>,
}

impl<T: 'static> SignalBinding<T> {
    /// Bind to `signal`, calling `on_change` after every change.
    pub fn new(signal: &Signal<T>, on_change: impl Fn() + 'static) -> Self {
        Self {
            signal: signal.clone(),
            subscription: Some(signal.subscribe(on_change)),
        }
    }

    /// The bound signal.
    pub fn signal(&self) -> &Signal<T> {
        &self.signal
    }
}

impl<T: Clone + 'static> SignalBinding<T> {
    /// Read the current value.
    #[must_use]
    pub fn current(&self) -> T {
        self.signal.get()
    }
}

impl<T> Drop for SignalBinding<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SignalBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBinding")
            .field("signal", &self.signal)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LifecycleEffect<D>
// ---------------------------------------------------------------------------

/// An effect tied to a component's lifetime and dependency values.
///
/// # Example
///
/// ```
/// use segnale_core::binding::LifecycleEffect;
/// use segnale_core::Runtime;
///
/// let runtime = Runtime::new();
/// let query = runtime.create_signal(String::from("rust"));
/// let mut effect = LifecycleEffect::new(&runtime);
///
/// let query_clone = query.clone();
/// assert!(effect.render(1, move || {
///     let _ = query_clone.get();
/// }));
/// // Same dependencies: the existing effect is kept.
/// assert!(!effect.render(1, || {}));
///
/// runtime.run_microtasks();
/// effect.unmount();
/// assert_eq!(query.subscriber_count(), 0);
/// ```
pub struct LifecycleEffect<D> {
    runtime: Weak<RuntimeInner>,
    deps: Option<D>,
    computation: Option<ComputationId>,
}

impl<D: PartialEq> LifecycleEffect<D> {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.downgrade(),
            deps: None,
            computation: None,
        }
    }

    /// Install `run` as the effect unless `deps` equal those of the current
    /// effect. Returns whether a new effect was created.
    pub fn render<F>(&mut self, deps: D, run: F) -> bool
    where
        F: Fn() + 'static,
    {
        self.replace(deps, |runtime| runtime.create_effect(run))
    }

    /// Async form of [`render`](LifecycleEffect::render).
    pub fn render_async<F, Fut, E>(&mut self, deps: D, run: F) -> bool
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<(), E>> + 'static,
        E: Into<BoxError>,
    {
        self.replace(deps, |runtime| runtime.create_async_effect(run))
    }

    fn replace(&mut self, deps: D, create: impl FnOnce(&Runtime) -> ComputationId) -> bool {
        if self.computation.is_some() && self.deps.as_ref() == Some(&deps) {
            return false;
        }
        self.unmount();

        let Some(inner) = self.runtime.upgrade() else {
            return false;
        };
        let runtime = Runtime { inner };
        self.computation = Some(create(&runtime));
        self.deps = Some(deps);
        true
    }
}

impl<D> LifecycleEffect<D> {
    /// Tear down the current effect, if any.
    pub fn unmount(&mut self) {
        self.deps = None;
        let Some(id) = self.computation.take() else {
            return;
        };
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.dispose(id);
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.computation.is_some()
    }

    /// The computation created by the last successful render.
    pub fn computation(&self) -> Option<ComputationId> {
        self.computation
    }
}

impl<D> Drop for LifecycleEffect<D> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<D: fmt::Debug> fmt::Debug for LifecycleEffect<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEffect")
            .field("deps", &self.deps)
            .field("computation", &self.computation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
