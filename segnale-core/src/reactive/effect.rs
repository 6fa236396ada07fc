//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever one of the
//! signals it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect is marked dirty and scheduled, so it runs on
//!    the next flush. Effects always run at least once.
//!
//! 2. When any dependency changes, the effect is scheduled to re-run.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (scheduled on
//!   creation and on every dependency change).
//! - Effects are owned by the runtime. An effect that finishes a run
//!   without reading any signal can never run again and is freed.
//!
//! # Async Effects
//!
//! An async effect returns a future. The future is spawned on the runtime's
//! task pool, and every poll runs under the effect's context frame, so
//! reads made after an `.await` are tracked too. If the future resolves to
//! `Err`, the error is logged and handed to the runtime's error hook; it is
//! never propagated, so one failing effect cannot stop other updates.

use std::future::Future;
use std::rc::Rc;

use futures_util::future::FutureExt;

use super::context::Tracked;
use super::runtime::Runtime;
use crate::error::{BoxError, ReactiveError};
use crate::graph::{Body, ComputationId, ComputationKind};

impl Runtime {
    /// Create an effect and schedule its first run.
    ///
    /// # Example
    ///
    /// ```
    /// use segnale_core::Runtime;
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let runtime = Runtime::new();
    /// let name = runtime.create_signal("Ada");
    /// let log = Rc::new(RefCell::new(Vec::new()));
    ///
    /// let name_clone = name.clone();
    /// let log_clone = log.clone();
    /// runtime.create_effect(move || log_clone.borrow_mut().push(name_clone.get()));
    ///
    /// name.set("Grace");
    /// name.set("Barbara");
    /// runtime.run_microtasks();
    ///
    /// // Writes before the first flush coalesce into one run.
    /// assert_eq!(*log.borrow(), vec!["Barbara"]);
    /// ```
    pub fn create_effect<F>(&self, run: F) -> ComputationId
    where
        F: Fn() + 'static,
    {
        let id = self
            .inner
            .register_computation(ComputationKind::Effect, |_| Rc::new(run) as Body);
        self.inner.schedule(id);
        id
    }

    /// Create an effect whose body returns a future, and schedule its
    /// first run.
    ///
    /// `run` itself executes inside the flush; the future it returns is
    /// polled by [`run_until_stalled`](Runtime::run_until_stalled) or
    /// [`settle`](Runtime::settle).
    pub fn create_async_effect<F, Fut, E>(&self, run: F) -> ComputationId
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<(), E>> + 'static,
        E: Into<BoxError>,
    {
        let runtime = self.downgrade();
        let id = self
            .inner
            .register_computation(ComputationKind::Effect, move |id| {
                Rc::new(move || {
                    let Some(inner) = runtime.upgrade() else {
                        return;
                    };
                    let tracked = Tracked::new(&inner, id, run());
                    let reporter = runtime.clone();
                    let task = async move {
                        if let Err(err) = tracked.await {
                            if let Some(inner) = reporter.upgrade() {
                                inner.report(ReactiveError::AsyncEffect {
                                    computation: id,
                                    source: err.into(),
                                });
                            }
                        }
                    };
                    inner.tasks.spawn(task.boxed_local());
                }) as Body
            });
        self.inner.schedule(id);
        id
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
