//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph, the context stack, the scheduler
//! and the async task pool.
//!
//! # How It Works
//!
//! 1. When a signal is read inside a computation, the runtime links the
//!    computation and the signal's cell in both directions.
//!
//! 2. When a signal's value changes, the runtime:
//!    a. Marks every clean subscriber dirty
//!    b. Hands each of them to the scheduler
//!    c. Invokes the signal's external listeners synchronously
//!
//! 3. The scheduler later flushes the dirty set, and each computation tears
//!    down its old dependencies before running again.
//!
//! # Ownership
//!
//! A [`Runtime`] is a cheap, clonable handle. Signals and memos refer to
//! their runtime weakly, so dropping the last `Runtime` handle frees the
//! whole graph, including effect closures and the signals they captured.
//! Operations on a signal whose runtime is gone still read and write the
//! value but no longer track or notify.
//!
//! # Thread Safety
//!
//! None. A runtime and everything created from it lives on one thread.
//! Independent runtimes share nothing and can be used side by side, which
//! is what tests rely on for isolation.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use super::config::{RuntimeBuilder, RuntimeConfig};
use super::context::{ContextStack, Tracked};
use super::scheduler::Scheduler;
use super::tasks::TaskPool;
use crate::error::ReactiveError;
use crate::graph::{Body, CellId, ComputationId, ComputationKind, DependencyGraph, Listener, ListenerId};

pub(crate) struct RuntimeInner {
    this: Weak<RuntimeInner>,
    pub(crate) config: RuntimeConfig,
    pub(crate) graph: RefCell<DependencyGraph>,
    pub(crate) context: ContextStack,
    pub(crate) scheduler: Scheduler,
    pub(crate) tasks: TaskPool,
}

/// Handle to a reactive runtime.
///
/// # Example
///
/// ```
/// use segnale_core::Runtime;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_signal(1);
/// let seen = Rc::new(Cell::new(0));
///
/// let count_clone = count.clone();
/// let seen_clone = seen.clone();
/// runtime.create_effect(move || seen_clone.set(count_clone.get()));
///
/// runtime.run_microtasks();
/// assert_eq!(seen.get(), 1);
///
/// count.set(5);
/// runtime.run_microtasks();
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with default settings.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Start configuring a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn with_config(config: RuntimeConfig) -> Self {
        let scheduler = Scheduler::new(config.batch_updates.clone());
        let inner = Rc::new_cyclic(|this| RuntimeInner {
            this: this.clone(),
            config,
            graph: RefCell::new(DependencyGraph::new()),
            context: ContextStack::new(),
            scheduler,
            tasks: TaskPool::new(),
        });
        tracing::debug!(runtime = %inner.config.label, "reactive runtime created");
        Self { inner }
    }

    /// The label attached to this runtime's tracing events.
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// The computation that reads are currently attributed to, if any.
    pub fn current_computation(&self) -> Option<ComputationId> {
        self.inner.context.current()
    }

    /// Run `f` with `computation` as the current computation.
    ///
    /// Reads inside `f` subscribe `computation`. Unknown ids are accepted;
    /// reads are then simply not recorded.
    pub fn run_with_context<R>(&self, computation: ComputationId, f: impl FnOnce() -> R) -> R {
        let _frame = self.inner.context.enter(Some(computation));
        f()
    }

    /// Wrap `future` so that every poll runs with `computation` as the
    /// current computation.
    ///
    /// The wrapper stops attributing reads once `computation` re-executes.
    pub fn with_context<F: Future>(&self, computation: ComputationId, future: F) -> Tracked<F> {
        Tracked::new(&self.inner, computation, future)
    }

    /// Run `f` without attributing its reads to the current computation.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _frame = self.inner.context.enter(None);
        f()
    }

    /// Number of live signal cells.
    pub fn cell_count(&self) -> usize {
        self.inner.graph.borrow().cell_count()
    }

    /// Number of live computations (effects and memos).
    pub fn computation_count(&self) -> usize {
        self.inner.graph.borrow().computation_count()
    }

    /// Whether `computation` is waiting to be re-executed.
    pub fn is_dirty(&self, computation: ComputationId) -> bool {
        self.inner.graph.borrow().is_dirty(computation)
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.inner.graph.borrow();
        f.debug_struct("Runtime")
            .field("label", &self.inner.config.label)
            .field("cells", &graph.cell_count())
            .field("computations", &graph.computation_count())
            .field("pending", &self.inner.scheduler.pending_count())
            .field("context_depth", &self.inner.context.depth())
            .finish()
    }
}

impl RuntimeInner {
    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        self.this.clone()
    }

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    pub(crate) fn add_cell(&self) -> CellId {
        self.graph.borrow_mut().add_cell()
    }

    pub(crate) fn remove_cell(&self, cell: CellId) {
        // Listener closures may own signals; drop them after the borrow ends.
        let removed = match self.graph.try_borrow_mut() {
            Ok(mut graph) => graph.remove_cell(cell),
            Err(_) => return,
        };
        let Some(node) = removed else {
            return;
        };

        // Readers that lost their last dependency can never run again.
        // Running ones are collected when their run ends.
        let orphans: Vec<ComputationId> = node
            .subscribers
            .iter()
            .copied()
            .filter(|id| !self.context.is_running(*id))
            .collect();
        drop(node);
        for computation in orphans {
            self.collect_if_inert(computation);
        }
    }

    /// Register the current computation as a subscriber of `cell`.
    pub(crate) fn track_read(&self, cell: CellId) {
        if let Some(current) = self.context.current() {
            self.graph.borrow_mut().subscribe(current, cell);
        }
    }

    /// Propagate a change of `cell`: dirty and schedule its subscribers,
    /// then notify its external listeners in registration order.
    pub(crate) fn notify_write(&self, cell: CellId) {
        let (dirtied, listeners) = {
            let mut graph = self.graph.borrow_mut();
            (graph.mark_subscribers_dirty(cell), graph.listeners(cell))
        };

        for computation in dirtied {
            self.schedule(computation);
        }

        for (id, listener) in listeners {
            // A listener removed by an earlier one in this round is skipped.
            if self.graph.borrow().has_listener(cell, id) {
                listener();
            }
        }
    }

    pub(crate) fn add_listener(&self, cell: CellId, listener: Listener) -> Option<ListenerId> {
        self.graph.borrow_mut().add_listener(cell, listener)
    }

    pub(crate) fn remove_listener(&self, cell: CellId, listener: ListenerId) {
        let removed = self.graph.borrow_mut().remove_listener(cell, listener);
        drop(removed);
    }

    pub(crate) fn listener_count(&self, cell: CellId) -> usize {
        self.graph.borrow().listener_count(cell)
    }

    pub(crate) fn subscriber_count(&self, cell: CellId) -> usize {
        self.graph.borrow().subscriber_count(cell)
    }

    // ------------------------------------------------------------------
    // Computations
    // ------------------------------------------------------------------

    pub(crate) fn add_computation(&self, id: ComputationId, kind: ComputationKind, body: Body) {
        self.graph.borrow_mut().add_computation(id, kind, body);
    }

    /// Add a computation whose body is built from its own id.
    pub(crate) fn register_computation(
        &self,
        kind: ComputationKind,
        body: impl FnOnce(ComputationId) -> Body,
    ) -> ComputationId {
        let id = ComputationId::new();
        self.add_computation(id, kind, body(id));
        id
    }

    /// Run a computation's body if it is dirty.
    ///
    /// The dirty flag is cleared and old dependencies are torn down before
    /// the body runs, so a computation scheduled several times runs at most
    /// once and re-subscribes only to what it reads this time.
    pub(crate) fn execute(&self, id: ComputationId) {
        let body = {
            let mut graph = self.graph.borrow_mut();
            let Some(node) = graph.computation_mut(id) else {
                return;
            };
            if !node.dirty {
                return;
            }
            node.dirty = false;
            node.epoch += 1;
            let body = Body::clone(&node.body);
            graph.cleanup_dependencies(id);
            body
        };

        tracing::trace!(runtime = %self.config.label, computation = %id, "running computation");

        // Runs after the frame pops, on return and on unwind alike.
        let _collect = CollectOnExit { runtime: self, id };
        let _frame = self.context.enter(Some(id));
        body();
    }

    /// Remove a computation and all of its edges.
    pub(crate) fn dispose(&self, id: ComputationId) {
        let removed = match self.graph.try_borrow_mut() {
            Ok(mut graph) => graph.remove_computation(id),
            Err(_) => return,
        };
        drop(removed);
    }

    /// Free an effect that nothing can trigger anymore.
    pub(crate) fn collect_if_inert(&self, id: ComputationId) {
        let removed = {
            let Ok(mut graph) = self.graph.try_borrow_mut() else {
                return;
            };
            match graph.computation(id) {
                Some(node) if node.is_inert() => graph.remove_computation(id),
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::trace!(runtime = %self.config.label, computation = %id, "collected inert effect");
        }
        drop(removed);
    }

    pub(crate) fn epoch_of(&self, id: ComputationId) -> Option<u64> {
        self.graph.borrow().computation(id).map(|node| node.epoch)
    }

    /// Count a live async continuation of `id`. Returns the epoch it speaks
    /// for, or `None` if the computation does not exist.
    pub(crate) fn retain_task(&self, id: ComputationId) -> Option<u64> {
        let mut graph = self.graph.borrow_mut();
        let node = graph.computation_mut(id)?;
        node.tasks += 1;
        Some(node.epoch)
    }

    pub(crate) fn release_task(&self, id: ComputationId) {
        let Ok(mut graph) = self.graph.try_borrow_mut() else {
            return;
        };
        if let Some(node) = graph.computation_mut(id) {
            node.tasks = node.tasks.saturating_sub(1);
        }
        drop(graph);
        self.collect_if_inert(id);
    }

    /// Report an error that must not propagate.
    pub(crate) fn report(&self, error: ReactiveError) {
        tracing::error!(runtime = %self.config.label, error = %error, "reactive error");
        if let Some(hook) = &self.config.error_hook {
            hook(&error);
        }
    }
}

struct CollectOnExit<'a> {
    runtime: &'a RuntimeInner,
    id: ComputationId,
}

impl Drop for CollectOnExit<'_> {
    fn drop(&mut self) {
        self.runtime.collect_if_inert(self.id);
    }
}
