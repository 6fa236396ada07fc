//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph:
//! cells (the subscriber side of a signal) and computations (effects and
//! memos).

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

/// Body of a computation, invoked by the runtime while the computation's
/// context frame is on the stack.
pub(crate) type Body = Rc<dyn Fn()>;

/// External change listener registered through `Signal::subscribe`.
pub(crate) type Listener = Rc<dyn Fn()>;

fn next_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a signal cell's subscriber set.
///
/// Computations record these handles in their dependency registry rather
/// than the cells themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    pub(crate) fn new() -> Self {
        Self(next_id())
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Handle to a computation (effect or memo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    pub(crate) fn new() -> Self {
        Self(next_id())
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "computation#{}", self.0)
    }
}

/// Identifier of one external listener entry on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new() -> Self {
        Self(next_id())
    }
}

/// The kind of computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationKind {
    /// Eager: scheduled on creation and whenever a dependency changes.
    /// Owned by the graph.
    Effect,

    /// Lazy: computed on first read. Owned by its `Memo` handle.
    Memo,
}

/// The subscriber side of a signal cell.
pub(crate) struct CellNode {
    /// Computations that read this cell during their last run.
    pub(crate) subscribers: IndexSet<ComputationId>,

    /// External listeners in registration order.
    pub(crate) listeners: IndexMap<ListenerId, Listener>,
}

impl CellNode {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: IndexSet::new(),
            listeners: IndexMap::new(),
        }
    }
}

/// A computation in the dependency graph.
pub(crate) struct ComputationNode {
    pub(crate) kind: ComputationKind,

    /// Set when a dependency changed since the last run.
    pub(crate) dirty: bool,

    /// Cells whose subscriber sets this computation joined.
    pub(crate) dependencies: IndexSet<CellId>,

    pub(crate) body: Body,

    /// Incremented on every run. Async continuations compare against it to
    /// decide whether they still speak for the current run.
    pub(crate) epoch: u64,

    /// Live async continuations attributing reads to this computation.
    pub(crate) tasks: usize,
}

impl ComputationNode {
    /// Computations start dirty so that their first execution always runs.
    pub(crate) fn new(kind: ComputationKind, body: Body) -> Self {
        Self {
            kind,
            dirty: true,
            dependencies: IndexSet::new(),
            body,
            epoch: 0,
            tasks: 0,
        }
    }

    /// An effect that is clean, has no dependencies and no live async
    /// continuation can never run again.
    pub(crate) fn is_inert(&self) -> bool {
        self.kind == ComputationKind::Effect
            && !self.dirty
            && self.dependencies.is_empty()
            && self.tasks == 0
    }
}

impl fmt::Debug for ComputationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationNode")
            .field("kind", &self.kind)
            .field("dirty", &self.dirty)
            .field("dependencies", &self.dependencies)
            .field("epoch", &self.epoch)
            .field("tasks", &self.tasks)
            .finish()
    }
}
