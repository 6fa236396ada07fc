//! Dependency Tracker
//!
//! The tracker owns both sides of every edge: each cell's subscriber set and
//! each computation's dependency registry. Keeping the two in sync is what
//! makes teardown proportional to a computation's current dependencies
//! rather than to the total number of cells.
//!
//! Removal methods hand the removed node back to the caller. Nodes carry
//! user closures that may own signals, and dropping those signals re-enters
//! the graph, so callers must release their borrow before dropping them.

use std::collections::HashMap;

use super::node::{
    Body, CellId, CellNode, ComputationId, ComputationKind, ComputationNode, Listener,
    ListenerId,
};

/// Bidirectional adjacency between cells and computations.
#[derive(Default)]
pub(crate) struct DependencyGraph {
    cells: HashMap<CellId, CellNode>,
    computations: HashMap<ComputationId, ComputationNode>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    pub(crate) fn add_cell(&mut self) -> CellId {
        let id = CellId::new();
        self.cells.insert(id, CellNode::new());
        id
    }

    /// Remove a cell and unlink it from every computation that read it.
    pub(crate) fn remove_cell(&mut self, cell: CellId) -> Option<CellNode> {
        let node = self.cells.remove(&cell)?;
        for subscriber in &node.subscribers {
            if let Some(computation) = self.computations.get_mut(subscriber) {
                computation.dependencies.shift_remove(&cell);
            }
        }
        Some(node)
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn subscriber_count(&self, cell: CellId) -> usize {
        self.cells.get(&cell).map_or(0, |node| node.subscribers.len())
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub(crate) fn add_listener(&mut self, cell: CellId, listener: Listener) -> Option<ListenerId> {
        let node = self.cells.get_mut(&cell)?;
        let id = ListenerId::new();
        node.listeners.insert(id, listener);
        Some(id)
    }

    /// Remove one listener entry, preserving the order of the others.
    pub(crate) fn remove_listener(&mut self, cell: CellId, listener: ListenerId) -> Option<Listener> {
        self.cells.get_mut(&cell)?.listeners.shift_remove(&listener)
    }

    pub(crate) fn has_listener(&self, cell: CellId, listener: ListenerId) -> bool {
        self.cells
            .get(&cell)
            .is_some_and(|node| node.listeners.contains_key(&listener))
    }

    /// Snapshot of a cell's listeners in registration order.
    pub(crate) fn listeners(&self, cell: CellId) -> Vec<(ListenerId, Listener)> {
        self.cells.get(&cell).map_or_else(Vec::new, |node| {
            node.listeners
                .iter()
                .map(|(id, listener)| (*id, Listener::clone(listener)))
                .collect()
        })
    }

    pub(crate) fn listener_count(&self, cell: CellId) -> usize {
        self.cells.get(&cell).map_or(0, |node| node.listeners.len())
    }

    // ------------------------------------------------------------------
    // Computations
    // ------------------------------------------------------------------

    pub(crate) fn add_computation(&mut self, id: ComputationId, kind: ComputationKind, body: Body) {
        self.computations.insert(id, ComputationNode::new(kind, body));
    }

    /// Remove a computation after tearing down its dependencies.
    pub(crate) fn remove_computation(&mut self, id: ComputationId) -> Option<ComputationNode> {
        self.cleanup_dependencies(id);
        self.computations.remove(&id)
    }

    pub(crate) fn computation(&self, id: ComputationId) -> Option<&ComputationNode> {
        self.computations.get(&id)
    }

    pub(crate) fn computation_mut(&mut self, id: ComputationId) -> Option<&mut ComputationNode> {
        self.computations.get_mut(&id)
    }

    pub(crate) fn computation_count(&self) -> usize {
        self.computations.len()
    }

    pub(crate) fn is_dirty(&self, id: ComputationId) -> bool {
        self.computations.get(&id).is_some_and(|node| node.dirty)
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Join `computation` to the subscriber set of `cell` and record the
    /// set in the computation's registry. Idempotent.
    pub(crate) fn subscribe(&mut self, computation: ComputationId, cell: CellId) {
        let (Some(cell_node), Some(computation_node)) = (
            self.cells.get_mut(&cell),
            self.computations.get_mut(&computation),
        ) else {
            return;
        };
        cell_node.subscribers.insert(computation);
        computation_node.dependencies.insert(cell);
    }

    /// Remove `computation` from every subscriber set it joined and clear
    /// its registry.
    pub(crate) fn cleanup_dependencies(&mut self, computation: ComputationId) {
        let Some(node) = self.computations.get_mut(&computation) else {
            return;
        };
        for cell in node.dependencies.drain(..) {
            if let Some(cell_node) = self.cells.get_mut(&cell) {
                cell_node.subscribers.shift_remove(&computation);
            }
        }
    }

    /// Mark every clean subscriber of `cell` dirty.
    ///
    /// Returns the computations that flipped, in subscription order. Already
    /// dirty subscribers are skipped because they are already scheduled.
    pub(crate) fn mark_subscribers_dirty(&mut self, cell: CellId) -> Vec<ComputationId> {
        let Some(cell_node) = self.cells.get(&cell) else {
            return Vec::new();
        };
        let mut dirtied = Vec::with_capacity(cell_node.subscribers.len());
        for subscriber in &cell_node.subscribers {
            if let Some(node) = self.computations.get_mut(subscriber) {
                if !node.dirty {
                    node.dirty = true;
                    dirtied.push(*subscriber);
                }
            }
        }
        dirtied
    }
}
