//! Dependency Graph
//!
//! This module implements the bipartite graph that links signal cells to the
//! computations that read them.
//!
//! # Overview
//!
//! - Cells hold a subscriber set: the computations that read the cell during
//!   their most recent run.
//! - Computations hold a dependency registry: the subscriber sets they
//!   joined.
//!
//! Both sides are keyed by integer handles ([`CellId`], [`ComputationId`])
//! instead of references, so cells and computations never own each other.
//! Values live in the typed `Signal`/`Memo` handles; the graph only stores
//! the untyped edges, dirty flags, listeners and computation bodies.

mod node;
mod tracker;

pub use node::{CellId, ComputationId, ComputationKind, ListenerId};
pub(crate) use node::{Body, Listener};
pub(crate) use tracker::DependencyGraph;
