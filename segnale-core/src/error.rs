//! Error types.
//!
//! Reads, writes and subscriptions never fail. Errors only come out of the
//! structured-value surface (signal trees), memo re-entrancy, and async
//! effects whose futures resolve to `Err`.

use thiserror::Error;

use crate::graph::ComputationId;

/// Boxed error returned by an async effect.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// An async effect's future resolved to an error. Reported, never
    /// rethrown.
    #[error("effect {computation} encountered an error: {source}")]
    AsyncEffect {
        computation: ComputationId,
        #[source]
        source: BoxError,
    },

    /// A memo was read from inside its own first computation, so it has no
    /// value to return yet.
    #[error("memo {0} was read while computing its first value")]
    Reentrant(ComputationId),

    /// The runtime that owned a memo was dropped before the memo produced a
    /// value.
    #[error("the runtime was dropped before the value could be computed")]
    RuntimeDropped,

    /// No field exists at the given path of a signal tree.
    #[error("no signal at path `{0}`")]
    MissingPath(String),

    /// A signal tree node does not have the requested shape.
    #[error("signal at path `{path}` is {found}, expected {expected}")]
    ShapeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Conversion between a typed value and its JSON representation failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
