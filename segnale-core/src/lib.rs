//! Segnale Core
//!
//! This crate provides a fine-grained reactive state runtime. It implements:
//!
//! - Reactive primitives (signals, memos, effects, async effects)
//! - Dynamic dependency tracking with full teardown between runs
//! - A microtask-granularity scheduler with a pluggable batch wrapper
//! - Decomposition of structured values into per-field signals
//! - Bindings for UI layers (external-store subscriptions and
//!   lifecycle-bound effects)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, the runtime and its scheduler
//! - `graph`: Dependency graph between signal cells and computations
//! - `binding`: Host-facing helpers for UI integration
//!
//! # Example
//!
//! ```rust
//! use segnale_core::Runtime;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let runtime = Runtime::new();
//!
//! // Create a signal
//! let count = runtime.create_signal(0);
//!
//! // Create a derived value
//! let count_clone = count.clone();
//! let doubled = runtime.create_memo(move || count_clone.get() * 2);
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let (count_clone, log_clone) = (count.clone(), log.clone());
//! runtime.create_effect(move || log_clone.borrow_mut().push(count_clone.get()));
//!
//! // Update the signal
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//!
//! // Effects run when the host drains the microtask queue
//! runtime.run_microtasks();
//! assert_eq!(*log.borrow(), vec![5]);
//! ```

pub mod binding;
mod error;
pub mod graph;
pub mod reactive;

pub use error::{BoxError, ReactiveError, Result};
pub use graph::{CellId, ComputationId, ComputationKind, ListenerId};
pub use reactive::{Memo, Runtime, RuntimeBuilder, RuntimeConfig, Signal, SignalTree, Tracked, Unsubscribe};
