//! External listener handles.
//!
//! External listeners are callbacks registered by non-reactive callers
//! (typically a UI binding) through `Signal::subscribe`. They are distinct
//! from computation subscribers: they are called synchronously on every
//! change, receive no payload, and are never torn down automatically.

use std::fmt;
use std::rc::Weak;

use super::runtime::RuntimeInner;
use crate::graph::{CellId, ListenerId};

/// Removes one listener entry from a signal.
///
/// Dropping this handle does not unsubscribe; call
/// [`unsubscribe`](Unsubscribe::unsubscribe). Each `subscribe` call
/// produces an independent entry, so unsubscribing one never affects
/// another registration of the same callback.
pub struct Unsubscribe {
    runtime: Weak<RuntimeInner>,
    cell: CellId,
    listener: Option<ListenerId>,
}

impl Unsubscribe {
    pub(crate) fn new(runtime: Weak<RuntimeInner>, cell: CellId, listener: Option<ListenerId>) -> Self {
        Self {
            runtime,
            cell,
            listener,
        }
    }

    /// Remove the listener. Later writes never invoke it again.
    pub fn unsubscribe(self) {
        let (Some(runtime), Some(listener)) = (self.runtime.upgrade(), self.listener) else {
            return;
        };
        runtime.remove_listener(self.cell, listener);
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        match (self.runtime.upgrade(), self.listener) {
            (Some(runtime), Some(listener)) => runtime.graph.borrow().has_listener(self.cell, listener),
            _ => false,
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("cell", &self.cell)
            .field("listener", &self.listener)
            .finish()
    }
}
