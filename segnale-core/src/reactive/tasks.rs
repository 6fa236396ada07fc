//! Task pool for async effects.
//!
//! Futures spawned here run on the runtime's own thread, interleaved with
//! microtask drains. Spawning never polls; the first poll happens on the
//! next [`Runtime::run_until_stalled`] or [`Runtime::settle`].
//!
//! Polling may spawn more tasks (an async effect re-running), so new tasks
//! go to an inbox that is merged into the running set before each poll
//! round, and the running set is moved out of its cell while it is polled.

use std::cell::RefCell;
use std::future::Future;
use std::mem;
use std::task::{Context, Poll};

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};

use super::runtime::Runtime;

/// Outcome of one poll round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaskPoll {
    /// At least one task completed.
    pub(crate) progressed: bool,
    /// Tasks still pending after the round.
    pub(crate) remaining: usize,
}

#[derive(Default)]
pub(crate) struct TaskPool {
    running: RefCell<FuturesUnordered<LocalBoxFuture<'static, ()>>>,
    incoming: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl TaskPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.incoming.borrow_mut().push(task);
    }

    pub(crate) fn has_incoming(&self) -> bool {
        !self.incoming.borrow().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.running.borrow().len() + self.incoming.borrow().len()
    }

    /// Poll every task that is ready to make progress.
    pub(crate) fn poll(&self, cx: &mut Context<'_>) -> TaskPoll {
        let mut running = mem::take(&mut *self.running.borrow_mut());
        running.extend(self.incoming.borrow_mut().drain(..));

        let mut progressed = false;
        while let Poll::Ready(Some(())) = running.poll_next_unpin(cx) {
            progressed = true;
        }

        // A nested poll may have parked its own set here meanwhile.
        let mut slot = self.running.borrow_mut();
        running.extend(mem::take(&mut *slot));
        let remaining = running.len();
        *slot = running;

        TaskPoll {
            progressed,
            remaining,
        }
    }
}

impl Runtime {
    /// Spawn a future on this runtime's task pool.
    ///
    /// Combine with [`Runtime::with_context`] to attribute the future's
    /// reads to a computation.
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.tasks.spawn(future.boxed_local());
    }

    /// Number of async tasks that have not completed.
    pub fn task_count(&self) -> usize {
        self.inner.tasks.len()
    }
}
