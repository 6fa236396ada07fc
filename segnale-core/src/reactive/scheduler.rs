//! Update Scheduler
//!
//! The scheduler collects dirty computations and flushes them at microtask
//! granularity.
//!
//! # Algorithm
//!
//! 1. `schedule` inserts a computation into the dirty set (insertion
//!    ordered). If no flush is pending, one is queued as a microtask.
//! 2. A flush runs inside the batch wrapper. It takes the dirty set as a
//!    snapshot, clears the pending flag, then executes each computation in
//!    insertion order. Execution re-checks the dirty flag, so every
//!    computation runs at most once per flush.
//! 3. Computations dirtied while a flush is running land in a fresh dirty
//!    set and a new flush microtask. A flush never grows while it runs.
//!
//! # Microtasks
//!
//! There is no ambient microtask queue in Rust, so the runtime owns a FIFO
//! queue. Hosts drain it with [`Runtime::run_microtasks`] once their
//! synchronous work is done, or with [`Runtime::run_until_stalled`] /
//! [`Runtime::settle`] when async effects are involved.
//!
//! # Failure
//!
//! A panic in a computation unwinds out of the flush. Before it leaves, the
//! flush re-queues the computations of its snapshot that it did not reach,
//! so nothing stays dirty without a flush that will visit it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures_util::future::poll_fn;
use futures_util::task::noop_waker_ref;
use indexmap::IndexSet;

use super::config::BatchUpdates;
use super::runtime::{Runtime, RuntimeInner};
use crate::graph::ComputationId;

enum Microtask {
    Flush,
    Callback(Box<dyn FnOnce()>),
}

#[derive(Default)]
struct DirtySet {
    pending: IndexSet<ComputationId>,
    flush_queued: bool,
}

pub(crate) struct Scheduler {
    dirty: RefCell<DirtySet>,
    microtasks: RefCell<VecDeque<Microtask>>,
    batch_updates: RefCell<BatchUpdates>,
    batch_depth: Cell<usize>,
    /// Waker of a parked `settle()` call, woken when a microtask is queued.
    waker: RefCell<Option<Waker>>,
}

fn direct_invocation() -> BatchUpdates {
    Rc::new(|callback: &mut dyn FnMut()| callback())
}

impl Scheduler {
    pub(crate) fn new(batch_updates: Option<BatchUpdates>) -> Self {
        Self {
            dirty: RefCell::new(DirtySet::default()),
            microtasks: RefCell::new(VecDeque::new()),
            batch_updates: RefCell::new(batch_updates.unwrap_or_else(direct_invocation)),
            batch_depth: Cell::new(0),
            waker: RefCell::new(None),
        }
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.dirty.borrow().pending.len()
    }

    fn wrapper(&self) -> BatchUpdates {
        Rc::clone(&self.batch_updates.borrow())
    }

    fn push(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    fn pop(&self) -> Option<Microtask> {
        self.microtasks.borrow_mut().pop_front()
    }

    fn has_microtasks(&self) -> bool {
        !self.microtasks.borrow().is_empty()
    }
}

/// The snapshot of one flush. Dropping it before the end (only possible by
/// unwinding) re-queues whatever was not reached.
struct FlushPass<'a> {
    runtime: &'a RuntimeInner,
    queue: Vec<ComputationId>,
    next: usize,
}

impl FlushPass<'_> {
    fn advance(&mut self) -> Option<ComputationId> {
        let id = self.queue.get(self.next).copied()?;
        self.next += 1;
        Some(id)
    }
}

impl Drop for FlushPass<'_> {
    fn drop(&mut self) {
        let remaining = &self.queue[self.next.min(self.queue.len())..];
        if remaining.is_empty() {
            return;
        }
        tracing::warn!(
            runtime = %self.runtime.config.label,
            remaining = remaining.len(),
            "flush aborted; re-queueing unvisited computations"
        );
        for id in remaining {
            let dirty = self
                .runtime
                .graph
                .try_borrow()
                .is_ok_and(|graph| graph.is_dirty(*id));
            if dirty {
                self.runtime.schedule(*id);
            }
        }
    }
}

impl RuntimeInner {
    /// Add `computation` to the dirty set, queueing a flush if none is
    /// pending.
    pub(crate) fn schedule(&self, computation: ComputationId) {
        let queue_flush = {
            let mut dirty = self.scheduler.dirty.borrow_mut();
            dirty.pending.insert(computation);
            !mem::replace(&mut dirty.flush_queued, true)
        };
        if queue_flush {
            self.scheduler.push(Microtask::Flush);
        }
    }

    /// Run one flush inside the batch wrapper.
    pub(crate) fn flush(&self) {
        let wrapper = self.scheduler.wrapper();
        let mut ran = false;
        wrapper(&mut || {
            ran = true;
            self.flush_pass();
        });
        if !ran {
            tracing::warn!(
                runtime = %self.config.label,
                "batch wrapper did not invoke its callback; flushing directly"
            );
            self.flush_pass();
        }
    }

    fn flush_pass(&self) {
        let queue: Vec<ComputationId> = {
            let mut dirty = self.scheduler.dirty.borrow_mut();
            dirty.flush_queued = false;
            mem::take(&mut dirty.pending).into_iter().collect()
        };
        if queue.is_empty() {
            return;
        }

        tracing::trace!(runtime = %self.config.label, computations = queue.len(), "flushing");
        let mut pass = FlushPass {
            runtime: self,
            queue,
            next: 0,
        };
        while let Some(id) = pass.advance() {
            self.execute(id);
        }
    }

    /// Drain the microtask queue, including microtasks queued while
    /// draining. Returns the number of microtasks run.
    pub(crate) fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop() {
            match task {
                Microtask::Flush => self.flush(),
                Microtask::Callback(callback) => callback(),
            }
            ran += 1;
        }
        ran
    }

    /// Alternate microtasks and async tasks until neither makes progress.
    /// Ready once both are exhausted; pending while a task waits on a
    /// wake-up.
    fn poll_settle(&self, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            let ran = self.run_microtasks();
            let polled = self.tasks.poll(cx);
            if ran == 0 && !polled.progressed && !self.tasks.has_incoming() {
                if polled.remaining == 0 && !self.scheduler.has_microtasks() {
                    return Poll::Ready(());
                }
                *self.scheduler.waker.borrow_mut() = Some(cx.waker().clone());
                return Poll::Pending;
            }
        }
    }
}

impl Runtime {
    /// Queue `callback` to run on the next microtask drain, after every
    /// microtask already queued.
    pub fn queue_microtask(&self, callback: impl FnOnce() + 'static) {
        self.inner.scheduler.push(Microtask::Callback(Box::new(callback)));
    }

    /// Run queued microtasks (flushes and callbacks) until the queue is
    /// empty. Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        self.inner.run_microtasks()
    }

    /// Drain microtasks and poll async effect tasks until neither can make
    /// progress without an external wake-up.
    ///
    /// Returns `true` if no async task is left pending.
    pub fn run_until_stalled(&self) -> bool {
        let mut cx = Context::from_waker(noop_waker_ref());
        let settled = self.inner.poll_settle(&mut cx).is_ready();
        self.inner.scheduler.waker.borrow_mut().take();
        settled
    }

    /// Wait until all microtasks have run and all async effect tasks have
    /// completed, parking on real wakers in between.
    pub fn settle(&self) -> impl Future<Output = ()> + '_ {
        poll_fn(move |cx| self.inner.poll_settle(cx))
    }

    /// Replace the wrapper invoked around flushes and [`run_in_batch`].
    ///
    /// The wrapper must call the callback it receives exactly once.
    ///
    /// [`run_in_batch`]: Runtime::run_in_batch
    pub fn set_batch_updates<F>(&self, wrapper: F)
    where
        F: Fn(&mut dyn FnMut()) + 'static,
    {
        *self.inner.scheduler.batch_updates.borrow_mut() = Rc::new(wrapper);
        tracing::debug!(runtime = %self.inner.config.label, "batch wrapper replaced");
    }

    /// Run `f` synchronously inside the batch wrapper.
    ///
    /// Writes made by `f` are not deferred: they mark and schedule
    /// computations immediately. Because a flush only happens on the next
    /// microtask drain, all of them are still coalesced into one flush.
    pub fn run_in_batch<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Depth<'a>(&'a Cell<usize>);
        impl Drop for Depth<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() - 1);
            }
        }

        let depth = &self.inner.scheduler.batch_depth;
        depth.set(depth.get() + 1);
        let _depth = Depth(depth);

        let wrapper = self.inner.scheduler.wrapper();
        let mut f = Some(f);
        let mut result = None;
        wrapper(&mut || {
            if let Some(f) = f.take() {
                result = Some(f());
            }
        });
        match (result, f) {
            (Some(result), _) => result,
            (None, Some(f)) => {
                tracing::warn!(
                    runtime = %self.inner.config.label,
                    "batch wrapper did not invoke its callback; running batch directly"
                );
                f()
            }
            (None, None) => unreachable!("batch callback consumed without producing a result"),
        }
    }

    /// Whether a [`run_in_batch`](Runtime::run_in_batch) scope is active.
    pub fn is_batching(&self) -> bool {
        self.inner.scheduler.batch_depth.get() > 0
    }

    /// Number of computations waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.inner.scheduler.pending_count()
    }
}
