//! Execution Context
//!
//! The context stack tracks which computation is currently running. When a
//! signal is read, the computation on top of the stack is registered as a
//! dependent of that signal.
//!
//! # Implementation
//!
//! Each runtime owns its own stack. Entering a computation pushes a frame
//! and returns a guard; dropping the guard pops it. Because the pop happens
//! in `Drop`, a panicking computation never leaves a stale frame behind.
//!
//! A frame may be empty (`None`). Empty frames are pushed by
//! [`Runtime::untrack`](super::Runtime::untrack) and by async continuations
//! whose run was superseded, so that their reads are not attributed to
//! whichever computation happens to sit below them.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::task::{Context, Poll};

use smallvec::SmallVec;

use super::runtime::RuntimeInner;
use crate::graph::ComputationId;

type Frame = Option<ComputationId>;

/// Stack of currently executing computations.
#[derive(Default)]
pub(crate) struct ContextStack {
    frames: RefCell<SmallVec<[Frame; 8]>>,
}

impl ContextStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Push a frame for `computation`. The frame is popped when the
    /// returned guard drops.
    pub(crate) fn enter(&self, computation: Option<ComputationId>) -> ContextFrame<'_> {
        self.frames.borrow_mut().push(computation);
        ContextFrame {
            stack: self,
            computation,
        }
    }

    /// The computation reads are currently attributed to, if any.
    pub(crate) fn current(&self) -> Option<ComputationId> {
        self.frames.borrow().last().copied().flatten()
    }

    /// Whether `computation` has a frame anywhere on the stack.
    pub(crate) fn is_running(&self, computation: ComputationId) -> bool {
        self.frames.borrow().contains(&Some(computation))
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

/// Guard that pops its frame when dropped.
pub(crate) struct ContextFrame<'a> {
    stack: &'a ContextStack,
    computation: Option<ComputationId>,
}

impl Drop for ContextFrame<'_> {
    fn drop(&mut self) {
        let popped = self.stack.frames.borrow_mut().pop();

        // Frames are strictly nested; a mismatch means a guard escaped.
        debug_assert_eq!(
            popped,
            Some(self.computation),
            "context frame mismatch: expected {:?}, got {:?}",
            self.computation,
            popped
        );
    }
}

/// A future whose every poll runs under a computation's context frame.
///
/// Created by [`Runtime::with_context`](super::Runtime::with_context) and by
/// async effects. Reads made after an `.await` are attributed to the
/// computation as long as it has not re-executed since the future was
/// created; continuations of a superseded run poll under an empty frame.
pub struct Tracked<F> {
    runtime: Weak<RuntimeInner>,
    computation: ComputationId,
    epoch: Option<u64>,
    future: Pin<Box<F>>,
}

impl<F> Tracked<F> {
    pub(crate) fn new(runtime: &RuntimeInner, computation: ComputationId, future: F) -> Self {
        let epoch = runtime.retain_task(computation);
        Self {
            runtime: runtime.downgrade(),
            computation,
            epoch,
            future: Box::pin(future),
        }
    }

    /// The computation this future attributes its reads to.
    pub fn computation(&self) -> ComputationId {
        self.computation
    }
}

impl<F: Future> Future for Tracked<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(runtime) = this.runtime.upgrade() else {
            return this.future.as_mut().poll(cx);
        };

        let current = this.epoch.is_some() && runtime.epoch_of(this.computation) == this.epoch;
        let frame = current.then_some(this.computation);

        let _frame = runtime.context.enter(frame);
        this.future.as_mut().poll(cx)
    }
}

impl<F> Drop for Tracked<F> {
    fn drop(&mut self) {
        if self.epoch.is_none() {
            return;
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release_task(self.computation);
        }
    }
}
