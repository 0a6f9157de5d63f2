//! A single unit of work admitted into the render queue.

use crate::pdf_result::PdfResult;
use crate::render_error::RenderError;
use docrender_shared::CorrelationId;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Boxed future produced by a `process` contract operation.
pub type ProcessFuture = Pin<Box<dyn Future<Output = Result<PdfResult, RenderError>> + Send>>;

/// Capability closure the queue invokes exactly once, after the item
/// transitions to *running*.
pub type ProcessFn = Box<dyn FnOnce() -> ProcessFuture + Send>;

/// Boxed future produced by the `cancel` contract operation.
pub type CancelFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Shared, clonable handle to the idempotent cancellation closure.
///
/// A plain `Fn`, not `FnOnce`: the queue's timeout and cancellation
/// protocols must be able to invoke it from outside the bookkeeping lock
/// without taking ownership away from the item.
pub type CancelHandle = Arc<dyn Fn() -> CancelFuture + Send + Sync>;

/// A job admitted into (or rejected by) the queue.
///
/// The queue calls [`QueueItem::take_process`] exactly once, after recording
/// `startedAt`. `cancel` may be invoked any number of times; the first call
/// triggers teardown and subsequent calls must resolve immediately, which is
/// the responsibility of the `cancel` closure supplied at construction.
pub struct QueueItem {
    job_id: CorrelationId,
    added_at: Option<Instant>,
    started_at: Option<Instant>,
    process: Option<ProcessFn>,
    cancel: CancelHandle,
}

impl QueueItem {
    /// Construct a new item from its identity and lifecycle contract.
    ///
    /// `process` MUST start work and eventually resolve or fail; it is
    /// taken (and therefore callable) exactly once. `cancel` MUST be
    /// idempotent and safe to call from any state.
    #[must_use]
    pub fn new<C>(job_id: CorrelationId, process: ProcessFn, cancel: C) -> Self
    where
        C: Fn() -> CancelFuture + Send + Sync + 'static,
    {
        Self {
            job_id,
            added_at: None,
            started_at: None,
            process: Some(process),
            cancel: Arc::new(cancel),
        }
    }

    /// Return the job's identity.
    #[must_use]
    pub const fn job_id(&self) -> &CorrelationId {
        &self.job_id
    }

    /// Record the moment the item was admitted to the waiting set.
    pub fn notify_queue_add(&mut self, now: Instant) {
        self.added_at = Some(now);
    }

    /// Record the moment the item was promoted to running.
    pub fn notify_queue_start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    /// Return the recorded admission time, if any.
    #[must_use]
    pub const fn added_at(&self) -> Option<Instant> {
        self.added_at
    }

    /// Return the recorded start time, if any.
    #[must_use]
    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Take ownership of the `process` closure, leaving the item unable to
    /// be started again.
    pub fn take_process(&mut self) -> Option<ProcessFn> {
        self.process.take()
    }

    /// Invoke the idempotent cancellation contract.
    pub async fn cancel(&self) {
        (self.cancel)().await;
    }

    /// Clone a handle to the cancellation closure, for use by callers that
    /// must invoke it without holding a lock across the call.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        Arc::clone(&self.cancel)
    }
}
