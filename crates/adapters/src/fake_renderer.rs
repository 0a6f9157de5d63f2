//! Deterministic `Renderer`/`RendererFactory` test double.
//!
//! Not gated behind `#[cfg(test)]`: the HTTP and queue integration tests in
//! other crates need to construct one too, the same way a prior version of
//! this crate exposed a deterministic embedding stand-in for its own tests.

use docrender_domain::{PdfResult, RenderError};
use docrender_ports::{BoxFuture, RenderRequest, Renderer, RendererFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// What a [`FakeRenderer`] does when `article_to_pdf` is called.
#[derive(Debug, Clone)]
pub enum FakeRenderOutcome {
    /// Resolve after `delay` with the given PDF bytes and `last_modified`.
    Succeed {
        /// Delay before resolving, simulating render latency.
        delay: Duration,
        /// Bytes returned as the PDF buffer.
        buffer: Vec<u8>,
        /// Value returned as `last_modified`.
        last_modified: String,
    },
    /// Reject after `delay` with the given error.
    Fail {
        /// Delay before rejecting.
        delay: Duration,
        /// The error to reject with.
        error: RenderError,
    },
    /// Never resolve or reject on its own; only settles if `abort` fires.
    Hang,
}

impl FakeRenderOutcome {
    /// A successful render with placeholder bytes and no artificial delay.
    #[must_use]
    pub fn immediate_success() -> Self {
        Self::Succeed {
            delay: Duration::ZERO,
            buffer: b"%PDF-1.4 fake".to_vec(),
            last_modified: "Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
        }
    }
}

/// Builds [`FakeRenderer`] instances that all share one outcome and one
/// counter of how many renderers have been constructed and how many were
/// aborted, so tests can assert on queue/concurrency behavior.
#[derive(Clone)]
pub struct FakeRendererFactory {
    outcome: FakeRenderOutcome,
    renderers_built: Arc<AtomicUsize>,
    aborts_invoked: Arc<AtomicUsize>,
}

impl FakeRendererFactory {
    /// Build a factory that produces renderers which all behave per `outcome`.
    #[must_use]
    pub fn new(outcome: FakeRenderOutcome) -> Self {
        Self {
            outcome,
            renderers_built: Arc::new(AtomicUsize::new(0)),
            aborts_invoked: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of renderers this factory has constructed.
    #[must_use]
    pub fn renderers_built(&self) -> usize {
        self.renderers_built.load(Ordering::SeqCst)
    }

    /// Number of times an abort closure returned by this factory was called.
    #[must_use]
    pub fn aborts_invoked(&self) -> usize {
        self.aborts_invoked.load(Ordering::SeqCst)
    }
}

impl RendererFactory for FakeRendererFactory {
    fn new_renderer(
        &self,
    ) -> (
        Box<dyn Renderer>,
        Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>,
    ) {
        self.renderers_built.fetch_add(1, Ordering::SeqCst);
        let aborted = Arc::new(AtomicBool::new(false));
        let renderer = FakeRenderer {
            outcome: self.outcome.clone(),
            aborted: Arc::clone(&aborted),
        };

        let aborts_invoked = Arc::clone(&self.aborts_invoked);
        let abort = move || -> BoxFuture<'static, ()> {
            aborted.store(true, Ordering::SeqCst);
            aborts_invoked.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        };

        (Box::new(renderer), Box::new(abort))
    }
}

/// A `Renderer` whose single `article_to_pdf` call replays a canned
/// [`FakeRenderOutcome`] instead of driving a real browser.
struct FakeRenderer {
    outcome: FakeRenderOutcome,
    aborted: Arc<AtomicBool>,
}

impl Renderer for FakeRenderer {
    fn article_to_pdf(
        self: Box<Self>,
        _request: RenderRequest,
    ) -> BoxFuture<'static, Result<PdfResult, RenderError>> {
        Box::pin(async move {
            match self.outcome {
                FakeRenderOutcome::Succeed {
                    delay,
                    buffer,
                    last_modified,
                } => {
                    if delay > Duration::ZERO {
                        sleep(delay).await;
                    }
                    if self.aborted.load(Ordering::SeqCst) {
                        return Err(RenderError::ProcessingCancelled);
                    }
                    Ok(PdfResult::new(buffer, last_modified))
                },
                FakeRenderOutcome::Fail { delay, error } => {
                    if delay > Duration::ZERO {
                        sleep(delay).await;
                    }
                    Err(error)
                },
                FakeRenderOutcome::Hang => loop {
                    sleep(Duration::from_millis(50)).await;
                    if self.aborted.load(Ordering::SeqCst) {
                        return Err(RenderError::ProcessingCancelled);
                    }
                },
            }
        })
    }
}
