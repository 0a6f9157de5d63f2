//! Render-article use case: the request glue between an inbound HTTP
//! request and the render queue.
//!
//! Builds a [`RenderRequest`] via [`crate::url_template`], wraps a
//! freshly-built [`Renderer`] in a [`QueueItem`], submits it, and maps the
//! settlement back to the caller. If the caller's future is dropped before
//! settlement (client disconnect), a scope guard cancels the job so the
//! queue and the renderer tear down rather than running to completion for
//! nobody.

use docrender_domain::{PdfResult, ProcessFn, Queue, QueueItem, QueueObserver, RenderError};
use docrender_ports::{
    DeviceProfile, LoggerPort, PageFormat, RenderRequest, Renderer, RendererFactory, TelemetryPort,
    TelemetryTimer,
};
use docrender_shared::{CorrelationId, RequestContext};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::url_template::build_article_request;

/// Input payload for rendering one article.
#[derive(Debug, Clone)]
pub struct RenderArticleInput {
    /// Wiki host, e.g. `en.wikipedia.org`.
    pub domain: String,
    /// Article title, already percent-decoded.
    pub title: String,
    /// Desired PDF page format.
    pub format: PageFormat,
    /// Desired emulated device profile.
    pub device_profile: DeviceProfile,
}

/// Dependencies required by the render-article use case.
pub struct RenderArticleDeps<O: QueueObserver + 'static> {
    /// The bounded render queue.
    pub queue: Queue<O>,
    /// Builds a fresh Renderer (and its paired abort handle) per job.
    pub renderer_factory: Arc<dyn RendererFactory>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Optional telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl<O: QueueObserver + 'static> Clone for RenderArticleDeps<O> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            renderer_factory: Arc::clone(&self.renderer_factory),
            logger: self.logger.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

/// Render one article, returning its PDF bytes or the taxonomy error that
/// prevented it.
pub async fn render_article<O>(
    ctx: &RequestContext,
    deps: &RenderArticleDeps<O>,
    input: RenderArticleInput,
) -> Result<PdfResult, RenderError>
where
    O: QueueObserver + 'static,
{
    let started_at = Instant::now();
    let total_timer = deps
        .telemetry
        .as_ref()
        .map(|telemetry| telemetry.start_timer("render.article.total", None));

    if let Some(logger) = deps.logger.as_ref() {
        logger.info("render.article.start", "Render started", Some(log_fields_start(&input)));
    }

    if ctx.is_cancelled() {
        return settle_cancelled(deps, started_at, &input, total_timer);
    }

    let job_id = CorrelationId::new_job_id();
    let article = build_article_request(&input.domain, &input.title, input.device_profile);
    let request = RenderRequest {
        url: article.url,
        page_format: input.format,
        device_profile: input.device_profile,
        headers: article.headers,
    };

    let (renderer, abort) = deps.renderer_factory.new_renderer();
    let process: ProcessFn = Box::new(move || renderer.article_to_pdf(request));
    let cancel = move || abort();
    let item = QueueItem::new(job_id.clone(), process, cancel);

    let guard = CancelOnDrop {
        queue: Some(deps.queue.clone()),
        job_id: job_id.as_str().to_string(),
    };

    let result = deps.queue.submit(item).await;
    guard.disarm();

    if let Some(timer) = total_timer.as_ref() {
        timer.stop();
    }

    match &result {
        Ok(_) => {
            if let Some(logger) = deps.logger.as_ref() {
                logger.info(
                    "render.article.completed",
                    "Render completed",
                    Some(log_fields_completed(&input, started_at)),
                );
            }
        },
        Err(error) if error.is_cancelled() => {
            if let Some(telemetry) = deps.telemetry.as_ref() {
                telemetry.increment_counter("render.article.aborted", 1, None);
            }
            if let Some(logger) = deps.logger.as_ref() {
                logger.info(
                    "render.article.aborted",
                    "Render aborted",
                    Some(log_fields_abort(duration_ms(started_at))),
                );
            }
        },
        Err(error) => {
            if let Some(telemetry) = deps.telemetry.as_ref() {
                telemetry.increment_counter("render.article.failed", 1, None);
            }
            if let Some(logger) = deps.logger.as_ref() {
                logger.error(
                    "render.article.failed",
                    "Render failed",
                    Some(log_fields_error(&input, duration_ms(started_at), error)),
                );
            }
        },
    }

    result
}

/// Scope guard that cancels the submitted job if dropped before settling —
/// the mechanism behind "the glue cancels the future" on client disconnect:
/// when the HTTP layer's handler future is dropped mid-flight, this guard's
/// `Drop` fires and spawns the queue cancellation.
struct CancelOnDrop<O: QueueObserver + 'static> {
    queue: Option<Queue<O>>,
    job_id: String,
}

impl<O: QueueObserver + 'static> CancelOnDrop<O> {
    fn disarm(mut self) {
        self.queue = None;
    }
}

impl<O: QueueObserver + 'static> Drop for CancelOnDrop<O> {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            let job_id = self.job_id.clone();
            tokio::spawn(async move {
                queue.cancel(&job_id).await;
            });
        }
    }
}

fn settle_cancelled<O: QueueObserver + 'static>(
    deps: &RenderArticleDeps<O>,
    started_at: Instant,
    input: &RenderArticleInput,
    total_timer: Option<Box<dyn TelemetryTimer>>,
) -> Result<PdfResult, RenderError> {
    if let Some(timer) = total_timer.as_ref() {
        timer.stop();
    }
    if let Some(telemetry) = deps.telemetry.as_ref() {
        telemetry.increment_counter("render.article.aborted", 1, None);
    }
    if let Some(logger) = deps.logger.as_ref() {
        logger.info(
            "render.article.aborted",
            "Render aborted before submission",
            Some(log_fields_abort(duration_ms(started_at))),
        );
    }
    let _ = input;
    Err(RenderError::ProcessingCancelled)
}

fn duration_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn log_fields_start(input: &RenderArticleInput) -> BTreeMap<Box<str>, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("domain".to_owned().into_boxed_str(), Value::String(input.domain.clone()));
    fields.insert("title".to_owned().into_boxed_str(), Value::String(input.title.clone()));
    fields
}

fn log_fields_completed(input: &RenderArticleInput, started_at: Instant) -> BTreeMap<Box<str>, Value> {
    let mut fields = log_fields_start(input);
    fields.insert("durationMs".to_owned().into_boxed_str(), Value::from(duration_ms(started_at)));
    fields
}

fn log_fields_abort(duration_ms: u64) -> BTreeMap<Box<str>, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("durationMs".to_owned().into_boxed_str(), Value::from(duration_ms));
    fields
}

fn log_fields_error(input: &RenderArticleInput, duration_ms: u64, error: &RenderError) -> BTreeMap<Box<str>, Value> {
    let mut fields = log_fields_start(input);
    fields.insert("durationMs".to_owned().into_boxed_str(), Value::from(duration_ms));
    fields.insert("error".to_owned().into_boxed_str(), Value::String(error.to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrender_adapters::fake_renderer::{FakeRenderOutcome, FakeRendererFactory};
    use docrender_domain::{NoopObserver, QueueConfig};

    fn test_queue() -> Queue<NoopObserver> {
        Queue::new(
            QueueConfig {
                concurrency: 2,
                queue_timeout_ms: 5_000,
                execution_timeout_ms: 5_000,
                max_task_count: 4,
            },
            NoopObserver,
        )
        .expect("valid queue config")
    }

    fn deps() -> RenderArticleDeps<NoopObserver> {
        RenderArticleDeps {
            queue: test_queue(),
            renderer_factory: Arc::new(FakeRendererFactory::new(
                FakeRenderOutcome::immediate_success(),
            )),
            logger: None,
            telemetry: None,
        }
    }

    fn input() -> RenderArticleInput {
        RenderArticleInput {
            domain: "en.wikipedia.org".to_string(),
            title: "Rust".to_string(),
            format: PageFormat::Letter,
            device_profile: DeviceProfile::Desktop,
        }
    }

    #[tokio::test]
    async fn render_article_resolves_with_pdf_bytes() {
        let ctx = RequestContext::new_request();
        let deps = deps();

        let result = render_article(&ctx, &deps, input()).await;
        let pdf = result.expect("render should succeed");
        assert_eq!(pdf.buffer, b"%PDF-1.4 fake".to_vec());
    }

    #[tokio::test]
    async fn render_article_rejects_immediately_when_context_already_cancelled() {
        let ctx = RequestContext::new_request();
        ctx.cancel();
        let deps = deps();

        let result = render_article(&ctx, &deps, input()).await;
        assert_eq!(result, Err(RenderError::ProcessingCancelled));
    }
}
