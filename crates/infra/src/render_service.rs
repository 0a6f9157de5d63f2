//! Composition root: turns a [`ValidatedRenderConfig`] plus a logger and a
//! telemetry sink into a runnable [`RenderService`].
//!
//! Grounded on `crates/infra/src/embedding_factory.rs`'s `build_*_port`
//! shape in the teacher's original layout — a function that reads a
//! validated config, constructs the concrete adapter, and hands back a
//! ready-to-use object — generalized here to a single renderer instead of a
//! multi-provider selection, since SPEC_FULL names exactly one backend
//! (chromiumoxide).

use docrender_adapters::renderer_chromium::{ChromiumRendererFactory, PdfOptions};
use docrender_app::{RenderArticleDeps, RenderArticleInput, render_article};
use docrender_config::ValidatedRenderConfig;
use docrender_domain::{PdfResult, Queue, RenderError};
use docrender_ports::{LoggerPort, RendererFactory, TelemetryPort};
use docrender_shared::{ErrorEnvelope, RequestContext};
use std::sync::Arc;

use crate::queue_observer::TelemetryQueueObserver;

/// A fully wired render service: the bounded queue, the renderer factory,
/// and the logger/telemetry ports the request-glue use case reports
/// through.
#[derive(Clone)]
pub struct RenderService {
    deps: RenderArticleDeps<TelemetryQueueObserver>,
}

impl RenderService {
    /// Render one article end to end, delegating to
    /// [`docrender_app::render_article`].
    pub async fn render_article(
        &self,
        ctx: &RequestContext,
        input: RenderArticleInput,
    ) -> Result<PdfResult, RenderError> {
        render_article(ctx, &self.deps, input).await
    }

    /// Number of items currently waiting for a free queue slot.
    #[must_use]
    pub fn queue_waiting(&self) -> usize {
        self.deps.queue.count_waiting()
    }

    /// Number of items currently running.
    #[must_use]
    pub fn queue_running(&self) -> usize {
        self.deps.queue.count_running()
    }

    /// Build a service directly from its dependencies, bypassing
    /// [`build_render_service`]'s fixed choice of [`ChromiumRendererFactory`].
    ///
    /// For HTTP-layer integration tests that need a deterministic
    /// `RendererFactory` (e.g. `docrender_adapters::fake_renderer`) behind a
    /// real queue and real telemetry wiring.
    #[must_use]
    pub fn from_deps(deps: RenderArticleDeps<TelemetryQueueObserver>) -> Self {
        Self { deps }
    }
}

/// Build a [`RenderService`] from a validated config and the two observable
/// ports it reports through.
///
/// `Queue::new` only fails on an invalid [`QueueConfig`](docrender_domain::QueueConfig);
/// `ValidatedRenderConfig::queue_config` already validates one before handing
/// it back, so this realistically never returns `Err`, but the error is
/// propagated rather than unwrapped since nothing here can prove it.
pub fn build_render_service(
    config: &ValidatedRenderConfig,
    logger: Arc<dyn LoggerPort>,
    telemetry: Arc<dyn TelemetryPort>,
) -> Result<RenderService, ErrorEnvelope> {
    let observer = TelemetryQueueObserver::new(Arc::clone(&logger), Arc::clone(&telemetry));
    let queue = Queue::new(config.queue_config(), observer)?;

    let renderer_factory: Arc<dyn RendererFactory> = Arc::new(ChromiumRendererFactory::new(
        config
            .as_ref()
            .renderer
            .launch_flags
            .iter()
            .map(ToString::to_string)
            .collect(),
        config.host_deny_regex().clone(),
        config
            .as_ref()
            .renderer
            .header_overrides
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        config.as_ref().renderer.user_agent.to_string(),
        pdf_options_from_template(&config.as_ref().renderer.pdf_options),
    ));

    let deps = RenderArticleDeps {
        queue,
        renderer_factory,
        logger: Some(logger),
        telemetry: Some(telemetry),
    };

    Ok(RenderService { deps })
}

const fn pdf_options_from_template(
    template: &docrender_config::PdfOptionsTemplate,
) -> PdfOptions {
    PdfOptions {
        print_background: template.print_background,
        prefer_css_page_size: template.prefer_css_page_size,
        scale: template.scale,
        margin_top_in: template.margin_top_in,
        margin_bottom_in: template.margin_bottom_in,
        margin_left_in: template.margin_left_in,
        margin_right_in: template.margin_right_in,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrender_adapters::log_sink::StderrLogSink;
    use docrender_adapters::logger::JsonLogger;
    use docrender_adapters::telemetry::JsonTelemetry;
    use docrender_config::RenderConfig;

    #[test]
    fn build_render_service_wires_an_empty_queue() -> Result<(), ErrorEnvelope> {
        let config = RenderConfig::default()
            .validate_and_normalize()
            .map_err(ErrorEnvelope::from)?;
        let sink = Arc::new(StderrLogSink);
        let logger: Arc<dyn LoggerPort> = Arc::new(JsonLogger::new(sink.clone()));
        let telemetry: Arc<dyn TelemetryPort> = Arc::new(JsonTelemetry::new(sink));

        let service = build_render_service(&config, logger, telemetry)?;
        assert_eq!(service.queue_waiting(), 0);
        assert_eq!(service.queue_running(), 0);
        Ok(())
    }

    fn fake_service(
        outcome: docrender_adapters::fake_renderer::FakeRenderOutcome,
    ) -> RenderService {
        let sink = Arc::new(StderrLogSink);
        let logger: Arc<dyn LoggerPort> = Arc::new(JsonLogger::new(sink.clone()));
        let telemetry: Arc<dyn TelemetryPort> = Arc::new(JsonTelemetry::new(sink));
        let observer = TelemetryQueueObserver::new(Arc::clone(&logger), Arc::clone(&telemetry));

        let queue = Queue::new(
            docrender_domain::QueueConfig {
                concurrency: 1,
                queue_timeout_ms: 5_000,
                execution_timeout_ms: 5_000,
                max_task_count: 4,
            },
            observer,
        )
        .expect("valid queue config");

        let renderer_factory: Arc<dyn docrender_ports::RendererFactory> =
            Arc::new(docrender_adapters::fake_renderer::FakeRendererFactory::new(outcome));

        RenderService::from_deps(RenderArticleDeps {
            queue,
            renderer_factory,
            logger: Some(logger),
            telemetry: Some(telemetry),
        })
    }

    #[tokio::test]
    async fn render_article_end_to_end_against_a_fake_renderer() -> Result<(), ErrorEnvelope> {
        use docrender_adapters::fake_renderer::FakeRenderOutcome;
        use docrender_ports::{DeviceProfile, PageFormat};

        let service = fake_service(FakeRenderOutcome::immediate_success());
        let ctx = RequestContext::new_request();
        let input = RenderArticleInput {
            domain: "en.wikipedia.org".to_string(),
            title: "Rust (programming language)".to_string(),
            format: PageFormat::Letter,
            device_profile: DeviceProfile::Desktop,
        };

        let pdf = service
            .render_article(&ctx, input)
            .await
            .expect("fake render should succeed");
        assert_eq!(pdf.buffer, b"%PDF-1.4 fake".to_vec());
        assert_eq!(service.queue_waiting(), 0);
        assert_eq!(service.queue_running(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn render_article_propagates_navigation_errors_from_the_renderer(
    ) -> Result<(), ErrorEnvelope> {
        use docrender_adapters::fake_renderer::FakeRenderOutcome;
        use docrender_ports::{DeviceProfile, PageFormat};
        use std::time::Duration;

        let service = fake_service(FakeRenderOutcome::Fail {
            delay: Duration::ZERO,
            error: RenderError::NavigationError {
                status: 404,
                message: "Not Found".to_string(),
            },
        });
        let ctx = RequestContext::new_request();
        let input = RenderArticleInput {
            domain: "en.wikipedia.org".to_string(),
            title: "Does Not Exist".to_string(),
            format: PageFormat::A4,
            device_profile: DeviceProfile::Mobile,
        };

        let result = service.render_article(&ctx, input).await;
        assert_eq!(
            result,
            Err(RenderError::NavigationError {
                status: 404,
                message: "Not Found".to_string(),
            })
        );
        Ok(())
    }
}
