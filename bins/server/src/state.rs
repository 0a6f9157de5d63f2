//! Shared axum handler state.

use std::sync::Arc;

use docrender_facade::{LoggerPort, RenderService};
use tokio::sync::Notify;

/// State shared across every axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The wired render service (queue plus renderer factory).
    pub service: RenderService,
    /// Configured queue timeout, used to compute `Retry-After`.
    pub queue_timeout_ms: u64,
    /// Structured logger for request-lifecycle events the handlers emit directly.
    pub logger: Arc<dyn LoggerPort>,
    /// Fires once on shutdown; in-flight handlers race against it to cancel their job.
    pub shutdown: Arc<Notify>,
}
