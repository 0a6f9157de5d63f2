//! # docrender-infra
//!
//! Composition root: translates a validated [`docrender_config`] into the
//! concrete adapters from `docrender-adapters` and assembles a runnable
//! [`RenderService`]. This crate depends on `app`, `adapters`, `config`,
//! `domain`, `ports`, and `shared`.

/// Queue lifecycle events translated into logger/telemetry calls.
pub mod queue_observer;
/// Composition root: config + adapters -> `RenderService`.
pub mod render_service;

pub use queue_observer::TelemetryQueueObserver;
pub use render_service::{RenderService, build_render_service};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
