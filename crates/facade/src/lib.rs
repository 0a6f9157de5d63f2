//! # docrender-facade
//!
//! The single aggregation point `bins/server` depends on: the composition
//! root, the render-article use case's input/output types, the validated
//! config type, and the HTTP-contract DTOs/mappers. This crate depends on
//! `infra`, `api`, `app`, `config`, `core`, `domain`, `ports`, and `shared`.

pub use docrender_app::RenderArticleInput;
pub use docrender_config::{
    LogFormat, RenderConfig, ValidatedRenderConfig, load_render_config_from_path,
    load_render_config_from_sources, load_render_config_std_env,
};
pub use docrender_core::{BuildInfo, build_info};
pub use docrender_domain::{PdfResult, RenderError};
pub use docrender_infra::{RenderService, TelemetryQueueObserver, build_render_service};
pub use docrender_ports::{DeviceProfile, LoggerPort, PageFormat, TelemetryPort};
pub use docrender_shared::{CorrelationId, ErrorEnvelope, RequestContext};

/// The `GET /{domain}/v1/pdf/{title}/{format}[/{type}]` wire contract: path
/// segment parsing, the error body shape, and `Content-Disposition` framing.
pub use docrender_api::v1;

/// Returns the facade crate version.
#[must_use]
pub const fn facade_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
