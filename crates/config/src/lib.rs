//! # docrender-config
//!
//! Configuration schema, validation, and normalization for the render
//! service: queue admission limits, renderer/browser settings, and the
//! HTTP front door. This crate depends on `domain` and `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file + overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use schema::{
    CURRENT_CONFIG_VERSION, ConfigLimits, ConfigSchemaError, LogFormat, PdfOptionsTemplate,
    QueueSettings, RenderConfig, RendererSettings, ServerSettings, ValidatedRenderConfig,
    parse_render_config_json, parse_render_config_toml,
};

pub use env::{EnvParseError, RenderEnv, apply_env_overrides};
pub use load::{
    load_render_config_from_path, load_render_config_from_sources, load_render_config_std_env,
    to_pretty_json, to_pretty_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
