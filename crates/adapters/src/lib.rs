//! # docrender-adapters
//!
//! Adapter implementations for ports: a chromiumoxide-backed `Renderer`, a
//! deterministic fake renderer for tests, structured JSON logging and
//! telemetry, and the host allow-rule shared by both. This crate depends on
//! `ports`, `domain`, and `shared` only.

/// Deterministic `Renderer`/`RendererFactory` test double.
pub mod fake_renderer;
/// Host allow-rule: scheme/user-info/deny-regex checks.
pub mod host_deny;
/// Structured log line sink abstraction.
pub mod log_sink;
/// JSON logger adapter.
pub mod logger;
/// chromiumoxide-backed renderer adapter.
pub mod renderer_chromium;
/// JSON telemetry adapter.
pub mod telemetry;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
