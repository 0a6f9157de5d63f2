//! Renderer boundary contract: a per-job headless-browser handle.

use crate::BoxFuture;
use docrender_domain::{PdfResult, RenderError};
use std::collections::BTreeMap;

/// PDF page size, as offered by the HTTP surface's `format` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    /// US Letter.
    Letter,
    /// ISO A4.
    A4,
    /// US Legal.
    Legal,
}

/// Emulated device profile, as offered by the HTTP surface's `type` path
/// segment. Defaults to `Desktop` when the segment is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// Desktop viewport and user-agent.
    #[default]
    Desktop,
    /// Mobile viewport and user-agent.
    Mobile,
}

/// Per-job render request: the target URL, the desired output shape, and
/// any caller-supplied header overrides.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The article URL to navigate to.
    pub url: String,
    /// The desired PDF page format.
    pub page_format: PageFormat,
    /// The desired emulated device profile.
    pub device_profile: DeviceProfile,
    /// HTTP header overrides applied to the navigation request.
    pub headers: BTreeMap<String, String>,
}

/// A single-use, single-threaded handle to a headless-browser subprocess.
///
/// Constructed idle; `article_to_pdf` is called at most once per instance.
/// `abort` may be called from any state, any number of times, and must be
/// idempotent: once the renderer has set its internal aborted flag, a
/// still-pending `article_to_pdf` call is expected to fail, and that
/// failure is swallowed by the caller rather than surfaced.
pub trait Renderer: Send {
    /// Navigate to `request.url` and produce a PDF.
    ///
    /// Rejects immediately with `RenderError::ForbiddenHost` if the URL
    /// fails the configured host allow-rule. Otherwise launches a browser
    /// subprocess, opens a page under the requested device profile,
    /// disables in-page script execution, applies the same allow-rule to
    /// every sub-resource request, navigates awaiting network-idle, and
    /// generates the PDF once navigation completes successfully.
    fn article_to_pdf(self: Box<Self>, request: RenderRequest) -> BoxFuture<'static, Result<PdfResult, RenderError>>;
}

/// Constructs a fresh [`Renderer`] per job.
///
/// A factory rather than a shared instance: a Renderer owns at most one
/// live subprocess and is never reused across jobs.
pub trait RendererFactory: Send + Sync {
    /// Construct a new, idle renderer and a paired abort handle.
    ///
    /// The returned `Renderer` is consumed by exactly one
    /// `article_to_pdf` call; the returned abort closure may be invoked
    /// independently (and repeatedly) to force the renderer's subprocess
    /// closed, per the queue's cancellation and execution-timeout
    /// protocols.
    fn new_renderer(&self) -> (Box<dyn Renderer>, Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_profile_defaults_to_desktop() {
        assert_eq!(DeviceProfile::default(), DeviceProfile::Desktop);
    }
}
