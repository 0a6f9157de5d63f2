//! chromiumoxide-backed [`Renderer`]: one headless Chromium subprocess per
//! job, the host allow-rule enforced on the main navigation and every
//! sub-resource, and the resulting page printed to PDF.

use crate::host_deny::is_host_allowed;
use chromiumoxide::Browser;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, ErrorReason, EventRequestPaused,
    FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{PrintToPdfParams, PrintToPdfParamsTransferMode};
use chromiumoxide::handler::viewport::Viewport;
use docrender_domain::{PdfResult, RenderError};
use docrender_ports::{BoxFuture, DeviceProfile, PageFormat, RenderRequest, Renderer, RendererFactory};
use futures::StreamExt;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

/// Hard ceiling on how long a graceful browser shutdown may take before the
/// subprocess is force-killed instead.
const CLOSE_TIMEOUT_MS: u64 = 3_000;

/// Header keys a caller is never allowed to override.
const RESERVED_HEADER_OVERRIDE_KEYS: [&str; 1] = ["host"];

const DESKTOP_VIEWPORT: (u32, u32) = (1366, 1024);
const MOBILE_VIEWPORT: (u32, u32) = (390, 844);

/// Standard mobile Safari-on-iOS user agent. There is no configuration knob
/// for this one: `renderer.userAgent` names only the desktop profile
/// ("User-agent string sent with the desktop device profile"), so the
/// mobile profile gets a fixed, representative value instead.
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/124.0.0.0 Mobile/15E148 Safari/604.1 docrender/1.0";

/// PDF print options applied to every render, mirroring
/// `docrender_config::PdfOptionsTemplate` field-for-field without this crate
/// depending on the config crate.
#[derive(Debug, Clone, Copy)]
pub struct PdfOptions {
    /// Print background graphics.
    pub print_background: bool,
    /// Honor the page's own `@page size` CSS over the requested format.
    pub prefer_css_page_size: bool,
    /// Page scale factor.
    pub scale: f64,
    /// Top margin, in inches.
    pub margin_top_in: f64,
    /// Bottom margin, in inches.
    pub margin_bottom_in: f64,
    /// Left margin, in inches.
    pub margin_left_in: f64,
    /// Right margin, in inches.
    pub margin_right_in: f64,
}

/// Plain-primitive construction parameters for chromiumoxide renderers.
///
/// Deliberately free of any `docrender-config` type: the config crate's
/// validated schema is translated into these primitives one layer up, so
/// this adapter has no compile-time dependency on the config crate.
#[derive(Debug, Clone)]
pub struct ChromiumRendererFactory {
    launch_args: Vec<String>,
    host_deny_regex: Regex,
    header_overrides: BTreeMap<String, String>,
    desktop_user_agent: String,
    pdf_options: PdfOptions,
}

impl ChromiumRendererFactory {
    /// Construct a factory from launch flags, the compiled host deny-rule,
    /// header overrides applied to every navigation, the configured desktop
    /// user agent, and PDF print options.
    #[must_use]
    pub const fn new(
        launch_args: Vec<String>,
        host_deny_regex: Regex,
        header_overrides: BTreeMap<String, String>,
        desktop_user_agent: String,
        pdf_options: PdfOptions,
    ) -> Self {
        Self {
            launch_args,
            host_deny_regex,
            header_overrides,
            desktop_user_agent,
            pdf_options,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        for arg in &self.launch_args {
            builder = builder.arg(arg.clone());
        }
        builder
            .build()
            .map_err(|error| RenderError::InternalFailure(format!("browser config: {error}")))
    }
}

impl RendererFactory for ChromiumRendererFactory {
    fn new_renderer(
        &self,
    ) -> (
        Box<dyn Renderer>,
        Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>,
    ) {
        let shared = Arc::new(SharedState::default());
        let renderer = ChromiumRenderer {
            shared: Arc::clone(&shared),
            factory: self.clone(),
        };

        let abort_shared = Arc::clone(&shared);
        let abort = move || -> BoxFuture<'static, ()> {
            let shared = Arc::clone(&abort_shared);
            Box::pin(async move {
                shared.aborted.store(true, Ordering::SeqCst);
                let taken = shared.browser.lock().await.take();
                if let Some(mut browser) = taken {
                    close_browser(&mut browser).await;
                }
            })
        };

        (Box::new(renderer), Box::new(abort))
    }
}

/// State shared between a renderer and its paired abort closure, so the
/// closure can tear down the subprocess whether or not it has launched yet.
#[derive(Default)]
struct SharedState {
    aborted: AtomicBool,
    browser: AsyncMutex<Option<Browser>>,
}

/// A single-use chromiumoxide-backed renderer. Constructed idle; consumed by
/// exactly one `article_to_pdf` call.
struct ChromiumRenderer {
    shared: Arc<SharedState>,
    factory: ChromiumRendererFactory,
}

impl Renderer for ChromiumRenderer {
    fn article_to_pdf(
        self: Box<Self>,
        request: RenderRequest,
    ) -> BoxFuture<'static, Result<PdfResult, RenderError>> {
        Box::pin(async move { self.render(request).await })
    }
}

impl ChromiumRenderer {
    async fn render(self: Box<Self>, request: RenderRequest) -> Result<PdfResult, RenderError> {
        let url = Url::parse(&request.url)
            .map_err(|error| RenderError::InternalFailure(format!("invalid url: {error}")))?;
        if !is_host_allowed(&url, &self.factory.host_deny_regex) {
            return Err(RenderError::ForbiddenHost);
        }

        let config = self.factory.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|error| RenderError::InternalFailure(format!("browser launch: {error}")))?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        if self.shared.aborted.load(Ordering::SeqCst) {
            let mut browser = browser;
            close_browser(&mut browser).await;
            handler_task.abort();
            return Err(RenderError::InternalFailure(
                "renderer aborted before launch".to_string(),
            ));
        }
        *self.shared.browser.lock().await = Some(browser);

        let result = self.run_page(&request, &url).await;

        let taken = self.shared.browser.lock().await.take();
        if let Some(mut browser) = taken {
            close_browser(&mut browser).await;
        }
        handler_task.abort();

        result
    }

    async fn run_page(&self, request: &RenderRequest, url: &Url) -> Result<PdfResult, RenderError> {
        let guard = self.shared.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| RenderError::InternalFailure("browser not available".to_string()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|error| RenderError::InternalFailure(format!("new page: {error}")))?;
        drop(guard);

        let (width, height) = viewport_px(request.device_profile);
        page.set_viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            ..Viewport::default()
        })
        .await
        .map_err(|error| RenderError::InternalFailure(format!("set viewport: {error}")))?;

        page.set_user_agent(self.user_agent_for(request.device_profile))
            .await
            .map_err(|error| RenderError::InternalFailure(format!("set user agent: {error}")))?;

        page.execute(SetScriptExecutionDisabledParams::new(true))
            .await
            .map_err(|error| RenderError::InternalFailure(format!("disable scripts: {error}")))?;

        page.execute(FetchEnableParams::default())
            .await
            .map_err(|error| {
                RenderError::InternalFailure(format!("enable fetch interception: {error}"))
            })?;

        let mut paused_requests = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|error| RenderError::InternalFailure(format!("fetch listener: {error}")))?;
        let deny_regex = self.factory.host_deny_regex.clone();
        let fetch_page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused_requests.next().await {
                let allowed = Url::parse(&event.request.url)
                    .map(|sub_url| is_host_allowed(&sub_url, &deny_regex))
                    .unwrap_or(false);
                let outcome = if allowed {
                    fetch_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(drop)
                } else {
                    fetch_page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::AccessDenied,
                        ))
                        .await
                        .map(drop)
                };
                if outcome.is_err() {
                    break;
                }
            }
        });

        let headers = merge_headers(&request.headers, &self.factory.header_overrides);
        if !headers.is_empty() {
            page.execute(SetExtraHttpHeadersParams::new(headers_to_cdp(&headers)))
                .await
                .map_err(|error| RenderError::InternalFailure(format!("set headers: {error}")))?;
        }

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|error| RenderError::InternalFailure(format!("response listener: {error}")))?;

        page.goto(url.as_str())
            .await
            .map_err(|error| RenderError::InternalFailure(format!("navigate: {error}")))?;

        let main_response = loop {
            match responses.next().await {
                Some(event) if event.response.url == url.as_str() => {
                    break Some(event.response.clone());
                },
                Some(_) => continue,
                None => break None,
            }
        };
        let response = main_response.ok_or(RenderError::MalformedRendererResponse)?;

        let status = u16::try_from(response.status).unwrap_or(0);
        if status >= 400 {
            return Err(RenderError::NavigationError {
                status,
                message: response.status_text.clone(),
            });
        }

        page.wait_for_navigation()
            .await
            .map_err(|error| RenderError::InternalFailure(format!("wait for navigation: {error}")))?;

        let pdf_params = pdf_params_for(request.page_format, self.factory.pdf_options);
        let buffer = page
            .pdf(pdf_params)
            .await
            .map_err(|error| RenderError::InternalFailure(format!("print to pdf: {error}")))?;

        let last_modified = find_header(&response.headers, "last-modified")
            .unwrap_or_else(|| httpdate::fmt_http_date(std::time::SystemTime::now()));

        Ok(PdfResult::new(buffer, last_modified))
    }

    fn user_agent_for(&self, profile: DeviceProfile) -> &str {
        match profile {
            DeviceProfile::Desktop => &self.factory.desktop_user_agent,
            DeviceProfile::Mobile => MOBILE_USER_AGENT,
        }
    }
}

/// Closes `browser` gracefully within [`CLOSE_TIMEOUT_MS`], force-killing
/// the subprocess if it does not exit in time. Signal errors are swallowed:
/// the caller only cares that no orphan process survives.
async fn close_browser(browser: &mut Browser) {
    let graceful = async {
        let _ = browser.close().await;
        let _ = browser.wait().await;
    };
    if tokio::time::timeout(Duration::from_millis(CLOSE_TIMEOUT_MS), graceful)
        .await
        .is_err()
    {
        let _ = browser.kill().await;
    }
}

const fn viewport_px(profile: DeviceProfile) -> (u32, u32) {
    match profile {
        DeviceProfile::Desktop => DESKTOP_VIEWPORT,
        DeviceProfile::Mobile => MOBILE_VIEWPORT,
    }
}

/// `overrides` wins over per-request headers; the `host` header can never be
/// overridden by either source.
fn merge_headers(
    request_headers: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = request_headers.clone();
    merged.retain(|key, _| !is_reserved_header(key));
    for (key, value) in overrides {
        if !is_reserved_header(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn is_reserved_header(key: &str) -> bool {
    RESERVED_HEADER_OVERRIDE_KEYS
        .iter()
        .any(|reserved| key.eq_ignore_ascii_case(reserved))
}

fn headers_to_cdp(
    headers: &BTreeMap<String, String>,
) -> chromiumoxide::cdp::browser_protocol::network::Headers {
    let object = headers
        .iter()
        .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
        .collect::<serde_json::Map<_, _>>();
    chromiumoxide::cdp::browser_protocol::network::Headers::new(serde_json::Value::Object(object))
}

fn find_header(
    headers: &Option<chromiumoxide::cdp::browser_protocol::network::Headers>,
    name: &str,
) -> Option<String> {
    let headers = headers.as_ref()?;
    let object = headers.inner.as_object()?;
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
        .map(ToString::to_string)
}

fn pdf_params_for(format: PageFormat, options: PdfOptions) -> PrintToPdfParams {
    let (width_in, height_in) = page_size_inches(format);
    PrintToPdfParams::builder()
        .paper_width(width_in)
        .paper_height(height_in)
        .print_background(options.print_background)
        .prefer_css_page_size(options.prefer_css_page_size)
        .scale(options.scale)
        .margin_top(options.margin_top_in)
        .margin_bottom(options.margin_bottom_in)
        .margin_left(options.margin_left_in)
        .margin_right(options.margin_right_in)
        .transfer_mode(PrintToPdfParamsTransferMode::ReturnAsBase64)
        .build()
}

const fn page_size_inches(format: PageFormat) -> (f64, f64) {
    match format {
        PageFormat::Letter => (8.5, 11.0),
        PageFormat::A4 => (8.27, 11.69),
        PageFormat::Legal => (8.5, 14.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pdf_options() -> PdfOptions {
        PdfOptions {
            print_background: true,
            prefer_css_page_size: false,
            scale: 1.0,
            margin_top_in: 0.4,
            margin_bottom_in: 0.4,
            margin_left_in: 0.4,
            margin_right_in: 0.4,
        }
    }

    fn test_factory() -> ChromiumRendererFactory {
        ChromiumRendererFactory::new(
            Vec::new(),
            Regex::new("^$").expect("regex"),
            BTreeMap::new(),
            "docrender-test/1.0".to_string(),
            test_pdf_options(),
        )
    }

    #[test]
    fn viewport_differs_by_device_profile() {
        assert_ne!(viewport_px(DeviceProfile::Desktop), viewport_px(DeviceProfile::Mobile));
    }

    #[test]
    fn user_agent_differs_by_device_profile_and_desktop_uses_configured_value() {
        let factory = test_factory();
        let renderer = ChromiumRenderer {
            shared: Arc::new(SharedState::default()),
            factory: factory.clone(),
        };

        assert_eq!(renderer.user_agent_for(DeviceProfile::Desktop), "docrender-test/1.0");
        assert_ne!(
            renderer.user_agent_for(DeviceProfile::Desktop),
            renderer.user_agent_for(DeviceProfile::Mobile)
        );
    }

    #[test]
    fn page_size_differs_by_format() {
        assert_ne!(page_size_inches(PageFormat::Letter), page_size_inches(PageFormat::A4));
        assert_ne!(page_size_inches(PageFormat::Letter), page_size_inches(PageFormat::Legal));
    }

    #[test]
    fn merge_headers_strips_host_from_both_sources() {
        let mut request_headers = BTreeMap::new();
        request_headers.insert("Host".to_string(), "attacker.example".to_string());
        request_headers.insert("Accept".to_string(), "text/html".to_string());

        let mut overrides = BTreeMap::new();
        overrides.insert("host".to_string(), "also-forbidden".to_string());
        overrides.insert("X-Docrender".to_string(), "1".to_string());

        let merged = merge_headers(&request_headers, &overrides);
        assert!(!merged.contains_key("Host"));
        assert!(!merged.contains_key("host"));
        assert_eq!(merged.get("Accept"), Some(&"text/html".to_string()));
        assert_eq!(merged.get("X-Docrender"), Some(&"1".to_string()));
    }

    #[test]
    fn merge_headers_lets_overrides_win_on_conflict() {
        let mut request_headers = BTreeMap::new();
        request_headers.insert("Accept-Language".to_string(), "en-US".to_string());

        let mut overrides = BTreeMap::new();
        overrides.insert("Accept-Language".to_string(), "fr-FR".to_string());

        let merged = merge_headers(&request_headers, &overrides);
        assert_eq!(merged.get("Accept-Language"), Some(&"fr-FR".to_string()));
    }
}
