//! Render-service configuration schema, defaults, validation, and normalization.
//!
//! Deserialization uses `serde` (JSON or TOML). Validation is manual and
//! returns typed errors mapped to `ErrorEnvelope`, matching how every other
//! boundary error in this codebase is reported.

use docrender_domain::QueueConfig;
use docrender_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const QUEUE_CONCURRENCY_MIN: u32 = 0;
const QUEUE_CONCURRENCY_MAX: u32 = 1_024;
const QUEUE_TIMEOUT_MIN_MS: u64 = 1;
const QUEUE_TIMEOUT_MAX_MS: u64 = 3_600_000;
const EXECUTION_TIMEOUT_MIN_MS: u64 = 1;
const EXECUTION_TIMEOUT_MAX_MS: u64 = 3_600_000;
const MAX_TASK_COUNT_MIN: u32 = 1;
const MAX_TASK_COUNT_MAX: u32 = 1_000_000;

const PDF_SCALE_MIN: f64 = 0.1;
const PDF_SCALE_MAX: f64 = 2.0;
const PDF_MARGIN_MIN_IN: f64 = 0.0;
const PDF_MARGIN_MAX_IN: f64 = 5.0;

/// Host header is stripped and re-set by the renderer itself (§4.7); callers
/// may never override it through per-job header overrides.
const RESERVED_HEADER_OVERRIDE_KEYS: [&str; 1] = ["host"];

/// Top-level render-service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RenderConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Admission-control and timeout settings for the render queue.
    pub queue: QueueSettings,
    /// Headless-browser and PDF-generation settings.
    pub renderer: RendererSettings,
    /// HTTP front-door settings.
    pub server: ServerSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            queue: QueueSettings::default(),
            renderer: RendererSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl RenderConfig {
    /// Validate and normalize the config, producing the immutable,
    /// construction-ready [`ValidatedRenderConfig`].
    pub fn validate_and_normalize(mut self) -> Result<ValidatedRenderConfig, ConfigSchemaError> {
        self.validate_version()?;
        self.renderer.normalize();

        let limits = ConfigLimits::new(&self)?;
        let queue_config = QueueConfig {
            concurrency: self.queue.concurrency as usize,
            queue_timeout_ms: self.queue.queue_timeout_ms,
            execution_timeout_ms: self.queue.execution_timeout_ms,
            max_task_count: self.queue.max_task_count as usize,
        }
        .validate()
        .map_err(|error| ConfigSchemaError::InvalidQueueConfig {
            message: error.to_string(),
        })?;

        self.renderer.validate()?;
        // `url::Url::host_str` lowercases the host for http/https, and an
        // operator-supplied pattern may not; match case-insensitively so a
        // deny pattern like `METADATA\.internal` still catches it.
        let host_deny_regex = RegexBuilder::new(&self.renderer.host_deny_regex)
            .case_insensitive(true)
            .build()
            .map_err(|error| ConfigSchemaError::InvalidHostDenyRegex {
                pattern: self.renderer.host_deny_regex.to_string(),
                reason: error.to_string(),
            })?;

        self.server.validate()?;

        Ok(ValidatedRenderConfig {
            raw: self,
            limits,
            queue_config,
            host_deny_regex,
        })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }
}

/// Validated config wrapper carrying bounded numeric values, the already-built
/// [`QueueConfig`], and the compiled host deny-list regex. Construction of a
/// `Queue` or `Renderer` never re-validates; it only ever reads from here.
#[derive(Debug, Clone)]
pub struct ValidatedRenderConfig {
    raw: RenderConfig,
    limits: ConfigLimits,
    queue_config: QueueConfig,
    host_deny_regex: Regex,
}

impl ValidatedRenderConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &RenderConfig {
        &self.raw
    }

    /// The domain-level queue configuration, ready to hand to `Queue::new`.
    #[must_use]
    pub const fn queue_config(&self) -> QueueConfig {
        self.queue_config
    }

    /// The compiled host deny-list regex, ready to hand to the renderer factory.
    #[must_use]
    pub const fn host_deny_regex(&self) -> &Regex {
        &self.host_deny_regex
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> RenderConfig {
        self.raw
    }
}

impl AsRef<RenderConfig> for ValidatedRenderConfig {
    fn as_ref(&self) -> &RenderConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedRenderConfig {
    type Target = RenderConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLimits {
    /// Queue concurrency.
    pub queue_concurrency: BoundedU32<QUEUE_CONCURRENCY_MIN, QUEUE_CONCURRENCY_MAX>,
    /// Queue residency timeout (ms).
    pub queue_timeout_ms: BoundedU64<QUEUE_TIMEOUT_MIN_MS, QUEUE_TIMEOUT_MAX_MS>,
    /// Execution timeout (ms).
    pub execution_timeout_ms: BoundedU64<EXECUTION_TIMEOUT_MIN_MS, EXECUTION_TIMEOUT_MAX_MS>,
    /// Maximum admitted task count.
    pub max_task_count: BoundedU32<MAX_TASK_COUNT_MIN, MAX_TASK_COUNT_MAX>,
}

impl ConfigLimits {
    fn new(config: &RenderConfig) -> Result<Self, ConfigSchemaError> {
        Ok(Self {
            queue_concurrency: bounded_u32(
                "queue",
                "concurrency",
                config.queue.concurrency,
                QUEUE_CONCURRENCY_MIN,
                QUEUE_CONCURRENCY_MAX,
            )?,
            queue_timeout_ms: bounded_u64(
                "queue",
                "queueTimeoutMs",
                config.queue.queue_timeout_ms,
                QUEUE_TIMEOUT_MIN_MS,
                QUEUE_TIMEOUT_MAX_MS,
            )?,
            execution_timeout_ms: bounded_u64(
                "queue",
                "executionTimeoutMs",
                config.queue.execution_timeout_ms,
                EXECUTION_TIMEOUT_MIN_MS,
                EXECUTION_TIMEOUT_MAX_MS,
            )?,
            max_task_count: bounded_u32(
                "queue",
                "maxTaskCount",
                config.queue.max_task_count,
                MAX_TASK_COUNT_MIN,
                MAX_TASK_COUNT_MAX,
            )?,
        })
    }
}

/// Parse a render config from a JSON string, applying validation and normalization.
pub fn parse_render_config_json(input: &str) -> Result<ValidatedRenderConfig, ErrorEnvelope> {
    let config: RenderConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse a render config from a TOML string, applying validation and normalization.
pub fn parse_render_config_toml(input: &str) -> Result<ValidatedRenderConfig, ErrorEnvelope> {
    let config: RenderConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Admission-control and timeout settings for the render queue. Mirrors
/// [`QueueConfig`] field-for-field; kept as a separate, serde-friendly type
/// so the wire schema does not depend on the domain crate's internal shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct QueueSettings {
    /// Maximum number of renders permitted to run concurrently.
    pub concurrency: u32,
    /// How long an item may wait before being promoted, in milliseconds.
    pub queue_timeout_ms: u64,
    /// How long a render may run before being aborted, in milliseconds.
    pub execution_timeout_ms: u64,
    /// Maximum number of items (waiting + running) admitted at once.
    pub max_task_count: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_timeout_ms: 30_000,
            execution_timeout_ms: 60_000,
            max_task_count: 64,
        }
    }
}

/// PDF generation options, applied as a template to every render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PdfOptionsTemplate {
    /// Print background graphics (CSS backgrounds, box shadows).
    pub print_background: bool,
    /// Honor `@page size` from the page's own CSS over the requested format.
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

impl Default for PdfOptionsTemplate {
    fn default() -> Self {
        Self {
            print_background: true,
            prefer_css_page_size: false,
            scale: 1.0,
            margin_top_in: 0.4,
            margin_bottom_in: 0.4,
            margin_left_in: 0.4,
            margin_right_in: 0.4,
        }
    }
}

impl PdfOptionsTemplate {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        validate_float_range("renderer", "scale", self.scale, PDF_SCALE_MIN, PDF_SCALE_MAX)?;
        validate_float_range(
            "renderer",
            "marginTopIn",
            self.margin_top_in,
            PDF_MARGIN_MIN_IN,
            PDF_MARGIN_MAX_IN,
        )?;
        validate_float_range(
            "renderer",
            "marginBottomIn",
            self.margin_bottom_in,
            PDF_MARGIN_MIN_IN,
            PDF_MARGIN_MAX_IN,
        )?;
        validate_float_range(
            "renderer",
            "marginLeftIn",
            self.margin_left_in,
            PDF_MARGIN_MIN_IN,
            PDF_MARGIN_MAX_IN,
        )?;
        validate_float_range(
            "renderer",
            "marginRightIn",
            self.margin_right_in,
            PDF_MARGIN_MIN_IN,
            PDF_MARGIN_MAX_IN,
        )?;
        Ok(())
    }
}

/// Headless-browser and PDF-generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RendererSettings {
    /// User-agent string sent with the desktop device profile.
    pub user_agent: Box<str>,
    /// Extra flags passed to the browser subprocess launch command (each
    /// must start with `--`, Chromium's own flag convention).
    pub launch_flags: Vec<Box<str>>,
    /// PDF generation options applied to every render.
    pub pdf_options: PdfOptionsTemplate,
    /// Regex matched against the navigation host; a match makes the host
    /// ineligible, per the allow-rule of §4.7.
    pub host_deny_regex: Box<str>,
    /// HTTP header overrides applied to every navigation request, merged
    /// under any per-request overrides from the HTTP front door.
    #[serde(default)]
    pub header_overrides: BTreeMap<Box<str>, Box<str>>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            user_agent: "docrender/0.1 (+https://github.com/Luiz-Frias/docrender)".into(),
            launch_flags: vec!["--disable-gpu".into(), "--disable-dev-shm-usage".into()],
            pdf_options: PdfOptionsTemplate::default(),
            host_deny_regex: "^$".into(),
            header_overrides: BTreeMap::new(),
        }
    }
}

impl RendererSettings {
    fn normalize(&mut self) {
        let trimmed = self.user_agent.trim();
        if trimmed != self.user_agent.as_ref() {
            self.user_agent = trimmed.to_owned().into_boxed_str();
        }

        for flag in &mut self.launch_flags {
            let trimmed = flag.trim();
            if trimmed != flag.as_ref() {
                *flag = trimmed.to_owned().into_boxed_str();
            }
        }

        let trimmed = self.host_deny_regex.trim();
        if trimmed != self.host_deny_regex.as_ref() {
            self.host_deny_regex = trimmed.to_owned().into_boxed_str();
        }

        if !self.header_overrides.is_empty() {
            let mut normalized = BTreeMap::new();
            for (key, value) in std::mem::take(&mut self.header_overrides) {
                normalized.insert(
                    key.trim().to_ascii_lowercase().into_boxed_str(),
                    value.trim().to_owned().into_boxed_str(),
                );
            }
            self.header_overrides = normalized;
        }
    }

    fn validate(&self) -> Result<(), ConfigSchemaError> {
        if self.user_agent.is_empty() {
            return Err(ConfigSchemaError::EmptyValue {
                section: "renderer",
                field: "userAgent",
            });
        }

        for flag in &self.launch_flags {
            if !flag.starts_with("--") {
                return Err(ConfigSchemaError::InvalidLaunchFlag {
                    flag: flag.to_string(),
                });
            }
        }

        self.pdf_options.validate()?;

        if self.host_deny_regex.is_empty() {
            return Err(ConfigSchemaError::EmptyValue {
                section: "renderer",
                field: "hostDenyRegex",
            });
        }

        for key in self.header_overrides.keys() {
            if key.is_empty() {
                return Err(ConfigSchemaError::EmptyValue {
                    section: "renderer",
                    field: "headerOverrides",
                });
            }
            if RESERVED_HEADER_OVERRIDE_KEYS.contains(&key.as_ref()) {
                return Err(ConfigSchemaError::ReservedHeaderOverride {
                    key: key.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Supported structured-log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line (default, matches `JsonLogger`).
    #[default]
    Json,
    /// Human-readable single-line format, for local development.
    Pretty,
}

/// HTTP front-door settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServerSettings {
    /// Address the HTTP listener binds to, e.g. `0.0.0.0:8080`.
    pub bind: Box<str>,
    /// Structured-log output format.
    pub log_format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            log_format: LogFormat::Json,
        }
    }
}

impl ServerSettings {
    fn validate(&self) -> Result<(), ConfigSchemaError> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigSchemaError::InvalidBindAddress {
                value: self.bind.to_string(),
            })?;
        Ok(())
    }
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    section: &'static str,
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value: u64::from(value),
        min: u64::from(min),
        max: u64::from(max),
    })
}

fn bounded_u64<const MIN: u64, const MAX: u64>(
    section: &'static str,
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|_| ConfigSchemaError::LimitOutOfRange {
        section,
        field,
        value,
        min,
        max,
    })
}

fn validate_float_range(
    section: &'static str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigSchemaError> {
    if value < min || value > max {
        return Err(ConfigSchemaError::FloatOutOfRange {
            section,
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Validation failures for [`RenderConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Schema section (e.g. `queue`).
        section: &'static str,
        /// Field name (e.g. `maxTaskCount`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
    /// A floating-point value is out of bounds.
    FloatOutOfRange {
        /// Schema section (e.g. `renderer`).
        section: &'static str,
        /// Field name (e.g. `scale`).
        field: &'static str,
        /// Value provided.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },
    /// A required string field was empty after trimming.
    EmptyValue {
        /// Schema section.
        section: &'static str,
        /// Field name.
        field: &'static str,
    },
    /// A launch flag did not start with `--`.
    InvalidLaunchFlag {
        /// Offending flag.
        flag: String,
    },
    /// The host deny-list pattern does not compile as a regex.
    InvalidHostDenyRegex {
        /// Offending pattern.
        pattern: String,
        /// Reason the pattern failed to compile.
        reason: String,
    },
    /// `server.bind` is not a valid socket address.
    InvalidBindAddress {
        /// Offending value.
        value: String,
    },
    /// A per-job header override tried to set a reserved header.
    ReservedHeaderOverride {
        /// Offending header key.
        key: String,
    },
    /// The domain-level `QueueConfig::validate` rejected the queue settings.
    InvalidQueueConfig {
        /// Message from the underlying `ErrorEnvelope`.
        message: String,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "invalid_value"),
            Self::FloatOutOfRange { .. } => ErrorCode::new("config", "invalid_value"),
            Self::EmptyValue { .. } => ErrorCode::new("config", "invalid_value"),
            Self::InvalidLaunchFlag { .. } => ErrorCode::new("config", "invalid_value"),
            Self::InvalidHostDenyRegex { .. } => ErrorCode::new("config", "invalid_value"),
            Self::InvalidBindAddress { .. } => ErrorCode::new("config", "invalid_value"),
            Self::ReservedHeaderOverride { .. } => ErrorCode::new("config", "invalid_value"),
            Self::InvalidQueueConfig { .. } => ErrorCode::new("config", "invalid_value"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported config version: {found} (supported: {supported})"
            ),
            Self::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::FloatOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{section}.{field} must be within [{min}, {max}] (got {value})"
            ),
            Self::EmptyValue { section, field } => {
                write!(formatter, "{section}.{field} must be non-empty")
            },
            Self::InvalidLaunchFlag { flag } => {
                write!(formatter, "launch flag must start with '--': {flag}")
            },
            Self::InvalidHostDenyRegex { pattern, reason } => {
                write!(formatter, "invalid host deny regex '{pattern}': {reason}")
            },
            Self::InvalidBindAddress { value } => {
                write!(formatter, "server.bind is not a valid socket address: {value}")
            },
            Self::ReservedHeaderOverride { key } => {
                write!(formatter, "header override '{key}' is reserved")
            },
            Self::InvalidQueueConfig { message } => {
                write!(formatter, "invalid queue configuration: {message}")
            },
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::FloatOutOfRange {
                section,
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
            ConfigSchemaError::EmptyValue { section, field } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field);
            },
            ConfigSchemaError::InvalidLaunchFlag { flag } => {
                envelope = envelope.with_metadata("flag", flag);
            },
            ConfigSchemaError::InvalidHostDenyRegex { pattern, reason } => {
                envelope = envelope
                    .with_metadata("pattern", pattern)
                    .with_metadata("reason", reason);
            },
            ConfigSchemaError::InvalidBindAddress { value } => {
                envelope = envelope.with_metadata("value", value);
            },
            ConfigSchemaError::ReservedHeaderOverride { key } => {
                envelope = envelope.with_metadata("key", key);
            },
            ConfigSchemaError::InvalidQueueConfig { message } => {
                envelope = envelope.with_metadata("reason", message);
            },
        }

        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn defaults_are_applied() -> Result<(), Box<dyn Error>> {
        let config = parse_render_config_json("{}")?;

        assert_eq!(config.version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.queue, QueueSettings::default());
        assert_eq!(config.server, ServerSettings::default());

        Ok(())
    }

    #[test]
    fn invalid_max_task_count_returns_error_code() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "version": 1,
            "queue": { "maxTaskCount": 0 }
        });

        let result = parse_render_config_json(&payload.to_string());
        assert!(result.is_err());

        let error = result
            .err()
            .ok_or_else(|| std::io::Error::other("expected validation error"))?;
        assert_eq!(error.code, ErrorCode::new("config", "invalid_value"));
        assert_eq!(
            error.metadata.get("section").map(String::as_str),
            Some("queue")
        );
        assert_eq!(
            error.metadata.get("field").map(String::as_str),
            Some("maxTaskCount")
        );

        Ok(())
    }

    #[test]
    fn launch_flag_without_dashdash_is_rejected() {
        let payload = serde_json::json!({
            "renderer": { "launchFlags": ["disable-gpu"] }
        });

        let result = parse_render_config_json(&payload.to_string());
        assert!(result.is_err());
    }

    #[test]
    fn host_header_override_is_rejected() {
        let payload = serde_json::json!({
            "renderer": { "headerOverrides": { "Host": "evil.example" } }
        });

        let result = parse_render_config_json(&payload.to_string());
        assert!(result.is_err());
    }

    #[test]
    fn user_agent_is_trimmed() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "renderer": { "userAgent": "  docrender-test/1.0  " }
        });
        let config = parse_render_config_json(&payload.to_string())?;

        assert_eq!(config.renderer.user_agent.as_ref(), "docrender-test/1.0");
        Ok(())
    }

    #[test]
    fn queue_config_is_ready_for_construction() -> Result<(), Box<dyn Error>> {
        let config = parse_render_config_json("{}")?;
        let queue_config = config.queue_config();

        assert_eq!(queue_config.concurrency, 4);
        assert_eq!(queue_config.max_task_count, 64);
        Ok(())
    }

    #[test]
    fn invalid_bind_address_is_rejected() {
        let payload = serde_json::json!({ "server": { "bind": "not-an-address" } });
        let result = parse_render_config_json(&payload.to_string());
        assert!(result.is_err());
    }

    #[test]
    fn host_deny_regex_matches_regardless_of_case() -> Result<(), Box<dyn Error>> {
        let payload = serde_json::json!({
            "renderer": { "hostDenyRegex": r"^METADATA\.internal$" }
        });
        let config = parse_render_config_json(&payload.to_string())?;

        assert!(config.host_deny_regex().is_match("metadata.internal"));
        assert!(config.host_deny_regex().is_match("METADATA.internal"));
        assert!(!config.host_deny_regex().is_match("example.com"));
        Ok(())
    }
}
