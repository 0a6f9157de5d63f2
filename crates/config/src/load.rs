//! Config loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::{
    LogFormat, PdfOptionsTemplate, RenderConfig, RenderEnv, ValidatedRenderConfig,
    apply_env_overrides,
};
use docrender_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the render config from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`RenderEnv`)
/// - overrides JSON (partial config)
/// - config JSON (file content)
/// - defaults (`RenderConfig::default()`)
pub fn load_render_config_from_sources(
    config_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &RenderEnv,
) -> Result<ValidatedRenderConfig, ErrorEnvelope> {
    let mut config = match config_json {
        None => RenderConfig::default(),
        Some(input) => parse_config_unvalidated(input, ConfigFormat::Json)?,
    };

    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, &overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the render config from an optional file path.
pub fn load_render_config_from_path(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &RenderEnv,
) -> Result<ValidatedRenderConfig, ErrorEnvelope> {
    let mut config = match config_path {
        None => RenderConfig::default(),
        Some(path) => {
            let config_text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };

    if let Some(input) = overrides_json {
        let overrides = parse_overrides_json(input)?;
        apply_overrides(&mut config, &overrides);
    }

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the render config from std env and an optional file path.
pub fn load_render_config_std_env(
    config_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedRenderConfig, ErrorEnvelope> {
    let env = RenderEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_render_config_from_path(config_path, overrides_json, &env)
}

/// Serialize the config as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json(config: &RenderConfig) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("core", "internal"),
            format!("failed to serialize config: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize the config as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml(config: &RenderConfig) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(config).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize config TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<RenderConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<RenderConfigOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RenderConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(default)]
    queue: QueueConfigOverrides,
    #[serde(default)]
    renderer: RendererConfigOverrides,
    #[serde(default)]
    server: ServerConfigOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct QueueConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_task_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RendererConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    launch_flags: Option<Vec<Box<str>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_options: Option<PdfOptionsTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_deny_regex: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    header_overrides: Option<BTreeMap<Box<str>, Box<str>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ServerConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    bind: Option<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_format: Option<LogFormat>,
}

fn apply_overrides(config: &mut RenderConfig, overrides: &RenderConfigOverrides) {
    if let Some(version) = overrides.version {
        config.version = version;
    }

    apply_queue_overrides(config, &overrides.queue);
    apply_renderer_overrides(config, &overrides.renderer);
    apply_server_overrides(config, &overrides.server);
}

const fn apply_queue_overrides(config: &mut RenderConfig, overrides: &QueueConfigOverrides) {
    let mapper = OverrideMapper::new(config);
    OverrideMapper::set_u32(&mut mapper.config.queue.concurrency, overrides.concurrency);
    OverrideMapper::set_u64(
        &mut mapper.config.queue.queue_timeout_ms,
        overrides.queue_timeout_ms,
    );
    OverrideMapper::set_u64(
        &mut mapper.config.queue.execution_timeout_ms,
        overrides.execution_timeout_ms,
    );
    OverrideMapper::set_u32(
        &mut mapper.config.queue.max_task_count,
        overrides.max_task_count,
    );
}

fn apply_renderer_overrides(config: &mut RenderConfig, overrides: &RendererConfigOverrides) {
    let mapper = OverrideMapper::new(config);
    OverrideMapper::set_box_str(&mut mapper.config.renderer.user_agent, overrides.user_agent.as_deref());
    if let Some(flags) = &overrides.launch_flags {
        mapper.config.renderer.launch_flags.clone_from(flags);
    }
    if let Some(pdf_options) = overrides.pdf_options {
        mapper.config.renderer.pdf_options = pdf_options;
    }
    OverrideMapper::set_box_str(
        &mut mapper.config.renderer.host_deny_regex,
        overrides.host_deny_regex.as_deref(),
    );
    if let Some(header_overrides) = &overrides.header_overrides {
        mapper
            .config
            .renderer
            .header_overrides
            .clone_from(header_overrides);
    }
}

fn apply_server_overrides(config: &mut RenderConfig, overrides: &ServerConfigOverrides) {
    let mapper = OverrideMapper::new(config);
    OverrideMapper::set_box_str(&mut mapper.config.server.bind, overrides.bind.as_deref());
    if let Some(log_format) = overrides.log_format {
        mapper.config.server.log_format = log_format;
    }
}

struct OverrideMapper<'a> {
    config: &'a mut RenderConfig,
}

impl<'a> OverrideMapper<'a> {
    const fn new(config: &'a mut RenderConfig) -> Self {
        Self { config }
    }

    const fn set_u32(field: &mut u32, value: Option<u32>) {
        if let Some(value) = value {
            *field = value;
        }
    }

    const fn set_u64(field: &mut u64, value: Option<u64>) {
        if let Some(value) = value {
            *field = value;
        }
    }

    fn set_box_str(field: &mut Box<str>, value: Option<&str>) {
        if let Some(value) = value {
            *field = value.to_owned().into_boxed_str();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderEnv;
    use std::error::Error;

    #[test]
    fn defaults_apply_when_no_sources_given() -> Result<(), Box<dyn Error>> {
        let env = RenderEnv::default();
        let config = load_render_config_from_sources(None, None, &env)?;
        assert_eq!(config.queue.concurrency, 4);
        Ok(())
    }

    #[test]
    fn overrides_json_wins_over_config_json() -> Result<(), Box<dyn Error>> {
        let config_json = serde_json::json!({ "queue": { "concurrency": 2 } }).to_string();
        let overrides_json = serde_json::json!({ "queue": { "concurrency": 9 } }).to_string();
        let env = RenderEnv::default();

        let config = load_render_config_from_sources(
            Some(&config_json),
            Some(&overrides_json),
            &env,
        )?;
        assert_eq!(config.queue.concurrency, 9);
        Ok(())
    }

    #[test]
    fn env_wins_over_overrides_json_and_config_json() -> Result<(), Box<dyn Error>> {
        let config_json = serde_json::json!({ "queue": { "concurrency": 2 } }).to_string();
        let overrides_json = serde_json::json!({ "queue": { "concurrency": 9 } }).to_string();
        let mut env = RenderEnv::default();
        env.queue_concurrency = Some(16);

        let config = load_render_config_from_sources(
            Some(&config_json),
            Some(&overrides_json),
            &env,
        )?;
        assert_eq!(config.queue.concurrency, 16);
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = detect_config_format(Path::new("config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_reports_not_found_code() {
        let result = load_render_config_from_path(
            Some(Path::new("/nonexistent/docrender.json")),
            None,
            &RenderEnv::default(),
        );
        let error = result.err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("config", "config_file_not_found"))
        );
    }

    #[test]
    fn pretty_json_round_trips() -> Result<(), Box<dyn Error>> {
        let config = RenderConfig::default();
        let text = to_pretty_json(&config)?;
        let parsed: RenderConfig = serde_json::from_str(&text)?;
        assert_eq!(parsed, config);
        Ok(())
    }
}
