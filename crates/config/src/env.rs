//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing stays:
//! - strict (invalid values fail fast)
//! - deterministic (CSV lists normalize to sorted/deduped values)
//! - safe (unknown/garbage values are rejected rather than silently ignored)

use crate::schema::{LogFormat, RenderConfig, ValidatedRenderConfig};
use docrender_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;

/// Env var: queue concurrency.
pub const ENV_QUEUE_CONCURRENCY: &str = "DOCRENDER_QUEUE_CONCURRENCY";
/// Env var: queue residency timeout, in milliseconds.
pub const ENV_QUEUE_TIMEOUT_MS: &str = "DOCRENDER_QUEUE_TIMEOUT_MS";
/// Env var: queue residency timeout, in seconds (legacy; converted to ms).
pub const ENV_QUEUE_TIMEOUT_SECONDS: &str = "DOCRENDER_QUEUE_TIMEOUT_SECONDS";
/// Env var: execution timeout, in milliseconds.
pub const ENV_EXECUTION_TIMEOUT_MS: &str = "DOCRENDER_EXECUTION_TIMEOUT_MS";
/// Env var: execution timeout, in seconds (legacy; converted to ms).
pub const ENV_EXECUTION_TIMEOUT_SECONDS: &str = "DOCRENDER_EXECUTION_TIMEOUT_SECONDS";
/// Env var: max admitted task count.
pub const ENV_MAX_TASK_COUNT: &str = "DOCRENDER_MAX_TASK_COUNT";
/// Env var: renderer user-agent.
pub const ENV_USER_AGENT: &str = "DOCRENDER_USER_AGENT";
/// Env var: browser launch flags, comma-separated (full replacement).
pub const ENV_LAUNCH_FLAGS: &str = "DOCRENDER_LAUNCH_FLAGS";
/// Env var: host deny-list regex.
pub const ENV_HOST_DENY_REGEX: &str = "DOCRENDER_HOST_DENY_REGEX";
/// Env var: per-job header overrides, comma-separated `key=value` pairs
/// (full replacement).
pub const ENV_HEADER_OVERRIDES: &str = "DOCRENDER_HEADER_OVERRIDES";
/// Env var: HTTP bind address.
pub const ENV_BIND: &str = "DOCRENDER_BIND";
/// Env var: structured-log output format.
pub const ENV_LOG_FORMAT: &str = "DOCRENDER_LOG_FORMAT";

const MAX_CSV_ITEMS: usize = 1_000;

/// Typed env-derived overrides for [`RenderConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderEnv {
    /// Override for `queue.concurrency`.
    pub queue_concurrency: Option<u32>,
    /// Override for `queue.queueTimeoutMs`.
    pub queue_timeout_ms: Option<u64>,
    /// Override for `queue.executionTimeoutMs`.
    pub execution_timeout_ms: Option<u64>,
    /// Override for `queue.maxTaskCount`.
    pub max_task_count: Option<u32>,
    /// Override for `renderer.userAgent`.
    pub user_agent: Option<Box<str>>,
    /// Override for `renderer.launchFlags` (full replacement).
    pub launch_flags: Option<Vec<Box<str>>>,
    /// Override for `renderer.hostDenyRegex`.
    pub host_deny_regex: Option<Box<str>>,
    /// Override for `renderer.headerOverrides` (full replacement).
    pub header_overrides: Option<BTreeMap<Box<str>, Box<str>>>,
    /// Override for `server.bind`.
    pub bind: Option<Box<str>>,
    /// Override for `server.logFormat`.
    pub log_format: Option<LogFormat>,
}

impl RenderEnv {
    /// Build from an arbitrary string map (used by tests and by
    /// [`Self::from_std_env`]).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            queue_concurrency: parse_optional_u32(map, ENV_QUEUE_CONCURRENCY)?,
            queue_timeout_ms: parse_timeout_ms_with_legacy_seconds(
                map,
                ENV_QUEUE_TIMEOUT_MS,
                ENV_QUEUE_TIMEOUT_SECONDS,
            )?,
            execution_timeout_ms: parse_timeout_ms_with_legacy_seconds(
                map,
                ENV_EXECUTION_TIMEOUT_MS,
                ENV_EXECUTION_TIMEOUT_SECONDS,
            )?,
            max_task_count: parse_optional_u32(map, ENV_MAX_TASK_COUNT)?,
            user_agent: parse_optional_trimmed_string(map, ENV_USER_AGENT)?,
            launch_flags: parse_optional_csv(map, ENV_LAUNCH_FLAGS)?,
            host_deny_regex: parse_optional_trimmed_string(map, ENV_HOST_DENY_REGEX)?,
            header_overrides: parse_optional_csv_pairs(map, ENV_HEADER_OVERRIDES)?,
            bind: parse_optional_trimmed_string(map, ENV_BIND)?,
            log_format: parse_optional_log_format(map, ENV_LOG_FORMAT)?,
        })
    }

    /// Build from `std::env::vars()`.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in [
            ENV_QUEUE_CONCURRENCY,
            ENV_QUEUE_TIMEOUT_MS,
            ENV_QUEUE_TIMEOUT_SECONDS,
            ENV_EXECUTION_TIMEOUT_MS,
            ENV_EXECUTION_TIMEOUT_SECONDS,
            ENV_MAX_TASK_COUNT,
            ENV_USER_AGENT,
            ENV_LAUNCH_FLAGS,
            ENV_HOST_DENY_REGEX,
            ENV_HEADER_OVERRIDES,
            ENV_BIND,
            ENV_LOG_FORMAT,
        ] {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_string(), value);
            }
        }
        Self::from_map(&map)
    }
}

/// Apply env overrides atop `base`, then validate and normalize.
///
/// Env is the highest-precedence source: it is applied last and is the step
/// that also runs `validate_and_normalize`.
pub fn apply_env_overrides(
    base: RenderConfig,
    env: &RenderEnv,
) -> Result<ValidatedRenderConfig, ErrorEnvelope> {
    let mut config = base;
    let mapper = EnvConfigMapper::new(&mut config);
    EnvConfigMapper::set_u32(&mut mapper.config.queue.concurrency, env.queue_concurrency);
    EnvConfigMapper::set_u64(
        &mut mapper.config.queue.queue_timeout_ms,
        env.queue_timeout_ms,
    );
    EnvConfigMapper::set_u64(
        &mut mapper.config.queue.execution_timeout_ms,
        env.execution_timeout_ms,
    );
    EnvConfigMapper::set_u32(&mut mapper.config.queue.max_task_count, env.max_task_count);
    EnvConfigMapper::set_opt_box_str(&mut mapper.config.renderer.user_agent, env.user_agent.as_deref());
    if let Some(flags) = &env.launch_flags {
        mapper.config.renderer.launch_flags.clone_from(flags);
    }
    EnvConfigMapper::set_opt_box_str(
        &mut mapper.config.renderer.host_deny_regex,
        env.host_deny_regex.as_deref(),
    );
    if let Some(overrides) = &env.header_overrides {
        mapper.config.renderer.header_overrides.clone_from(overrides);
    }
    EnvConfigMapper::set_opt_box_str(&mut mapper.config.server.bind, env.bind.as_deref());
    if let Some(log_format) = env.log_format {
        mapper.config.server.log_format = log_format;
    }

    config.validate_and_normalize().map_err(Into::into)
}

struct EnvConfigMapper<'a> {
    config: &'a mut RenderConfig,
}

impl<'a> EnvConfigMapper<'a> {
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

    fn set_opt_box_str(field: &mut Box<str>, value: Option<&str>) {
        if let Some(value) = value {
            *field = value.to_owned().into_boxed_str();
        }
    }
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// CSV list exceeds a safety limit.
    CsvTooLarge {
        /// Env var name.
        var: &'static str,
        /// Number of parsed items.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// A CSV `key=value` pair was missing the `=` separator.
    InvalidCsvPair {
        /// Env var name.
        var: &'static str,
        /// Offending entry.
        entry: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
            Self::CsvTooLarge { .. } | Self::InvalidCsvPair { .. } => {
                ErrorCode::new("config", "invalid_env_csv")
            },
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
            Self::CsvTooLarge { var, len, max } => {
                write!(formatter, "{var} is too large ({len} items, max {max})")
            },
            Self::InvalidCsvPair { var, entry } => {
                write!(formatter, "{var} contains an entry missing '=': {entry}")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => {
                envelope = envelope.with_metadata("env_var", var);
            },
            EnvParseError::InvalidInt { var, value } | EnvParseError::InvalidEnum { var, value } => {
                envelope = envelope
                    .with_metadata("env_var", var)
                    .with_metadata("value", value);
            },
            EnvParseError::CsvTooLarge { var, len, max } => {
                envelope = envelope
                    .with_metadata("env_var", var)
                    .with_metadata("len", len.to_string())
                    .with_metadata("max", max.to_string());
            },
            EnvParseError::InvalidCsvPair { var, entry } => {
                envelope = envelope
                    .with_metadata("env_var", var)
                    .with_metadata("entry", entry);
            },
        }

        envelope
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

/// Prefers the millisecond-denominated var; falls back to the legacy
/// second-denominated var, converting at this boundary per the resolved
/// milliseconds-is-canonical decision.
fn parse_timeout_ms_with_legacy_seconds(
    map: &BTreeMap<String, String>,
    ms_var: &'static str,
    seconds_var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    if let Some(ms) = parse_optional_u64(map, ms_var)? {
        return Ok(Some(ms));
    }
    let seconds = parse_optional_u64(map, seconds_var)?;
    Ok(seconds.map(|seconds| seconds.saturating_mul(1_000)))
}

fn parse_optional_csv(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Vec<Box<str>>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let items = parse_csv(raw);
    if items.len() > MAX_CSV_ITEMS {
        return Err(EnvParseError::CsvTooLarge {
            var,
            len: items.len(),
            max: MAX_CSV_ITEMS,
        });
    }
    let mut normalized: Vec<Box<str>> = items.into_iter().map(String::into_boxed_str).collect();
    normalized.sort_unstable();
    normalized.dedup();
    Ok(Some(normalized))
}

fn parse_optional_csv_pairs(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<BTreeMap<Box<str>, Box<str>>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let items = parse_csv(raw);
    if items.len() > MAX_CSV_ITEMS {
        return Err(EnvParseError::CsvTooLarge {
            var,
            len: items.len(),
            max: MAX_CSV_ITEMS,
        });
    }
    let mut pairs = BTreeMap::new();
    for item in items {
        let Some((key, value)) = item.split_once('=') else {
            return Err(EnvParseError::InvalidCsvPair { var, entry: item });
        };
        pairs.insert(
            key.trim().to_owned().into_boxed_str(),
            value.trim().to_owned().into_boxed_str(),
        );
    }
    Ok(Some(pairs))
}

fn parse_optional_log_format(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<LogFormat>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(Some(LogFormat::Json)),
        "pretty" => Ok(Some(LogFormat::Pretty)),
        _ => Err(EnvParseError::InvalidEnum {
            var,
            value: raw.clone(),
        }),
    }
}

fn parse_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn int_parsing_with_missing_defaults_to_none() -> Result<(), Box<dyn Error>> {
        let map = BTreeMap::new();
        assert_eq!(parse_optional_u32(&map, "MISSING")?, None);
        assert_eq!(parse_optional_u64(&map, "MISSING")?, None);
        Ok(())
    }

    #[test]
    fn legacy_seconds_env_converts_to_milliseconds() -> Result<(), Box<dyn Error>> {
        let mut map = BTreeMap::new();
        map.insert(ENV_QUEUE_TIMEOUT_SECONDS.to_string(), "5".to_string());
        let env = RenderEnv::from_map(&map)?;
        assert_eq!(env.queue_timeout_ms, Some(5_000));
        Ok(())
    }

    #[test]
    fn millisecond_env_wins_over_legacy_seconds() -> Result<(), Box<dyn Error>> {
        let mut map = BTreeMap::new();
        map.insert(ENV_QUEUE_TIMEOUT_MS.to_string(), "250".to_string());
        map.insert(ENV_QUEUE_TIMEOUT_SECONDS.to_string(), "5".to_string());
        let env = RenderEnv::from_map(&map)?;
        assert_eq!(env.queue_timeout_ms, Some(250));
        Ok(())
    }

    #[test]
    fn header_overrides_csv_parses_key_value_pairs() -> Result<(), Box<dyn Error>> {
        let mut map = BTreeMap::new();
        map.insert(
            ENV_HEADER_OVERRIDES.to_string(),
            "X-One=a, X-Two=b".to_string(),
        );
        let env = RenderEnv::from_map(&map)?;
        let overrides = env
            .header_overrides
            .ok_or_else(|| std::io::Error::other("missing overrides"))?;
        assert_eq!(overrides.get("X-One").map(AsRef::as_ref), Some("a"));
        assert_eq!(overrides.get("X-Two").map(AsRef::as_ref), Some("b"));
        Ok(())
    }

    #[test]
    fn header_overrides_csv_rejects_missing_equals() {
        let mut map = BTreeMap::new();
        map.insert(ENV_HEADER_OVERRIDES.to_string(), "X-One".to_string());
        let error = RenderEnv::from_map(&map).err();
        assert!(matches!(error, Some(EnvParseError::InvalidCsvPair { .. })));
    }

    #[test]
    fn invalid_log_format_is_rejected() {
        let mut map = BTreeMap::new();
        map.insert(ENV_LOG_FORMAT.to_string(), "xml".to_string());
        let error = RenderEnv::from_map(&map).err();
        assert!(matches!(error, Some(EnvParseError::InvalidEnum { .. })));
    }

    #[test]
    fn apply_env_overrides_rejects_invalid_result() {
        let mut map = BTreeMap::new();
        map.insert(ENV_MAX_TASK_COUNT.to_string(), "0".to_string());
        let env = RenderEnv::from_map(&map).expect("valid env map");
        let result = apply_env_overrides(RenderConfig::default(), &env);
        assert!(result.is_err());
    }
}
