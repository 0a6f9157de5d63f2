//! API v1 DTOs: the closed path-segment vocabulary and the error body shape
//! of the `GET /{domain}/v1/pdf/{title}/{format}[/{type}]` surface.

use docrender_ports::{DeviceProfile, PageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The `{format}` path segment, one of `letter`, `a4`, `legal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiV1PageFormatParam(pub PageFormat);

impl FromStr for ApiV1PageFormatParam {
    type Err = ApiV1PathParamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "letter" => Ok(Self(PageFormat::Letter)),
            "a4" => Ok(Self(PageFormat::A4)),
            "legal" => Ok(Self(PageFormat::Legal)),
            other => Err(ApiV1PathParamError::InvalidFormat(other.to_string())),
        }
    }
}

/// The optional `{type}` path segment, one of `mobile`, `desktop`. Absent
/// defaults to `desktop`, matching [`DeviceProfile::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiV1DeviceProfileParam(pub DeviceProfile);

impl FromStr for ApiV1DeviceProfileParam {
    type Err = ApiV1PathParamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "desktop" => Ok(Self(DeviceProfile::Desktop)),
            "mobile" => Ok(Self(DeviceProfile::Mobile)),
            other => Err(ApiV1PathParamError::InvalidDeviceProfile(other.to_string())),
        }
    }
}

/// A closed path segment did not match its allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiV1PathParamError {
    /// `{format}` was not one of `letter`, `a4`, `legal`.
    InvalidFormat(String),
    /// `{type}` was not one of `mobile`, `desktop`.
    InvalidDeviceProfile(String),
}

impl fmt::Display for ApiV1PathParamError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(value) => {
                write!(formatter, "unsupported format '{value}', expected letter, a4, or legal")
            },
            Self::InvalidDeviceProfile(value) => {
                write!(formatter, "unsupported type '{value}', expected desktop or mobile")
            },
        }
    }
}

impl std::error::Error for ApiV1PathParamError {}

/// The JSON error body shape of §6: `{name, status, message, details}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiV1ErrorBody {
    /// Short machine-friendly error name, e.g. `"NotFound"`.
    pub name: String,
    /// HTTP status code, duplicated in the body per the external contract.
    pub status: u16,
    /// Human-readable summary.
    pub message: String,
    /// Longer, request-specific detail string.
    pub details: String,
}

/// A fully resolved error response: status line, optional `Retry-After`
/// seconds, and the JSON body to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiV1ErrorResponse {
    /// HTTP status code to send.
    pub status: u16,
    /// `Retry-After` header value in seconds, present for queue-pressure
    /// kinds only.
    pub retry_after_seconds: Option<u64>,
    /// The response body.
    pub body: ApiV1ErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_format_parses_the_closed_set() {
        assert_eq!(
            "letter".parse::<ApiV1PageFormatParam>().map(|value| value.0),
            Ok(PageFormat::Letter)
        );
        assert_eq!(
            "a4".parse::<ApiV1PageFormatParam>().map(|value| value.0),
            Ok(PageFormat::A4)
        );
        assert_eq!(
            "legal".parse::<ApiV1PageFormatParam>().map(|value| value.0),
            Ok(PageFormat::Legal)
        );
        assert!("tabloid".parse::<ApiV1PageFormatParam>().is_err());
    }

    #[test]
    fn device_profile_parses_the_closed_set() {
        assert_eq!(
            "mobile".parse::<ApiV1DeviceProfileParam>().map(|value| value.0),
            Ok(DeviceProfile::Mobile)
        );
        assert_eq!(
            "desktop".parse::<ApiV1DeviceProfileParam>().map(|value| value.0),
            Ok(DeviceProfile::Desktop)
        );
        assert!("tablet".parse::<ApiV1DeviceProfileParam>().is_err());
    }
}
