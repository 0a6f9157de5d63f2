//! The closed render-job error taxonomy.
//!
//! Every kind here is a distinct enum variant, matched exhaustively wherever
//! the queue or the HTTP front door decides a status code or a log record.
//! No kind is ever compared as an integer discriminant.

use docrender_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use thiserror::Error;

/// A render-job failure, distinguishable only by matching on the variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Admission refused because the queue was already at `maxTaskCount`.
    #[error("queue is full")]
    QueueFull,

    /// The item aged out while still waiting, before it was started.
    #[error("item timed out while waiting in queue")]
    QueueTimeout,

    /// The item exceeded `executionTimeoutMs` after it was started.
    #[error("render exceeded the execution timeout")]
    JobTimeout,

    /// The client (or an upstream caller) cancelled the job.
    #[error("render was cancelled")]
    ProcessingCancelled,

    /// The fetched page responded with an HTTP status of 400 or above.
    #[error("upstream page responded with {status}: {message}")]
    NavigationError {
        /// Upstream HTTP status code.
        status: u16,
        /// Upstream status text or short message.
        message: String,
    },

    /// The renderer resolved without a usable response object.
    #[error("renderer produced no usable response")]
    MalformedRendererResponse,

    /// The target URL matched the configured host deny-rule.
    #[error("target host is not allowed")]
    ForbiddenHost,

    /// Catch-all for any other failure not classified above.
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl RenderError {
    /// Returns true when this error represents a cooperative cancellation.
    ///
    /// Cancellation is normal operation and MUST NOT be logged as an error.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::ProcessingCancelled)
    }

    /// Returns true when a client-visible `Retry-After` header should accompany
    /// the response (queue-pressure kinds only).
    #[must_use]
    pub const fn is_retryable_pressure(&self) -> bool {
        matches!(self, Self::QueueFull | Self::QueueTimeout | Self::JobTimeout)
    }

    /// Maps this error to the HTTP status code the front door should return.
    ///
    /// Returns `None` for `ProcessingCancelled`, whose handling is to close
    /// the connection without a body rather than produce a status line.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::ProcessingCancelled => None,
            Self::QueueFull | Self::QueueTimeout | Self::JobTimeout => Some(503),
            Self::NavigationError { status, .. } => {
                if *status == 404 { Some(404) } else { Some(500) }
            },
            Self::MalformedRendererResponse | Self::ForbiddenHost | Self::InternalFailure(_) => {
                Some(500)
            },
        }
    }
}

impl From<RenderError> for ErrorEnvelope {
    fn from(error: RenderError) -> Self {
        if error.is_cancelled() {
            return Self::cancelled(error.to_string());
        }

        let code = match &error {
            RenderError::QueueFull => ErrorCode::new("render", "queue_full"),
            RenderError::QueueTimeout => ErrorCode::new("render", "queue_timeout"),
            RenderError::JobTimeout => ErrorCode::new("render", "job_timeout"),
            RenderError::ProcessingCancelled => ErrorCode::cancelled(),
            RenderError::NavigationError { .. } => ErrorCode::new("render", "navigation_error"),
            RenderError::MalformedRendererResponse => {
                ErrorCode::new("render", "malformed_renderer_response")
            },
            RenderError::ForbiddenHost => ErrorCode::new("render", "forbidden_host"),
            RenderError::InternalFailure(_) => ErrorCode::internal(),
        };

        Self::expected_with_class(code, error.to_string(), ErrorClass::NonRetriable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_retryable_pressure() {
        let error = RenderError::ProcessingCancelled;
        assert!(error.is_cancelled());
        assert!(!error.is_retryable_pressure());
        assert_eq!(error.http_status(), None);
    }

    #[test]
    fn queue_pressure_kinds_map_to_503() {
        for error in [
            RenderError::QueueFull,
            RenderError::QueueTimeout,
            RenderError::JobTimeout,
        ] {
            assert!(error.is_retryable_pressure());
            assert_eq!(error.http_status(), Some(503));
        }
    }

    #[test]
    fn navigation_error_maps_404_else_500() {
        let not_found = RenderError::NavigationError {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(not_found.http_status(), Some(404));

        let server_error = RenderError::NavigationError {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(server_error.http_status(), Some(500));
    }

    #[test]
    fn conversion_to_error_envelope_preserves_cancellation() {
        let envelope: ErrorEnvelope = RenderError::ProcessingCancelled.into();
        assert!(envelope.is_cancelled());

        let envelope: ErrorEnvelope = RenderError::ForbiddenHost.into();
        assert!(!envelope.is_cancelled());
        assert_eq!(envelope.code, ErrorCode::new("render", "forbidden_host"));
    }
}
