//! Maps the closed [`RenderError`] taxonomy to the §6 HTTP contract.
//!
//! Grounded on `docrender_domain::RenderError::http_status`, which already
//! decides the status code by matching the variant; this module only adds
//! the JSON body shape and the `Retry-After` seconds the front door must
//! send alongside queue-pressure kinds.

use crate::v1::types::{ApiV1ErrorBody, ApiV1ErrorResponse};
use docrender_domain::RenderError;

/// Map a [`RenderError`] to the response the HTTP front door should send.
///
/// Returns `None` for `ProcessingCancelled`: per §6, a client disconnect
/// closes the socket without a body rather than producing a status line.
///
/// `queue_timeout_ms` is the configured queue timeout, used to compute the
/// `Retry-After` seconds for queue-pressure kinds; it is ignored for every
/// other error kind.
#[must_use]
pub fn render_error_to_api_v1_response(
    error: &RenderError,
    article_title: &str,
    queue_timeout_ms: u64,
) -> Option<ApiV1ErrorResponse> {
    let status = error.http_status()?;

    let retry_after_seconds = error
        .is_retryable_pressure()
        .then(|| queue_timeout_ms.div_ceil(1000).max(1));

    let (name, message, details) = match error {
        RenderError::QueueFull => (
            "QueueFull",
            "the render queue is at capacity",
            "Too many renders are already queued; retry later.".to_string(),
        ),
        RenderError::QueueTimeout => (
            "QueueTimeout",
            "the job timed out while waiting in queue",
            "The render never left the waiting queue in time; retry later.".to_string(),
        ),
        RenderError::JobTimeout => (
            "JobTimeout",
            "the render exceeded its execution timeout",
            "Rendering took too long and was aborted; retry later.".to_string(),
        ),
        RenderError::NavigationError { status: upstream_status, message } => {
            if *upstream_status == 404 {
                (
                    "NotFound",
                    "article not found",
                    format!("Article '{article_title}' not found"),
                )
            } else {
                (
                    "NavigationError",
                    "upstream page could not be rendered",
                    format!("Upstream responded with {upstream_status}: {message}"),
                )
            }
        },
        RenderError::MalformedRendererResponse => (
            "InternalFailure",
            "the renderer produced no usable response",
            "The render completed without a usable PDF payload.".to_string(),
        ),
        RenderError::ForbiddenHost => (
            "ForbiddenHost",
            "target host is not allowed",
            format!("Article '{article_title}' targets a host outside the allowed set."),
        ),
        RenderError::InternalFailure(detail) => (
            "InternalFailure",
            "an internal error occurred",
            detail.clone(),
        ),
        RenderError::ProcessingCancelled => unreachable!("handled by the early return above"),
    };

    Some(ApiV1ErrorResponse {
        status,
        retry_after_seconds,
        body: ApiV1ErrorBody {
            name: name.to_string(),
            status,
            message: message.to_string(),
            details,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_maps_to_no_response() {
        assert_eq!(
            render_error_to_api_v1_response(&RenderError::ProcessingCancelled, "Rust", 30_000),
            None
        );
    }

    #[test]
    fn not_found_navigation_error_matches_the_literal_body_shape() {
        let error = RenderError::NavigationError { status: 404, message: "Not Found".to_string() };
        let response = render_error_to_api_v1_response(&error, "Rust", 5_000).expect("response");
        assert_eq!(response.status, 404);
        assert_eq!(response.retry_after_seconds, None);
        assert_eq!(response.body.name, "NotFound");
        assert_eq!(response.body.status, 404);
        assert_eq!(response.body.details, "Article 'Rust' not found");
    }

    #[test]
    fn queue_full_carries_retry_after_rounded_up_to_whole_seconds() {
        let response =
            render_error_to_api_v1_response(&RenderError::QueueFull, "Rust", 1_500).expect("response");
        assert_eq!(response.status, 503);
        assert_eq!(response.retry_after_seconds, Some(2));
    }

    #[test]
    fn forbidden_host_maps_to_500_with_no_retry_after() {
        let response =
            render_error_to_api_v1_response(&RenderError::ForbiddenHost, "Rust", 30_000).expect("response");
        assert_eq!(response.status, 500);
        assert_eq!(response.retry_after_seconds, None);
    }
}
