//! The `/v1/pdf` HTTP surface: path parsing, response framing, and the
//! shutdown-drain race. Every status code, header, and error body this
//! server returns is decided in this module; the render service below it
//! only ever returns a [`PdfResult`] or a [`RenderError`].

use std::str::FromStr as _;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Response, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use docrender_facade::v1::{
    ApiV1DeviceProfileParam, ApiV1ErrorBody, ApiV1PageFormatParam, ApiV1PathParamError,
    build_content_disposition, render_error_to_api_v1_response,
};
use docrender_facade::{DeviceProfile, PdfResult, RenderArticleInput, RenderError, RequestContext};
use serde_json::json;

use crate::state::AppState;

/// Build the axum router serving health checks and the PDF render surface.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/{domain}/v1/pdf/{title}/{format}", get(render_pdf))
        .route(
            "/{domain}/v1/pdf/{title}/{format}/{type}",
            get(render_pdf_with_device),
        )
        .with_state(state)
}

async fn render_pdf(
    State(state): State<AppState>,
    Path((domain, title, format)): Path<(String, String, String)>,
) -> Response<Body> {
    render_pdf_inner(state, domain, title, format, None).await
}

async fn render_pdf_with_device(
    State(state): State<AppState>,
    Path((domain, title, format, device_type)): Path<(String, String, String, String)>,
) -> Response<Body> {
    render_pdf_inner(state, domain, title, format, Some(device_type)).await
}

async fn render_pdf_inner(
    state: AppState,
    domain: String,
    title: String,
    format: String,
    device_type: Option<String>,
) -> Response<Body> {
    let page_format = match ApiV1PageFormatParam::from_str(&format) {
        Ok(parsed) => parsed.0,
        Err(error) => return bad_path_segment_response(&error),
    };

    let device_profile = match device_type {
        None => DeviceProfile::default(),
        Some(raw) => match ApiV1DeviceProfileParam::from_str(&raw) {
            Ok(parsed) => parsed.0,
            Err(error) => return bad_path_segment_response(&error),
        },
    };

    let ctx = RequestContext::new_request();
    let input = RenderArticleInput {
        domain,
        title: title.clone(),
        format: page_format,
        device_profile,
    };

    tokio::select! {
        result = state.service.render_article(&ctx, input) => {
            match result {
                Ok(pdf) => success_response(&title, pdf),
                Err(error) => error_response(&state, &title, &error),
            }
        }
        () = state.shutdown.notified() => {
            state.logger.info(
                "server.shutdown_drain",
                "in-flight render cancelled for shutdown",
                None,
            );
            service_unavailable_response(state.queue_timeout_ms)
        }
    }
}

fn success_response(title: &str, pdf: PdfResult) -> Response<Body> {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, pdf.buffer.len())
        .header(header::LAST_MODIFIED, pdf.last_modified.clone());

    let builder = match HeaderValue::from_str(&build_content_disposition(title)) {
        Ok(value) => builder.header(header::CONTENT_DISPOSITION, value),
        Err(_) => return internal_header_error_response(),
    };

    match builder.body(Body::from(pdf.buffer)) {
        Ok(response) => response,
        Err(_) => internal_header_error_response(),
    }
}

fn error_response(state: &AppState, title: &str, error: &RenderError) -> Response<Body> {
    let Some(api_error) =
        render_error_to_api_v1_response(error, title, state.queue_timeout_ms)
    else {
        return client_disconnect_response();
    };

    let status =
        StatusCode::from_u16(api_error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_vec(&api_error.body).unwrap_or_default();

    let builder = Response::builder().status(status).header(
        header::CONTENT_TYPE,
        "application/json",
    );
    let builder = match api_error.retry_after_seconds {
        Some(seconds) => builder.header(header::RETRY_AFTER, seconds.to_string()),
        None => builder,
    };

    match builder.body(Body::from(body)) {
        Ok(response) => response,
        Err(_) => internal_header_error_response(),
    }
}

fn service_unavailable_response(queue_timeout_ms: u64) -> Response<Body> {
    let retry_after_seconds = queue_timeout_ms.div_ceil(1000).max(1);
    let body = ApiV1ErrorBody {
        name: "ShuttingDown".to_string(),
        status: 503,
        message: "server is shutting down".to_string(),
        details: "the in-flight render was cancelled because the server is draining for shutdown"
            .to_string(),
    };

    match Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::RETRY_AFTER, retry_after_seconds.to_string())
        .body(Body::from(serde_json::to_vec(&body).unwrap_or_default()))
    {
        Ok(response) => response,
        Err(_) => internal_header_error_response(),
    }
}

fn bad_path_segment_response(error: &ApiV1PathParamError) -> Response<Body> {
    let body = ApiV1ErrorBody {
        name: "InvalidPathSegment".to_string(),
        status: 400,
        message: "invalid path segment".to_string(),
        details: error.to_string(),
    };

    match Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap_or_default()))
    {
        Ok(response) => response,
        Err(_) => internal_header_error_response(),
    }
}

/// Non-standard nginx "Client Closed Request" status: used when the render
/// was cancelled because the client itself disconnected, so there is no
/// meaningful response body to return.
fn client_disconnect_response() -> Response<Body> {
    let status = StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match Response::builder().status(status).body(Body::empty()) {
        Ok(response) => response,
        Err(_) => internal_header_error_response(),
    }
}

fn internal_header_error_response() -> Response<Body> {
    (StatusCode::INTERNAL_SERVER_ERROR, "failed to build response headers").into_response()
}

async fn healthz(State(_state): State<AppState>) -> Response<Body> {
    let info = docrender_facade::build_info();
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": info.name, "version": info.version })),
    )
        .into_response()
}

async fn readyz(State(state): State<AppState>) -> Response<Body> {
    let waiting = state.service.queue_waiting();
    let running = state.service.queue_running();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "queueWaiting": waiting,
            "queueRunning": running,
        })),
    )
        .into_response()
}
