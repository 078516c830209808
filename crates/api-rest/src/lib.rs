//! # API REST
//!
//! REST API implementation for the consultation summary service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - The live event-stream response of `/api/consultation`
//! - OpenAPI documentation
//! - REST-specific concerns (JSON errors, CORS, serving the frontend bundle)
//!
//! Uses `consult-core` for the summary stream and `api-shared` for health and identity.

#![warn(rust_2018_idioms)]

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;

use api_shared::{require_bearer, AuthenticatedIdentity, HealthRes, HealthService, SharedVerifier};
use consult_core::{
    ConsultationService, FrameStream, ProtocolFrame, VisitRequest, EVENT_STREAM_CONTENT_TYPE,
};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub consultations: ConsultationService,
    pub verifier: SharedVerifier,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, consultation_summary),
    components(schemas(HealthRes, VisitRequest))
)]
pub struct ApiDoc;

/// Build the REST router.
///
/// `/api/consultation` requires a bearer token. When `static_dir` is an existing directory it is
/// served for every path no API route matches, with directories resolving to `index.html`.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let protected = Router::new()
        .route("/api/consultation", post(consultation_summary))
        .route_layer(from_fn_with_state(state.verifier.clone(), require_bearer));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(protected)
        .with_state(state);

    match static_dir {
        Some(dir) if dir.is_dir() => {
            tracing::info!("serving frontend bundle from {}", dir.display());
            app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        }
        Some(dir) => {
            tracing::info!("no frontend bundle at {}, static serving disabled", dir.display());
        }
        None => {}
    }

    app.layer(CorsLayer::permissive())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Always succeeds while the process is serving; used by orchestration for liveness probes.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/api/consultation",
    request_body = VisitRequest,
    responses(
        (status = 200, description = "Live event stream of the generated summary", content_type = "text/event-stream", body = String),
        (status = 400, description = "Upstream provider is not configured"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 422, description = "Malformed visit record")
    )
)]
/// Stream an AI-generated summary of one clinical visit
///
/// The response is a `text/event-stream`: a `: stream-open` comment, then one `data:` frame per
/// line of generated text, and at most one terminal `error` event.
///
/// # Errors
/// Returns `400 Bad Request` with `{"error": ...}` and no stream if the upstream provider
/// configuration is incomplete.
#[axum::debug_handler]
async fn consultation_summary(
    State(state): State<AppState>,
    _identity: AuthenticatedIdentity,
    body: Result<Json<VisitRequest>, JsonRejection>,
) -> Response {
    let Json(visit) = match body {
        Ok(body) => body,
        Err(rejection) => return json_error(rejection.status(), rejection.body_text()),
    };

    let request_id = uuid::Uuid::new_v4();
    match state.consultations.summarise(visit) {
        Ok(frames) => {
            tracing::info!(%request_id, "consultation stream opened");
            event_stream_response(frames, request_id)
        }
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "consultation rejected: upstream misconfigured");
            json_error(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Wrap a frame stream as a live, unbuffered event-stream response.
///
/// The body owns the frame stream; when the client goes away the server drops the body and,
/// with it, the upstream connection.
fn event_stream_response(frames: FrameStream, request_id: uuid::Uuid) -> Response {
    let body = frames.map(move |frame| {
        if let ProtocolFrame::Error(message) = &frame {
            tracing::warn!(%request_id, error = %message, "consultation stream ended with error");
        }
        Ok::<_, Infallible>(frame.encode())
    });

    (
        [
            (header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
