use crate::errors::FailureKind;
use crate::models::{CanonicalResult, LookupRequest};
use crate::relay::LookupRelay;
use axum::{
    body::to_bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Maximum accepted request body for the lookup endpoint.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay to the PIN checker API.
    pub relay: LookupRelay,
}

/// Lookup routes, separate so the binary can rate limit them on their own.
pub fn lookup_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/check-pin", post(check_pin))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Lookup routes behind a per-IP rate limiter.
///
/// Each client may burst `burst` requests; one more is allowed every `replenish`.
pub fn rate_limited_lookup_routes(
    replenish: Duration,
    burst: u32,
) -> anyhow::Result<Router<Arc<AppState>>> {
    let replenish_ms = u64::try_from(replenish.as_millis())
        .map_err(|_| anyhow::anyhow!("Rate limit period too large"))?;
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size(burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    Ok(lookup_routes().layer(GovernorLayer {
        config: governor_conf,
    }))
}

/// Assembles the application from the given lookup routes.
pub fn app(state: Arc<AppState>, lookup: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(lookup)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::map_response(json_error_replies)),
        )
}

/// Builds the application routes without rate limiting.
pub fn router(state: Arc<AppState>) -> Router {
    app(state, lookup_routes())
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// POST /api/check-pin
///
/// Looks up a taxpayer PIN by ID. Always answers with a single JSON body,
/// including for unreadable request bodies.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - `{TaxpayerID, TaxpayerType}`, or the reason it could not be read.
pub async fn check_pin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::info!("Oversized lookup body: {}", rejection);
            return error_reply(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text());
        }
        Err(rejection) => {
            tracing::info!("Unreadable lookup body: {}", rejection);
            LookupRequest::default()
        }
    };

    state.relay.handle(&request).await.into_response()
}

/// `{"error", "message"}` reply for failures raised outside the lookup itself.
fn error_reply(status: StatusCode, message: String) -> Response {
    let error = status.canonical_reason().unwrap_or("Request failed");
    let message = if message.trim().is_empty() {
        error.to_string()
    } else {
        message
    };
    (status, Json(json!({ "error": error, "message": message }))).into_response()
}

/// Rewrites non-JSON error replies from layers (body limit, rate limiter,
/// unmatched method) into a JSON body. Headers such as `retry-after` are kept.
async fn json_error_replies(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let text = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    tracing::debug!("Wrapping {} reply as JSON: {}", status, text);

    let mut reply = error_reply(status, text);
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            reply.headers_mut().append(name.clone(), value.clone());
        }
    }
    reply
}

impl IntoResponse for CanonicalResult {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            CanonicalResult::Found {
                record,
                taxpayer_id,
            } => (
                StatusCode::OK,
                json!({
                    "success": true,
                    "data": record,
                    "idNumber": taxpayer_id,
                }),
            ),
            // Business-level absence is not a transport failure.
            CanonicalResult::NotFound { taxpayer_id } => (
                StatusCode::OK,
                json!({
                    "success": false,
                    "error": "Not Found",
                    "message": crate::reduction::invalid_identifier_message(&taxpayer_id),
                    "idNumber": taxpayer_id,
                }),
            ),
            CanonicalResult::Failure {
                kind: FailureKind::Validation,
                message,
                ..
            } => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            CanonicalResult::Failure {
                kind: kind @ (FailureKind::AuthenticationFailed | FailureKind::Timeout),
                message,
                ..
            } => {
                let status = if kind == FailureKind::Timeout {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::UNAUTHORIZED
                };
                (status, json!({ "error": kind.label(), "message": message }))
            }
            // Remaining downstream failures are soft errors so the UI has one error path.
            CanonicalResult::Failure {
                kind,
                message,
                taxpayer_id,
                upstream_error,
            } => (
                StatusCode::OK,
                json!({
                    "success": false,
                    "error": upstream_error.as_deref().unwrap_or(kind.label()),
                    "message": message,
                    "idNumber": taxpayer_id,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
