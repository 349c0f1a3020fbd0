//! Request handlers.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::health::HealthReport;
use crate::http::server::AppState;
use crate::providers::{IdentifyOptions, ImageInput};

/// `GET /health`: 200 while at least one provider can serve, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = HealthReport::collect(&state.service);
    let status = if report.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// `POST /api/v1/identify`: raw image body, options in the query string.
pub async fn identify(
    State(state): State<AppState>,
    Query(options): Query<IdentifyOptions>,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "request body must contain an image" })),
        )
            .into_response();
    }

    let result = state.service.identify(ImageInput::new(body.to_vec()), options).await;

    if result.is_success() {
        return (StatusCode::OK, Json(result)).into_response();
    }

    let retry_after = result.retry_after_secs;
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(result)).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}
