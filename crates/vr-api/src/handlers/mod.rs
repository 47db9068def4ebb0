//! # vr-api Handlers
//!
//! Each handler extracts, calls one service method and shapes the response.

pub mod analyses;
pub mod events;
pub mod pages;
pub mod users;
pub mod votes;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use vr_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

const OPENMETRICS: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("encoding metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, OPENMETRICS)], body))
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("no route for {}", uri.path()) })))
}

/// 201 when something was persisted, 200 otherwise.
pub(crate) fn created_or_ok(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}
