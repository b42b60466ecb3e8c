use super::dto::ServiceInfo;
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};

/// Service information and transcoding defaults
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service info", body = ApiResponse<ServiceInfo>)
    ),
    tag = "Status"
)]
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    ApiSuccess(
        ApiResponse::success(ServiceInfo::from(&state), "Frame transcoder is running"),
        StatusCode::OK,
    )
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is up", body = String)
    ),
    tag = "Status"
)]
pub async fn health() -> &'static str {
    "ok"
}
