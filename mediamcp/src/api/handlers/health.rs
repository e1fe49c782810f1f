use axum::{Json, extract::State};

use crate::AppState;
use crate::api::models::tools::HealthResponse;

#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    summary = "Liveness",
    responses(
        (status = 200, description = "The server is up", body = HealthResponse),
    )
)]
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        tools: state.tools.names().into_iter().map(str::to_string).collect(),
    })
}
