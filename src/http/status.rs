use super::app_error::AppError;
use super::state::HttpServerState;
use crate::pipeline::CollectorStatus;
use axum::Json;
use axum::extract::State;

pub async fn collector_status(
    State(state): State<HttpServerState>,
) -> Result<Json<CollectorStatus>, AppError> {
    let receiver = state
        .collector_status
        .as_ref()
        .ok_or_else(|| AppError::NotFound("No collector is running in this process".to_string()))?;
    let status = receiver.borrow().clone();
    Ok(Json(status))
}
