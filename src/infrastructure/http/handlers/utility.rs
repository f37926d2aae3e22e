//! Utility Handlers - 健康检查、就绪检查、模型卸载

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::application::{
    HealthCheck, HealthResponse, ModelUnloadResponse, ReadinessCheck, ReadyResponse, UnloadModel,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /health（免认证）
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.services.health.handle(HealthCheck))
}

/// GET /ready（免认证）
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(state.services.readiness.handle(ReadinessCheck).await)
}

/// POST /model/unload
pub async fn unload_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelUnloadResponse>, ApiError> {
    let result = state.services.unload_model.handle(UnloadModel).await?;
    Ok(Json(result))
}
