//! HTTP Routes
//!
//! API Endpoints:
//! - /health                  GET     健康检查（免认证）
//! - /ready                   GET     就绪检查（免认证）
//! - /model/unload            POST    卸载模型
//! - /synthesize              POST    分块流式合成
//! - /stream                  WS      WebSocket 流式合成（认证在首条消息中）
//! - /voices/upload           POST    上传音色（multipart）
//! - /voices/list             GET     列出所有音色
//! - /voices/{id}             DELETE  删除音色
//! - /voices/{id}/rename      PUT     重命名音色

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use super::handlers;
use super::middleware::require_api_key;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/stream", get(handlers::stream_handler))
        .merge(protected_routes(state))
}

/// 需要 Bearer API key 的路由
fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/model/unload", post(handlers::unload_model))
        .route("/synthesize", post(handlers::synthesize))
        .nest("/voices", voice_routes())
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// Voice 路由
fn voice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(handlers::upload_voice))
        .route("/list", get(handlers::list_voices))
        .route("/:voice_id", delete(handlers::delete_voice))
        .route("/:voice_id/rename", put(handlers::rename_voice))
}
