//! Model Command Handlers

use std::sync::Arc;

use serde::Serialize;

use crate::application::commands::UnloadModel;
use crate::application::error::GatewayError;
use crate::application::ports::ModelManagerPort;

/// 卸载响应
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelUnloadResponse {
    pub success: bool,
    pub message: String,
    pub was_loaded: bool,
}

/// UnloadModel Handler
///
/// 与空闲看门狗共用 ModelManager 的卸载路径
pub struct UnloadModelHandler {
    model_manager: Arc<dyn ModelManagerPort>,
}

impl UnloadModelHandler {
    pub fn new(model_manager: Arc<dyn ModelManagerPort>) -> Self {
        Self { model_manager }
    }

    pub async fn handle(&self, _command: UnloadModel) -> Result<ModelUnloadResponse, GatewayError> {
        let outcome = self.model_manager.offload().await?;

        let message = if outcome.was_loaded {
            "Model unloaded successfully"
        } else {
            "Model was not loaded"
        };

        tracing::info!(was_loaded = outcome.was_loaded, "Manual model unload");

        Ok(ModelUnloadResponse {
            success: true,
            message: message.to_string(),
            was_loaded: outcome.was_loaded,
        })
    }
}
