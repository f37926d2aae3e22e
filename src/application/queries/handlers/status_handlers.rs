//! Status Query Handlers - 存活与就绪检查

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::application::ports::{ModelManagerPort, VoiceStorePort};
use crate::application::queries::{HealthCheck, ReadinessCheck};
use crate::domain::synthesis::ModelState;

/// 服务版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 存活检查响应
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub version: &'static str,
    pub timestamp: String,
}

/// 就绪检查响应
#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub model_loaded: bool,
    pub state: ModelState,
    pub voice_dir_accessible: bool,
    pub database_accessible: bool,
}

/// HealthCheck Handler
pub struct HealthHandler {
    model_manager: Arc<dyn ModelManagerPort>,
}

impl HealthHandler {
    pub fn new(model_manager: Arc<dyn ModelManagerPort>) -> Self {
        Self { model_manager }
    }

    pub fn handle(&self, _query: HealthCheck) -> HealthResponse {
        HealthResponse {
            status: "healthy",
            model_loaded: self.model_manager.is_loaded(),
            version: VERSION,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// ReadinessCheck Handler
pub struct ReadinessHandler {
    model_manager: Arc<dyn ModelManagerPort>,
    voice_store: Arc<dyn VoiceStorePort>,
}

impl ReadinessHandler {
    pub fn new(model_manager: Arc<dyn ModelManagerPort>, voice_store: Arc<dyn VoiceStorePort>) -> Self {
        Self {
            model_manager,
            voice_store,
        }
    }

    pub async fn handle(&self, _query: ReadinessCheck) -> ReadyResponse {
        let state = self.model_manager.state();
        let model_loaded = state == ModelState::Loaded;
        let health = self.voice_store.health().await;

        ReadyResponse {
            ready: model_loaded && health.voice_dir_accessible && health.database_accessible,
            model_loaded,
            state,
            voice_dir_accessible: health.voice_dir_accessible,
            database_accessible: health.database_accessible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{StubModel, StubModelManager, StubVoiceStore};

    #[tokio::test]
    async fn test_health_and_ready_follow_model_state() {
        let manager = Arc::new(StubModelManager::new(StubModel::new(1, 1)));
        let store = Arc::new(StubVoiceStore::default());
        let health = HealthHandler::new(manager.clone());
        let ready = ReadinessHandler::new(manager.clone(), store);

        let h = health.handle(HealthCheck);
        assert_eq!(h.status, "healthy");
        assert!(!h.model_loaded);
        assert!(!ready.handle(ReadinessCheck).await.ready);

        manager.ensure_loaded().await.unwrap();
        assert!(health.handle(HealthCheck).model_loaded);
        let r = ready.handle(ReadinessCheck).await;
        assert!(r.ready);
        assert_eq!(r.state, ModelState::Loaded);

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["state"], "loaded");
    }
}
