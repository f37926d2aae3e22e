//! Voice Query Handlers

use std::sync::Arc;

use serde::Serialize;

use crate::application::error::GatewayError;
use crate::application::ports::VoiceStorePort;
use crate::application::queries::ListVoices;
use crate::domain::voice::Voice;

// ============================================================================
// Response DTOs
// ============================================================================

/// 音色信息
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub filename: String,
    pub sample_rate: u32,
    pub voice_transcript: String,
    pub duration_seconds: f64,
    pub uploaded_at: String,
}

impl From<Voice> for VoiceInfo {
    fn from(voice: Voice) -> Self {
        Self {
            voice_id: voice.voice_id().to_string(),
            filename: voice.filename().to_string(),
            sample_rate: voice.sample_rate(),
            voice_transcript: voice.transcript().as_str().to_string(),
            duration_seconds: voice.duration_seconds(),
            uploaded_at: voice.uploaded_at().to_rfc3339(),
        }
    }
}

/// 音色列表响应
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceListResponse {
    pub status: &'static str,
    pub voices: Vec<VoiceInfo>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// ListVoices Handler
pub struct ListVoicesHandler {
    voice_store: Arc<dyn VoiceStorePort>,
}

impl ListVoicesHandler {
    pub fn new(voice_store: Arc<dyn VoiceStorePort>) -> Self {
        Self { voice_store }
    }

    pub async fn handle(&self, _query: ListVoices) -> Result<VoiceListResponse, GatewayError> {
        let voices: Vec<VoiceInfo> = self
            .voice_store
            .list_voices()
            .await?
            .into_iter()
            .map(VoiceInfo::from)
            .collect();

        Ok(VoiceListResponse {
            status: "success",
            total: voices.len(),
            voices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::StubVoiceStore;

    #[tokio::test]
    async fn test_list_voices() {
        let store = Arc::new(StubVoiceStore::with_voices(&["a", "b"]));
        let response = ListVoicesHandler::new(store).handle(ListVoices).await.unwrap();

        assert_eq!(response.status, "success");
        assert_eq!(response.total, 2);
        assert_eq!(response.voices[0].voice_id, "a");
        assert_eq!(response.voices[0].filename, "a.wav");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["voices"][1]["voice_transcript"], "sample");
    }
}
