//! Voice Command Handlers

use std::sync::Arc;

use serde::Serialize;

use crate::application::commands::{DeleteVoice, RenameVoice, UploadVoice};
use crate::application::error::GatewayError;
use crate::application::ports::{NewVoice, PromptCachePort, VoiceStorePort};
use crate::domain::synthesis::SAMPLE_RATE_RANGE;
use crate::domain::voice::{VoiceError, VoiceId, VoiceTranscript};

// ============================================================================
// Response DTOs
// ============================================================================

/// 上传 / 删除响应
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceMutationResponse {
    pub success: bool,
    pub voice_id: String,
    pub message: String,
}

/// 重命名响应
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenameVoiceResponse {
    pub success: bool,
    pub old_voice_id: String,
    pub new_voice_id: String,
    pub message: String,
}

fn parse_voice_id(raw: &str) -> Result<VoiceId, GatewayError> {
    VoiceId::parse(raw).map_err(|e| VoiceError::InvalidId(e.to_string()).into())
}

// ============================================================================
// UploadVoice
// ============================================================================

/// UploadVoice Handler
pub struct UploadVoiceHandler {
    voice_store: Arc<dyn VoiceStorePort>,
    prompt_cache: Arc<dyn PromptCachePort>,
}

impl UploadVoiceHandler {
    pub fn new(voice_store: Arc<dyn VoiceStorePort>, prompt_cache: Arc<dyn PromptCachePort>) -> Self {
        Self {
            voice_store,
            prompt_cache,
        }
    }

    pub async fn handle(&self, command: UploadVoice) -> Result<VoiceMutationResponse, GatewayError> {
        let voice_id = parse_voice_id(&command.voice_id)?;

        if !SAMPLE_RATE_RANGE.contains(&command.sample_rate) {
            return Err(GatewayError::validation(format!(
                "sample_rate must be between {} and {}",
                SAMPLE_RATE_RANGE.start(),
                SAMPLE_RATE_RANGE.end()
            )));
        }

        let transcript = VoiceTranscript::new(&command.voice_transcript)
            .map_err(GatewayError::validation)?;

        if self.voice_store.voice_exists(&voice_id).await? {
            return Err(VoiceError::AlreadyExists(voice_id).into());
        }

        let voice = self
            .voice_store
            .save_voice(NewVoice {
                voice_id: voice_id.clone(),
                sample_rate: command.sample_rate,
                transcript,
                wav_data: command.wav_data,
            })
            .await?;

        self.prompt_cache.invalidate(&voice_id);

        tracing::info!(
            voice_id = %voice_id,
            sample_rate = voice.sample_rate(),
            duration_seconds = voice.duration_seconds(),
            "Voice uploaded"
        );

        Ok(VoiceMutationResponse {
            success: true,
            message: format!("Voice '{}' uploaded successfully", voice_id),
            voice_id: voice_id.to_string(),
        })
    }
}

// ============================================================================
// DeleteVoice
// ============================================================================

/// DeleteVoice Handler
pub struct DeleteVoiceHandler {
    voice_store: Arc<dyn VoiceStorePort>,
    prompt_cache: Arc<dyn PromptCachePort>,
}

impl DeleteVoiceHandler {
    pub fn new(voice_store: Arc<dyn VoiceStorePort>, prompt_cache: Arc<dyn PromptCachePort>) -> Self {
        Self {
            voice_store,
            prompt_cache,
        }
    }

    pub async fn handle(&self, command: DeleteVoice) -> Result<VoiceMutationResponse, GatewayError> {
        let voice_id = parse_voice_id(&command.voice_id)?;

        let deleted = self.voice_store.delete_voice(&voice_id).await?;
        self.prompt_cache.invalidate(&voice_id);

        if !deleted {
            return Err(GatewayError::voice_not_found(&voice_id));
        }

        tracing::info!(voice_id = %voice_id, "Voice deleted");

        Ok(VoiceMutationResponse {
            success: true,
            message: format!("Voice '{}' deleted successfully", voice_id),
            voice_id: voice_id.to_string(),
        })
    }
}

// ============================================================================
// RenameVoice
// ============================================================================

/// RenameVoice Handler
pub struct RenameVoiceHandler {
    voice_store: Arc<dyn VoiceStorePort>,
    prompt_cache: Arc<dyn PromptCachePort>,
}

impl RenameVoiceHandler {
    pub fn new(voice_store: Arc<dyn VoiceStorePort>, prompt_cache: Arc<dyn PromptCachePort>) -> Self {
        Self {
            voice_store,
            prompt_cache,
        }
    }

    pub async fn handle(&self, command: RenameVoice) -> Result<RenameVoiceResponse, GatewayError> {
        let old_id = parse_voice_id(&command.voice_id)?;
        let new_id = parse_voice_id(&command.new_voice_id)?;

        if old_id == new_id {
            return Err(GatewayError::validation(
                "new_voice_id must differ from the current voice_id",
            ));
        }
        if !self.voice_store.voice_exists(&old_id).await? {
            return Err(GatewayError::voice_not_found(&old_id));
        }
        if self.voice_store.voice_exists(&new_id).await? {
            return Err(VoiceError::AlreadyExists(new_id).into());
        }

        self.voice_store.rename_voice(&old_id, &new_id).await?;
        self.prompt_cache.invalidate(&old_id);
        self.prompt_cache.invalidate(&new_id);

        tracing::info!(old_voice_id = %old_id, new_voice_id = %new_id, "Voice renamed");

        Ok(RenameVoiceResponse {
            success: true,
            message: format!("Voice '{}' renamed to '{}'", old_id, new_id),
            old_voice_id: old_id.to_string(),
            new_voice_id: new_id.to_string(),
        })
    }
}
