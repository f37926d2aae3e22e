//! Voice Context - Errors

use thiserror::Error;

use super::VoiceId;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Voice not found: {0}")]
    NotFound(VoiceId),

    #[error("Voice already exists: {0}")]
    AlreadyExists(VoiceId),

    #[error("Invalid voice_id: {0}")]
    InvalidId(String),

    #[error("Invalid reference audio: {0}")]
    InvalidReferenceAudio(String),
}
