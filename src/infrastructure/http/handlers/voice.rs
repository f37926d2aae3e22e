//! Voice HTTP Handlers

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    Form, Json,
};

use crate::application::envelope::DEFAULT_VOICE_TRANSCRIPT;
use crate::application::{
    DeleteVoice, ListVoices, RenameVoice, RenameVoiceResponse, UploadVoice, VoiceListResponse,
    VoiceMutationResponse,
};
use crate::infrastructure::http::dto::RenameVoiceRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// Handlers
// ============================================================================

/// 上传音色（multipart: voice_id, sample_rate, voice_transcript, audio_file）
pub async fn upload_voice(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<VoiceMutationResponse>, ApiError> {
    let mut voice_id: Option<String> = None;
    let mut sample_rate: Option<String> = None;
    let mut voice_transcript: Option<String> = None;
    let mut audio_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "voice_id" | "sample_rate" | "voice_transcript" => {
                let value = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read {}: {}", field_name, e))
                })?;
                match field_name.as_str() {
                    "voice_id" => voice_id = Some(value),
                    "sample_rate" => sample_rate = Some(value),
                    _ => voice_transcript = Some(value),
                }
            }
            "audio_file" => {
                let is_wav = field
                    .file_name()
                    .map(|name| name.to_lowercase().ends_with(".wav"))
                    .unwrap_or(false);
                if !is_wav {
                    return Err(ApiError::BadRequest(
                        "Only WAV files are supported".to_string(),
                    ));
                }

                audio_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let voice_id =
        voice_id.ok_or_else(|| ApiError::BadRequest("voice_id is required".to_string()))?;
    let sample_rate = sample_rate
        .ok_or_else(|| ApiError::BadRequest("sample_rate is required".to_string()))?
        .trim()
        .parse::<u32>()
        .map_err(|_| ApiError::BadRequest("sample_rate must be an integer".to_string()))?;
    let wav_data =
        audio_data.ok_or_else(|| ApiError::BadRequest("audio_file is required".to_string()))?;
    let voice_transcript = voice_transcript
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VOICE_TRANSCRIPT.to_string());

    let command = UploadVoice {
        voice_id,
        sample_rate,
        voice_transcript,
        wav_data,
    };

    let result = state.services.upload_voice.handle(command).await?;
    Ok(Json(result))
}

/// 获取音色列表
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VoiceListResponse>, ApiError> {
    let result = state.services.list_voices.handle(ListVoices).await?;
    Ok(Json(result))
}

/// 删除音色
pub async fn delete_voice(
    State(state): State<Arc<AppState>>,
    Path(voice_id): Path<String>,
) -> Result<Json<VoiceMutationResponse>, ApiError> {
    let result = state
        .services
        .delete_voice
        .handle(DeleteVoice { voice_id })
        .await?;
    Ok(Json(result))
}

/// 重命名音色（表单或 JSON 的 new_voice_id）
pub async fn rename_voice(
    State(state): State<Arc<AppState>>,
    Path(voice_id): Path<String>,
    request: Request,
) -> Result<Json<RenameVoiceResponse>, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let body = if is_json {
        Json::<RenameVoiceRequest>::from_request(request, &state)
            .await
            .map(|Json(body)| body)
            .map_err(ApiError::from)?
    } else {
        Form::<RenameVoiceRequest>::from_request(request, &state)
            .await
            .map(|Form(body)| body)
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
    };

    let result = state
        .services
        .rename_voice
        .handle(RenameVoice {
            voice_id,
            new_voice_id: body.new_voice_id,
        })
        .await?;
    Ok(Json(result))
}
