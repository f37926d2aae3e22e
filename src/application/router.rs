//! Request Router - 传输无关的请求分发
//!
//! 解码 → 认证 → 按类型分发 → 结果写回 sink。
//! 任何处理错误都在这里被转换为单个 error 帧。

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::auth::ApiKeyAuthenticator;
use crate::application::commands::handlers::{
    DeleteVoiceHandler, RenameVoiceHandler, UnloadModelHandler, UploadVoiceHandler,
};
use crate::application::commands::{DeleteVoice, UnloadModel, UploadVoice};
use crate::application::envelope::{decode_payload, DecodedMessage, RequestEnvelope};
use crate::application::error::GatewayError;
use crate::application::orchestrator::{report_error, SynthesisOrchestrator};
use crate::application::ports::FrameSink;
use crate::application::queries::handlers::{HealthHandler, ListVoicesHandler, ReadinessHandler};
use crate::application::queries::{HealthCheck, ListVoices, ReadinessCheck};
use crate::domain::synthesis::{
    AudioFormat, Frame, GenerationParams, RequestError, SynthesisRequest,
};

/// 裸文本请求的默认参数（来自配置）
#[derive(Debug, Clone)]
pub struct BareTextDefaults {
    pub voice_id: String,
    pub audio_format: AudioFormat,
    pub params: GenerationParams,
}

impl BareTextDefaults {
    pub fn to_request(&self, text: String) -> Result<SynthesisRequest, RequestError> {
        SynthesisRequest::new(
            text,
            &self.voice_id,
            self.audio_format,
            None,
            self.params.clone(),
        )
    }
}

/// 应用服务集合，两个前端共享
pub struct GatewayServices {
    pub auth: ApiKeyAuthenticator,
    pub orchestrator: Arc<SynthesisOrchestrator>,
    pub upload_voice: UploadVoiceHandler,
    pub delete_voice: DeleteVoiceHandler,
    pub rename_voice: RenameVoiceHandler,
    pub list_voices: ListVoicesHandler,
    pub health: HealthHandler,
    pub readiness: ReadinessHandler,
    pub unload_model: UnloadModelHandler,
}

/// 多路复用传输的请求路由器
pub struct RequestRouter {
    services: Arc<GatewayServices>,
    bare_text: Option<BareTextDefaults>,
}

impl RequestRouter {
    pub fn new(services: Arc<GatewayServices>, bare_text: Option<BareTextDefaults>) -> Self {
        Self {
            services,
            bare_text,
        }
    }

    /// 处理一条原始消息，所有响应帧写入 sink
    pub async fn handle_message(
        &self,
        payload: &[u8],
        sink: &dyn FrameSink,
        cancel: &CancellationToken,
    ) {
        let started = Instant::now();

        match decode_payload(payload, self.bare_text.is_some()) {
            DecodedMessage::Envelope { api_key, request } => {
                let request_type = request.type_name();
                if !request.is_auth_exempt() {
                    if let Err(err) = self.services.auth.verify(api_key.as_deref()) {
                        warn!(request_type = request_type, "Rejected unauthenticated request");
                        report_error(&err, sink).await;
                        return;
                    }
                }
                debug!(request_type = request_type, "Dispatching request");
                self.dispatch(request, sink, cancel).await;
                info!(
                    request_type = request_type,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request finished"
                );
            }
            DecodedMessage::BareText(text) => {
                let Some(defaults) = &self.bare_text else {
                    return;
                };
                debug!(chars = text.chars().count(), "Bare text request");
                match defaults.to_request(text) {
                    Ok(request) => {
                        self.services
                            .orchestrator
                            .synthesize_and_report(&request, sink, cancel)
                            .await;
                    }
                    Err(err) => report_error(&err.into(), sink).await,
                }
            }
            other => {
                if let Some(message) = other.error_message() {
                    report_error(&GatewayError::validation(message), sink).await;
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: RequestEnvelope,
        sink: &dyn FrameSink,
        cancel: &CancellationToken,
    ) {
        let services = &self.services;
        let result = match request {
            RequestEnvelope::Synthesize(payload) => {
                match payload.into_request() {
                    Ok(request) => {
                        services
                            .orchestrator
                            .synthesize_and_report(&request, sink, cancel)
                            .await;
                    }
                    Err(err) => report_error(&err.into(), sink).await,
                }
                return;
            }
            RequestEnvelope::ListVoices => services.list_voices.handle(ListVoices).await.and_then(to_json),
            RequestEnvelope::UploadVoice(payload) => match payload.decode() {
                Ok(upload) => services
                    .upload_voice
                    .handle(UploadVoice {
                        voice_id: upload.voice_id,
                        sample_rate: upload.sample_rate,
                        voice_transcript: upload.voice_transcript,
                        wav_data: upload.wav_data,
                    })
                    .await
                    .and_then(to_json),
                Err(message) => Err(GatewayError::validation(message)),
            },
            RequestEnvelope::DeleteVoice(payload) => match payload.voice_id {
                Some(voice_id) => services
                    .delete_voice
                    .handle(DeleteVoice { voice_id })
                    .await
                    .and_then(to_json),
                None => Err(GatewayError::validation("Missing required field: voice_id")),
            },
            RequestEnvelope::Health => to_json(services.health.handle(HealthCheck)),
            RequestEnvelope::Ready => to_json(services.readiness.handle(ReadinessCheck).await),
            RequestEnvelope::ModelUnload => services
                .unload_model
                .handle(UnloadModel)
                .await
                .and_then(to_json),
        };

        match result {
            Ok(value) => {
                if sink.send(Frame::Response(value)).await.is_err() {
                    debug!("Client disconnected before response");
                }
            }
            Err(err) => report_error(&err, sink).await,
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, GatewayError> {
    serde_json::to_value(value).map_err(|e| GatewayError::internal(e.to_string()))
}
