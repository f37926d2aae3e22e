//! Request Envelope - 请求信封解码
//!
//! 每条入站消息只解码一次，按 `type` 字段得到一个和类型，
//! 由路由器穷举匹配。缺少 `type` 时视为 `synthesize`。

use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::synthesis::{AudioFormat, GenerationParams, RequestError, SynthesisRequest};

/// 上传时未提供参考文本时使用的默认值
pub const DEFAULT_VOICE_TRANSCRIPT: &str = "This is a sample of my voice for cloning purposes.";

/// 已知的请求类型
const KNOWN_TYPES: &[&str] = &[
    "synthesize",
    "list_voices",
    "upload_voice",
    "delete_voice",
    "health",
    "ready",
    "model_unload",
];

// ============================================================================
// Payloads
// ============================================================================

/// voice_config 子对象：voice_id + 生成参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceConfigPayload {
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
}

/// synthesize 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizePayload {
    pub text: String,
    #[serde(default)]
    pub audio_format: AudioFormat,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub voice_config: Option<VoiceConfigPayload>,
    /// 扁平写法，voice_config.voice_id 优先
    #[serde(default)]
    pub voice_id: Option<String>,
}

impl SynthesizePayload {
    pub fn into_request(self) -> Result<SynthesisRequest, RequestError> {
        let config = self.voice_config.unwrap_or_default();
        let voice_id = config
            .voice_id
            .or(self.voice_id)
            .ok_or(RequestError::MissingVoiceId)?;

        SynthesisRequest::new(
            self.text,
            &voice_id,
            self.audio_format,
            self.sample_rate,
            config.params,
        )
    }
}

/// upload_voice 请求体（音频为 base64 编码的 WAV）
#[derive(Debug, Clone, Deserialize)]
pub struct UploadVoicePayload {
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub voice_transcript: Option<String>,
    #[serde(default)]
    pub audio_data: Option<String>,
}

impl UploadVoicePayload {
    /// 检查必填字段并解码音频
    pub fn decode(self) -> Result<DecodedUpload, String> {
        let (voice_id, sample_rate, audio_b64) =
            match (self.voice_id, self.sample_rate, self.audio_data) {
                (Some(id), Some(rate), Some(data))
                    if !id.trim().is_empty() && rate > 0 && !data.is_empty() =>
                {
                    (id, rate, data)
                }
                _ => {
                    return Err(
                        "Missing required fields: voice_id, sample_rate, audio_data".to_string()
                    )
                }
            };

        let wav_data = base64::engine::general_purpose::STANDARD
            .decode(audio_b64.trim())
            .map_err(|e| format!("Invalid audio data encoding: {}", e))?;

        Ok(DecodedUpload {
            voice_id,
            sample_rate,
            voice_transcript: self
                .voice_transcript
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VOICE_TRANSCRIPT.to_string()),
            wav_data,
        })
    }
}

/// 解码后的上传请求
#[derive(Debug, Clone)]
pub struct DecodedUpload {
    pub voice_id: String,
    pub sample_rate: u32,
    pub voice_transcript: String,
    pub wav_data: Vec<u8>,
}

/// delete_voice 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteVoicePayload {
    #[serde(default)]
    pub voice_id: Option<String>,
}

// ============================================================================
// Envelope
// ============================================================================

/// 请求信封
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestEnvelope {
    Synthesize(SynthesizePayload),
    ListVoices,
    UploadVoice(UploadVoicePayload),
    DeleteVoice(DeleteVoicePayload),
    Health,
    Ready,
    ModelUnload,
}

impl RequestEnvelope {
    pub fn type_name(&self) -> &'static str {
        match self {
            RequestEnvelope::Synthesize(_) => "synthesize",
            RequestEnvelope::ListVoices => "list_voices",
            RequestEnvelope::UploadVoice(_) => "upload_voice",
            RequestEnvelope::DeleteVoice(_) => "delete_voice",
            RequestEnvelope::Health => "health",
            RequestEnvelope::Ready => "ready",
            RequestEnvelope::ModelUnload => "model_unload",
        }
    }

    /// 是否免认证
    pub fn is_auth_exempt(&self) -> bool {
        matches!(self, RequestEnvelope::Health | RequestEnvelope::Ready)
    }
}

/// 解码结果
#[derive(Debug, Clone)]
pub enum DecodedMessage {
    Envelope {
        api_key: Option<String>,
        request: RequestEnvelope,
    },
    /// 非 JSON 的 UTF-8 文本（仅多路复用传输）
    BareText(String),
    Empty,
    UnknownType(String),
    Invalid(String),
}

impl DecodedMessage {
    /// 面向客户端的错误消息（非错误结果返回 None）
    pub fn error_message(&self) -> Option<String> {
        match self {
            DecodedMessage::Empty => Some("Empty request data".to_string()),
            DecodedMessage::UnknownType(t) => Some(format!("Unknown request type: {}", t)),
            DecodedMessage::Invalid(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

/// 解码原始负载
///
/// `allow_bare_text` 仅在多路复用传输上为 true
pub fn decode_payload(payload: &[u8], allow_bare_text: bool) -> DecodedMessage {
    if payload.iter().all(|b| b.is_ascii_whitespace()) {
        return DecodedMessage::Empty;
    }

    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => decode_object(map),
        Ok(_) => DecodedMessage::Invalid("Request must be a JSON object".to_string()),
        Err(_) if allow_bare_text => match std::str::from_utf8(payload) {
            Ok(text) => DecodedMessage::BareText(text.trim().to_string()),
            Err(_) => DecodedMessage::Invalid("Invalid JSON".to_string()),
        },
        Err(_) => DecodedMessage::Invalid("Invalid JSON".to_string()),
    }
}

/// 解码已解析的 JSON 对象（HTTP / WebSocket 入口）
pub fn decode_object(mut map: Map<String, Value>) -> DecodedMessage {
    let api_key = match map.remove("api_key") {
        Some(Value::String(key)) => Some(key),
        _ => None,
    };

    let type_name = match map.get("type") {
        None | Some(Value::Null) => "synthesize".to_string(),
        Some(Value::String(t)) => t.clone(),
        Some(other) => return DecodedMessage::UnknownType(other.to_string()),
    };

    if !KNOWN_TYPES.contains(&type_name.as_str()) {
        return DecodedMessage::UnknownType(type_name);
    }
    map.insert("type".to_string(), Value::String(type_name));

    match serde_json::from_value::<RequestEnvelope>(Value::Object(map)) {
        Ok(request) => DecodedMessage::Envelope { api_key, request },
        Err(e) => DecodedMessage::Invalid(format!("Invalid request: {}", e)),
    }
}
