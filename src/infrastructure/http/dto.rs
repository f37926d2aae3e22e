//! Data Transfer Objects
//!
//! HTTP 专用的请求体；响应体复用应用层的 Response 类型

use serde::Deserialize;

/// 重命名请求（表单或 JSON）
#[derive(Debug, Deserialize)]
pub struct RenameVoiceRequest {
    pub new_voice_id: String,
}

/// 音频流响应头
pub mod headers {
    pub const SAMPLE_RATE: &str = "x-sample-rate";
    pub const AUDIO_FORMAT: &str = "x-audio-format";
}
