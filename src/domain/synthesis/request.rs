//! Synthesis Context - 合成请求

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AudioFormat;
use crate::domain::voice::VoiceId;

/// 文本最大长度（字符数）
pub const MAX_TEXT_CHARS: usize = 10_000;

/// 允许的输出采样率覆盖范围
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8_000..=192_000;

/// 允许的语速范围
pub const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.1..=3.0;

/// 合成请求校验错误
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Text cannot be empty")]
    EmptyText,

    #[error("Text exceeds {max} characters (got {len})")]
    TextTooLong { len: usize, max: usize },

    #[error("voice_id is required")]
    MissingVoiceId,

    #[error("Invalid voice_id: {0}")]
    InvalidVoiceId(&'static str),

    #[error("sample_rate must be between {min} and {max} (got {got})")]
    SampleRateOutOfRange { got: u32, min: u32, max: u32 },

    #[error("speed must be between 0.1 and 3.0 (got {0})")]
    SpeedOutOfRange(f32),
}

/// 生成参数
///
/// `speed` 单独建模，其余参数（exaggeration、cfg_weight、temperature 等）
/// 原样透传给模型后端。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            extra: BTreeMap::new(),
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), RequestError> {
        if !SPEED_RANGE.contains(&self.speed) {
            return Err(RequestError::SpeedOutOfRange(self.speed));
        }
        Ok(())
    }

    /// 读取数值型附加参数
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(|v| v.as_f64())
    }
}

/// 合成请求（构造后不可变）
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    voice_id: VoiceId,
    audio_format: AudioFormat,
    sample_rate: Option<u32>,
    params: GenerationParams,
}

impl SynthesisRequest {
    pub fn new(
        text: impl Into<String>,
        voice_id: &str,
        audio_format: AudioFormat,
        sample_rate: Option<u32>,
        params: GenerationParams,
    ) -> Result<Self, RequestError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RequestError::EmptyText);
        }
        let len = text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(RequestError::TextTooLong {
                len,
                max: MAX_TEXT_CHARS,
            });
        }

        let voice_id = VoiceId::parse(voice_id).map_err(RequestError::InvalidVoiceId)?;

        if let Some(rate) = sample_rate {
            if !SAMPLE_RATE_RANGE.contains(&rate) {
                return Err(RequestError::SampleRateOutOfRange {
                    got: rate,
                    min: *SAMPLE_RATE_RANGE.start(),
                    max: *SAMPLE_RATE_RANGE.end(),
                });
            }
        }

        params.validate()?;

        Ok(Self {
            text,
            voice_id,
            audio_format,
            sample_rate,
            params,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice_id(&self) -> &VoiceId {
        &self.voice_id
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.audio_format
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }
}
