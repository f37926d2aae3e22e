//! Audio Transcoder Port - 音频转码抽象
//!
//! 压缩格式（Vorbis-in-Ogg）交由外部编码器完成

use async_trait::async_trait;
use thiserror::Error;

/// 转码错误
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg not installed or not found at '{0}'. Install ffmpeg to use vorbis format.")]
    EncoderMissing(String),

    #[error("Vorbis encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Vorbis encoding timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Audio Transcoder Port
#[async_trait]
pub trait AudioTranscoderPort: Send + Sync {
    /// 将完整的 WAV 数据编码为 Ogg Vorbis
    ///
    /// # Arguments
    /// * `wav_data` - 完整的 WAV 文件内容
    /// * `quality` - 0.0 ~ 1.0，映射到编码器的质量等级
    ///
    /// 任何失败都不返回部分数据
    async fn encode_vorbis(&self, wav_data: &[u8], quality: f32) -> Result<Vec<u8>, TranscodeError>;
}
