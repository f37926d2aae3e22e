//! Audio Codec Strategies - 流式音频编码策略
//!
//! 两种流式纪律:
//! - 逐块直出 (PCM): encode_chunk 立即返回字节，finalize 为空
//! - 累积后输出 (WAV / Vorbis): encode_chunk 复制并累积样本、返回空，
//!   finalize 一次性输出完整文件
//!
//! 约定: 累积型策略的流式结果与对完整缓冲区一次性编码逐字节一致。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::ports::{AudioTranscoderPort, TranscodeError};
use crate::domain::audio;
use crate::domain::synthesis::AudioFormat;

/// 流式编码器
#[async_trait]
pub trait AudioStreamEncoder: Send + Sync {
    fn format(&self) -> AudioFormat;

    /// 编码一块样本；不修改调用方的缓冲区
    fn encode_chunk(&mut self, samples: &[f32]) -> Bytes;

    /// 输出剩余数据。累积型编码器在此产生完整文件
    async fn finalize(&mut self) -> Result<Bytes, TranscodeError>;
}

// ============================================================================
// PCM
// ============================================================================

/// PCM s16le，无状态
#[derive(Debug, Default)]
pub struct PcmEncoder;

#[async_trait]
impl AudioStreamEncoder for PcmEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Pcm
    }

    fn encode_chunk(&mut self, samples: &[f32]) -> Bytes {
        Bytes::from(audio::encode_pcm_s16le(samples))
    }

    async fn finalize(&mut self) -> Result<Bytes, TranscodeError> {
        Ok(Bytes::new())
    }
}

// ============================================================================
// WAV
// ============================================================================

/// WAV 累积编码器
#[derive(Debug)]
pub struct WavEncoder {
    sample_rate: u32,
    buffer: Vec<f32>,
}

impl WavEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer: Vec::new(),
        }
    }

    fn take_wav(&mut self) -> Vec<u8> {
        let samples = std::mem::take(&mut self.buffer);
        audio::encode_wav_complete(&samples, self.sample_rate)
    }
}

#[async_trait]
impl AudioStreamEncoder for WavEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    fn encode_chunk(&mut self, samples: &[f32]) -> Bytes {
        self.buffer.extend_from_slice(samples);
        Bytes::new()
    }

    async fn finalize(&mut self) -> Result<Bytes, TranscodeError> {
        Ok(Bytes::from(self.take_wav()))
    }
}

// ============================================================================
// Vorbis
// ============================================================================

/// Vorbis-in-Ogg 累积编码器，finalize 时交给外部转码器
pub struct VorbisEncoder {
    wav: WavEncoder,
    quality: f32,
    transcoder: Arc<dyn AudioTranscoderPort>,
}

impl VorbisEncoder {
    pub fn new(sample_rate: u32, quality: f32, transcoder: Arc<dyn AudioTranscoderPort>) -> Self {
        Self {
            wav: WavEncoder::new(sample_rate),
            quality,
            transcoder,
        }
    }
}

#[async_trait]
impl AudioStreamEncoder for VorbisEncoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Vorbis
    }

    fn encode_chunk(&mut self, samples: &[f32]) -> Bytes {
        self.wav.encode_chunk(samples)
    }

    async fn finalize(&mut self) -> Result<Bytes, TranscodeError> {
        let wav = self.wav.take_wav();
        let ogg = self.transcoder.encode_vorbis(&wav, self.quality).await?;
        Ok(Bytes::from(ogg))
    }
}

// ============================================================================
// Factory
// ============================================================================

/// 编码器工厂：按格式选择策略
#[derive(Clone)]
pub struct EncoderFactory {
    transcoder: Arc<dyn AudioTranscoderPort>,
    vorbis_quality: f32,
}

impl EncoderFactory {
    pub fn new(transcoder: Arc<dyn AudioTranscoderPort>, vorbis_quality: f32) -> Self {
        Self {
            transcoder,
            vorbis_quality,
        }
    }

    pub fn create(&self, format: AudioFormat, sample_rate: u32) -> Box<dyn AudioStreamEncoder> {
        match format {
            AudioFormat::Pcm => Box::new(PcmEncoder),
            AudioFormat::Wav => Box::new(WavEncoder::new(sample_rate)),
            AudioFormat::Vorbis => Box::new(VorbisEncoder::new(
                sample_rate,
                self.vorbis_quality,
                self.transcoder.clone(),
            )),
        }
    }

    /// 一次性编码完整缓冲区
    pub async fn encode_complete(
        &self,
        format: AudioFormat,
        sample_rate: u32,
        samples: &[f32],
    ) -> Result<Bytes, TranscodeError> {
        match format {
            AudioFormat::Pcm => Ok(Bytes::from(audio::encode_pcm_s16le(samples))),
            AudioFormat::Wav => Ok(Bytes::from(audio::encode_wav_complete(samples, sample_rate))),
            AudioFormat::Vorbis => {
                let wav = audio::encode_wav_complete(samples, sample_rate);
                let ogg = self
                    .transcoder
                    .encode_vorbis(&wav, self.vorbis_quality)
                    .await?;
                Ok(Bytes::from(ogg))
            }
        }
    }
}
