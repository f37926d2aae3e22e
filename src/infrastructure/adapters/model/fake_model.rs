//! Fake Model - 用于开发与测试的确定性模型
//!
//! 不加载任何权重，按文本长度生成正弦音：
//! - 每个字符约 60ms（受 speed 影响）
//! - 1 秒一块
//! - 可配置加载延迟、块间延迟以及强制失败

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;

use crate::application::ports::{
    AudioChunk, AudioStream, ModelError, ModelLoader, PromptArtifact, SynthesisInput,
    SynthesisModel, VoiceReference,
};

/// 正弦音频率
const TONE_HZ: f32 = 220.0;

/// 正弦音振幅
const TONE_AMPLITUDE: f32 = 0.3;

/// Fake Model 配置
#[derive(Debug, Clone)]
pub struct FakeModelConfig {
    /// 原生采样率
    pub sample_rate: u32,
    /// 每个字符对应的时长（毫秒）
    pub ms_per_char: u64,
    /// 每块时长
    pub chunk_duration: Duration,
    /// 模拟加载耗时
    pub load_delay: Duration,
    /// 模拟每块推理耗时
    pub chunk_delay: Duration,
    /// 加载总是失败
    pub fail_load: bool,
    /// 输出 n 块后报错
    pub fail_after_chunks: Option<usize>,
}

impl Default for FakeModelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            ms_per_char: 60,
            chunk_duration: Duration::from_secs(1),
            load_delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            fail_load: false,
            fail_after_chunks: None,
        }
    }
}

/// Fake Model Loader
pub struct FakeModelLoader {
    config: FakeModelConfig,
}

impl FakeModelLoader {
    pub fn new(config: FakeModelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelLoader for FakeModelLoader {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn load(&self) -> Result<Arc<dyn SynthesisModel>, ModelError> {
        if !self.config.load_delay.is_zero() {
            tokio::time::sleep(self.config.load_delay).await;
        }
        if self.config.fail_load {
            return Err(ModelError::LoadFailed("fake model configured to fail".into()));
        }
        tracing::debug!(sample_rate = self.config.sample_rate, "FakeModel loaded");
        Ok(Arc::new(FakeModel {
            config: self.config.clone(),
        }))
    }

    async fn release(&self, _model: Arc<dyn SynthesisModel>) -> Result<(), ModelError> {
        tracing::debug!("FakeModel released");
        Ok(())
    }
}

/// Fake Model
pub struct FakeModel {
    config: FakeModelConfig,
}

impl FakeModel {
    /// 文本对应的总样本数
    fn total_samples(&self, text: &str, speed: f32, sample_rate: u32) -> usize {
        let chars = text.chars().count().max(1) as f64;
        let seconds = chars * self.config.ms_per_char as f64 / 1000.0 / speed.max(0.1) as f64;
        (seconds * sample_rate as f64).round() as usize
    }
}

#[async_trait]
impl SynthesisModel for FakeModel {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    async fn prepare_prompt(
        &self,
        reference: &VoiceReference,
    ) -> Result<PromptArtifact, ModelError> {
        if reference.samples.is_empty() {
            return Err(ModelError::PromptFailed(format!(
                "reference audio for '{}' is empty",
                reference.voice_id
            )));
        }
        let summary = format!(
            "{}:{}:{}",
            reference.voice_id,
            reference.sample_rate,
            reference.samples.len()
        );
        Ok(PromptArtifact {
            voice_id: reference.voice_id.clone(),
            data: Bytes::from(summary),
        })
    }

    async fn synthesize(&self, input: SynthesisInput) -> Result<AudioStream, ModelError> {
        let sample_rate = input.sample_rate.unwrap_or(self.config.sample_rate);
        let total = self.total_samples(&input.text, input.params.speed, sample_rate);
        let chunk_len =
            ((sample_rate as f64 * self.config.chunk_duration.as_secs_f64()) as usize).max(1);
        let chunk_delay = self.config.chunk_delay;
        let fail_after = self.config.fail_after_chunks;

        tracing::debug!(
            voice_id = %input.prompt.voice_id,
            total_samples = total,
            sample_rate = sample_rate,
            "FakeModel synthesizing"
        );

        // state: (已输出样本数, 已输出块数, 是否结束)
        let chunks = stream::unfold((0usize, 0usize, false), move |(offset, index, done)| async move {
            if done || offset >= total {
                return None;
            }
            if Some(index) == fail_after {
                return Some((
                    Err(ModelError::SynthesisFailed("fake model failure".into())),
                    (offset, index, true),
                ));
            }
            if !chunk_delay.is_zero() {
                tokio::time::sleep(chunk_delay).await;
            }

            let end = (offset + chunk_len).min(total);
            let samples = (offset..end)
                .map(|n| {
                    let t = n as f32 / sample_rate as f32;
                    TONE_AMPLITUDE * (2.0 * std::f32::consts::PI * TONE_HZ * t).sin()
                })
                .collect();

            Some((
                Ok(AudioChunk {
                    samples,
                    sample_rate,
                }),
                (end, index + 1, false),
            ))
        });

        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    use crate::domain::synthesis::GenerationParams;
    use crate::domain::voice::VoiceId;

    fn input(text: &str, sample_rate: Option<u32>) -> SynthesisInput {
        let voice_id = VoiceId::parse("v1").unwrap();
        SynthesisInput {
            text: text.to_string(),
            prompt: PromptArtifact {
                voice_id,
                data: Bytes::new(),
            },
            params: GenerationParams::default(),
            sample_rate,
        }
    }

    async fn collect(model: &FakeModel, input: SynthesisInput) -> Vec<Result<AudioChunk, ModelError>> {
        model.synthesize(input).await.unwrap().collect().await
    }

    #[tokio::test]
    async fn test_duration_follows_text_length() {
        let model = FakeModel {
            config: FakeModelConfig::default(),
        };
        // 5 chars * 60ms = 300ms
        let chunks = collect(&model, input("Hello", None)).await;
        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.samples.len(), 7200);
        assert_eq!(chunk.sample_rate, 24000);
        assert!(chunk.samples.iter().all(|s| s.abs() <= TONE_AMPLITUDE + f32::EPSILON));
    }

    #[tokio::test]
    async fn test_one_second_chunks() {
        let model = FakeModel {
            config: FakeModelConfig::default(),
        };
        // 50 chars = 3s at 16 kHz
        let chunks = collect(&model, input(&"a".repeat(50), Some(16000))).await;
        let lens: Vec<usize> = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().samples.len())
            .collect();
        assert_eq!(lens, vec![16000, 16000, 16000]);
    }

    #[tokio::test]
    async fn test_forced_failure_ends_stream() {
        let model = FakeModel {
            config: FakeModelConfig {
                fail_after_chunks: Some(1),
                ..Default::default()
            },
        };
        let chunks = collect(&model, input(&"a".repeat(50), None)).await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        assert!(chunks[1].is_err());
    }

    #[tokio::test]
    async fn test_loader_failure() {
        let loader = FakeModelLoader::new(FakeModelConfig {
            fail_load: true,
            ..Default::default()
        });
        assert!(matches!(loader.load().await, Err(ModelError::LoadFailed(_))));
    }

    #[tokio::test]
    async fn test_prompt_requires_audio() {
        let model = FakeModel {
            config: FakeModelConfig::default(),
        };
        let voice_id = VoiceId::parse("v1").unwrap();
        let empty = VoiceReference {
            voice_id: voice_id.clone(),
            samples: Arc::from(Vec::<f32>::new()),
            sample_rate: 24000,
            transcript: "x".into(),
        };
        assert!(model.prepare_prompt(&empty).await.is_err());

        let reference = VoiceReference {
            samples: Arc::from(vec![0.0f32; 10]),
            ..empty
        };
        let prompt = model.prepare_prompt(&reference).await.unwrap();
        assert_eq!(prompt.voice_id, voice_id);
    }
}
