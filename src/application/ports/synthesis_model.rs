//! Synthesis Model Port - 合成模型抽象
//!
//! 神经网络合成被视为不透明的流式函数：
//! `text + prompt + params -> stream of (samples, sample_rate)`。
//! 具体实现在 infrastructure/adapters/model 层。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

use super::VoiceReference;
use crate::domain::synthesis::GenerationParams;
use crate::domain::voice::VoiceId;

/// 模型错误
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model load failed: {0}")]
    LoadFailed(String),

    #[error("Model release failed: {0}")]
    ReleaseFailed(String),

    #[error("Prompt preparation failed: {0}")]
    PromptFailed(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 预计算的音色提示（不透明）
///
/// 与加载它的模型实例绑定，模型卸载后失效。
#[derive(Debug, Clone, PartialEq)]
pub struct PromptArtifact {
    pub voice_id: VoiceId,
    pub data: Bytes,
}

/// 一次合成调用的输入
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub text: String,
    pub prompt: PromptArtifact,
    pub params: GenerationParams,
    /// 输出采样率覆盖，None 表示使用模型原生采样率
    pub sample_rate: Option<u32>,
}

/// 合成流中的一块音频
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// 归一化到 [-1, 1] 的单声道样本
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// 合成输出流：有限、不可重启，任意位置可能出错
pub type AudioStream = BoxStream<'static, Result<AudioChunk, ModelError>>;

/// 已加载的模型句柄
#[async_trait]
pub trait SynthesisModel: Send + Sync {
    /// 模型原生输出采样率
    fn sample_rate(&self) -> u32;

    /// 为参考音频预计算提示（昂贵操作，结果由 PromptCache 缓存）
    async fn prepare_prompt(&self, reference: &VoiceReference)
        -> Result<PromptArtifact, ModelError>;

    /// 开始一次流式合成
    async fn synthesize(&self, input: SynthesisInput) -> Result<AudioStream, ModelError>;
}

/// 模型加载器
///
/// 负责昂贵资源的获取与释放，由 ModelManager 串行调用
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;

    async fn load(&self) -> Result<Arc<dyn SynthesisModel>, ModelError>;

    async fn release(&self, model: Arc<dyn SynthesisModel>) -> Result<(), ModelError>;
}
