//! HTTP Model Backend
//!
//! 通过 HTTP 调用外部推理 worker：
//! - GET  {url}/health         加载时探活，可返回 `{"sample_rate": n}`
//! - POST {url}/v1/prompt      参考音频 → 不透明提示字节
//! - POST {url}/v1/synthesize  流式返回小端 f32 样本，采样率见 X-Sample-Rate
//! - POST {url}/v1/unload      释放显存（尽力而为）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    AudioChunk, AudioStream, ModelError, ModelLoader, PromptArtifact, SynthesisInput,
    SynthesisModel, VoiceReference,
};
use crate::domain::synthesis::GenerationParams;

/// 采样率响应头
pub const SAMPLE_RATE_HEADER: &str = "x-sample-rate";

/// HTTP 后端配置
#[derive(Debug, Clone)]
pub struct HttpModelConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// 健康检查未声明采样率时使用
    pub default_sample_rate: u32,
}

impl Default for HttpModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(120),
            default_sample_rate: 24000,
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthBody {
    sample_rate: Option<u32>,
}

#[derive(Debug, Serialize)]
struct PromptBody<'a> {
    voice_id: &'a str,
    sample_rate: u32,
    transcript: &'a str,
    /// base64 编码的小端 f32 样本
    audio: String,
}

#[derive(Debug, Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    /// base64 编码的提示
    prompt: String,
    params: &'a GenerationParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
}

fn map_reqwest_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else if e.is_connect() {
        ModelError::NetworkError(format!("Connection failed: {}", e))
    } else {
        ModelError::NetworkError(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::InvalidResponse(format!(
        "HTTP {}: {}",
        status.as_u16(),
        body
    )))
}

fn encode_f32le(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn decode_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// 将任意切分的字节流按 4 字节边界重组为音频块
///
/// 流结束时残留不足 4 字节视为响应损坏。
pub fn rechunk_f32le<S, E>(inner: S, sample_rate: u32) -> AudioStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<S> {
        inner: std::pin::Pin<Box<S>>,
        pending: Vec<u8>,
        done: bool,
    }

    let state = State {
        inner: Box::pin(inner),
        pending: Vec::new(),
        done: false,
    };

    let chunks = stream::unfold(state, move |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.inner.next().await {
                Some(Ok(data)) => {
                    state.pending.extend_from_slice(&data);
                    let usable = state.pending.len() / 4 * 4;
                    if usable == 0 {
                        continue;
                    }
                    let samples = decode_f32le(&state.pending[..usable]);
                    state.pending.drain(..usable);
                    let chunk = AudioChunk {
                        samples,
                        sample_rate,
                    };
                    return Some((Ok(chunk), state));
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ModelError::NetworkError(e.to_string())), state));
                }
                None => {
                    state.done = true;
                    if state.pending.is_empty() {
                        return None;
                    }
                    let err = ModelError::InvalidResponse(format!(
                        "audio stream ended with {} trailing bytes",
                        state.pending.len()
                    ));
                    return Some((Err(err), state));
                }
            }
        }
    });

    Box::pin(chunks)
}

// ============================================================================
// Loader
// ============================================================================

/// HTTP 后端加载器
pub struct HttpModelLoader {
    client: Client,
    config: HttpModelConfig,
}

impl HttpModelLoader {
    pub fn new(config: HttpModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::LoadFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ModelLoader for HttpModelLoader {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn load(&self) -> Result<Arc<dyn SynthesisModel>, ModelError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| ModelError::LoadFailed(map_reqwest_error(e).to_string()))?;
        let response = check_status(response)
            .await
            .map_err(|e| ModelError::LoadFailed(e.to_string()))?;

        // 健康检查正文可选
        let sample_rate = response
            .json::<HealthBody>()
            .await
            .ok()
            .and_then(|b| b.sample_rate)
            .unwrap_or(self.config.default_sample_rate);

        tracing::info!(
            url = %self.config.base_url,
            sample_rate = sample_rate,
            "Inference backend reachable"
        );

        Ok(Arc::new(HttpModel {
            client: self.client.clone(),
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            sample_rate,
        }))
    }

    async fn release(&self, _model: Arc<dyn SynthesisModel>) -> Result<(), ModelError> {
        let response = self
            .client
            .post(self.url("/v1/unload"))
            .send()
            .await
            .map_err(|e| ModelError::ReleaseFailed(map_reqwest_error(e).to_string()))?;
        check_status(response)
            .await
            .map_err(|e| ModelError::ReleaseFailed(e.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// Model handle
// ============================================================================

/// 远端模型句柄
pub struct HttpModel {
    client: Client,
    base_url: String,
    sample_rate: u32,
}

#[async_trait]
impl SynthesisModel for HttpModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn prepare_prompt(
        &self,
        reference: &VoiceReference,
    ) -> Result<PromptArtifact, ModelError> {
        let body = PromptBody {
            voice_id: reference.voice_id.as_str(),
            sample_rate: reference.sample_rate,
            transcript: &reference.transcript,
            audio: STANDARD.encode(encode_f32le(&reference.samples)),
        };

        let response = self
            .client
            .post(format!("{}/v1/prompt", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response)
            .await
            .map_err(|e| ModelError::PromptFailed(e.to_string()))?;

        let data = response.bytes().await.map_err(map_reqwest_error)?;
        tracing::debug!(
            voice_id = %reference.voice_id,
            prompt_bytes = data.len(),
            "Prompt prepared"
        );

        Ok(PromptArtifact {
            voice_id: reference.voice_id.clone(),
            data,
        })
    }

    async fn synthesize(&self, input: SynthesisInput) -> Result<AudioStream, ModelError> {
        let body = SynthesizeBody {
            text: &input.text,
            prompt: STANDARD.encode(&input.prompt.data),
            params: &input.params,
            sample_rate: input.sample_rate,
        };

        let response = self
            .client
            .post(format!("{}/v1/synthesize", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response)
            .await
            .map_err(|e| ModelError::SynthesisFailed(e.to_string()))?;

        let sample_rate = response
            .headers()
            .get(SAMPLE_RATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok())
            .or(input.sample_rate)
            .unwrap_or(self.sample_rate);

        Ok(rechunk_f32le(response.bytes_stream(), sample_rate))
    }
}
