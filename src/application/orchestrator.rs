//! Synthesis Orchestrator - 合成编排
//!
//! 将一个 SynthesisRequest 转换为有序的响应帧序列:
//! 1. 确认音色存在（失败时不产生任何输出）
//! 2. ensure_loaded 获取模型租约
//! 3. 从 PromptCache 取提示，未命中时解码参考音频并预计算
//! 4. 获取合成槽位，启动合成流
//! 5. 发送 metadata，逐块编码并发送 audio
//! 6. finalize 编码器，发送 complete
//!
//! 写入失败或取消令牌触发时立即停止拉取合成流。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::codec::EncoderFactory;
use crate::application::error::GatewayError;
use crate::application::ports::{
    FrameSink, ModelManagerPort, PromptArtifact, PromptCachePort, SynthesisInput, SynthesisModel,
    VoiceStorePort,
};
use crate::domain::synthesis::{Frame, SynthesisRequest};

/// 合成编排器
pub struct SynthesisOrchestrator {
    voice_store: Arc<dyn VoiceStorePort>,
    model_manager: Arc<dyn ModelManagerPort>,
    prompt_cache: Arc<dyn PromptCachePort>,
    encoders: EncoderFactory,
    /// 合成并发槽位（模型调用不保证可重入）
    synthesis_slots: Arc<Semaphore>,
}

impl SynthesisOrchestrator {
    pub fn new(
        voice_store: Arc<dyn VoiceStorePort>,
        model_manager: Arc<dyn ModelManagerPort>,
        prompt_cache: Arc<dyn PromptCachePort>,
        encoders: EncoderFactory,
        max_concurrent_synthesis: usize,
    ) -> Self {
        Self {
            voice_store,
            model_manager,
            prompt_cache,
            encoders,
            synthesis_slots: Arc::new(Semaphore::new(max_concurrent_synthesis.max(1))),
        }
    }

    /// 执行一次合成，返回实际发送的 audio 帧数
    ///
    /// 出错时不发送 error 帧，由调用方在任务边界决定如何上报
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        sink: &dyn FrameSink,
        cancel: &CancellationToken,
    ) -> Result<usize, GatewayError> {
        let voice_id = request.voice_id();

        if !self.voice_store.voice_exists(voice_id).await? {
            return Err(GatewayError::voice_not_found(voice_id));
        }

        let lease = self.model_manager.ensure_loaded().await?;
        let model = lease.model();
        let prompt = self.prompt_for(request, model.as_ref()).await?;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Disconnected),
            permit = self.synthesis_slots.acquire() => permit
                .map_err(|_| GatewayError::internal("synthesis slots closed"))?,
        };

        let sample_rate = request.sample_rate().unwrap_or_else(|| model.sample_rate());
        let format = request.audio_format();

        let mut stream = model
            .synthesize(SynthesisInput {
                text: request.text().to_string(),
                prompt,
                params: request.params().clone(),
                sample_rate: request.sample_rate(),
            })
            .await?;

        sink.send(Frame::Metadata {
            sample_rate,
            audio_format: format,
        })
        .await?;

        let mut encoder = self.encoders.create(format, sample_rate);
        let mut sent = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(voice_id = %voice_id, chunks = sent, "Synthesis cancelled");
                    return Err(GatewayError::Disconnected);
                }
                item = stream.next() => item,
            };

            let Some(item) = next else { break };
            let chunk = item?;
            if chunk.sample_rate != sample_rate {
                return Err(GatewayError::Synthesis(format!(
                    "model produced {} Hz audio, expected {} Hz",
                    chunk.sample_rate, sample_rate
                )));
            }

            let bytes = encoder.encode_chunk(&chunk.samples);
            if !bytes.is_empty() {
                sink.send(Frame::Audio(bytes)).await?;
                sent += 1;
            }
        }
        drop(stream);

        let tail = encoder.finalize().await?;
        if !tail.is_empty() {
            sink.send(Frame::Audio(tail)).await?;
            sent += 1;
        }

        sink.send(Frame::Complete { chunks: sent }).await?;

        info!(
            voice_id = %voice_id,
            audio_format = %format,
            sample_rate = sample_rate,
            chunks = sent,
            "Synthesis complete"
        );

        Ok(sent)
    }

    /// 执行合成并在任务边界上报错误
    ///
    /// 除客户端断开外的所有错误都转换为单个 error 帧
    pub async fn synthesize_and_report(
        &self,
        request: &SynthesisRequest,
        sink: &dyn FrameSink,
        cancel: &CancellationToken,
    ) -> Option<usize> {
        match self.synthesize(request, sink, cancel).await {
            Ok(chunks) => Some(chunks),
            Err(err) => {
                report_error(&err, sink).await;
                None
            }
        }
    }

    async fn prompt_for(
        &self,
        request: &SynthesisRequest,
        model: &dyn SynthesisModel,
    ) -> Result<PromptArtifact, GatewayError> {
        let voice_id = request.voice_id();
        if let Some(prompt) = self.prompt_cache.get(voice_id) {
            debug!(voice_id = %voice_id, "Prompt cache hit");
            return Ok(prompt);
        }

        // 准备期间发生的失效会使本次写入作废
        let generation = self.prompt_cache.generation();
        let reference = self
            .voice_store
            .resolve_voice_reference(voice_id)
            .await?
            .ok_or_else(|| GatewayError::voice_not_found(voice_id))?;

        let prompt = model.prepare_prompt(&reference).await?;
        if self
            .prompt_cache
            .set(voice_id.clone(), prompt.clone(), generation)
        {
            debug!(voice_id = %voice_id, "Prompt cache miss, prepared");
        } else {
            debug!(voice_id = %voice_id, "Prompt prepared but cache was invalidated meanwhile");
        }
        Ok(prompt)
    }
}

/// 将错误转换为 error 帧发送（客户端断开时静默）
pub async fn report_error(err: &GatewayError, sink: &dyn FrameSink) {
    if !err.is_reportable() {
        debug!("Client disconnected, dropping response");
        return;
    }
    warn!(category = err.category(), error = %err, "Request failed");
    if sink.send(Frame::error(err.to_string())).await.is_err() {
        debug!("Client disconnected before error frame");
    }
}
