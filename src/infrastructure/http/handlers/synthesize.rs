//! Synthesize Handler - 分块流式合成
//!
//! 合成在独立任务中运行，帧经 mpsc 通道回到 handler：
//! - 第一帧之前的错误 → 普通 HTTP 错误响应
//! - metadata 到达后开始 chunked body，中途失败则中断 body
//! - body 被丢弃（客户端断开）时取消合成

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::application::envelope::SynthesizePayload;
use crate::application::ports::{FrameSink, SinkClosed};
use crate::application::GatewayError;
use crate::domain::synthesis::Frame;
use crate::infrastructure::http::dto::headers;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 通道容量（帧）
const FRAME_BUFFER: usize = 16;

type FrameResult = Result<Frame, GatewayError>;

/// 写入 mpsc 通道的 sink
struct ChannelSink {
    tx: mpsc::Sender<FrameResult>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: Frame) -> Result<(), SinkClosed> {
        self.tx.send(Ok(frame)).await.map_err(|_| SinkClosed)
    }
}

struct BodyState {
    rx: mpsc::Receiver<FrameResult>,
    _guard: DropGuard,
}

/// 将剩余帧转换为 body 字节流
fn audio_body(state: BodyState) -> Body {
    let chunks = stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            match state.rx.recv().await {
                Some(Ok(Frame::Audio(bytes))) => return Some((Ok::<Bytes, std::io::Error>(bytes), Some(state))),
                Some(Ok(Frame::Complete { .. })) | None => return None,
                Some(Ok(Frame::Error { message })) => {
                    return Some((Err(std::io::Error::other(message)), None));
                }
                Some(Err(err)) => {
                    return Some((Err(std::io::Error::other(err.to_string())), None));
                }
                Some(Ok(_)) => continue,
            }
        }
    });
    Body::from_stream(chunks)
}

/// POST /synthesize
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SynthesizePayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let request = payload
        .into_request()
        .map_err(|e| ApiError::from(GatewayError::from(e)))?;

    let (tx, mut rx) = mpsc::channel::<FrameResult>(FRAME_BUFFER);
    let cancel = CancellationToken::new();

    let orchestrator = state.services.orchestrator.clone();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        let sink = ChannelSink { tx: tx.clone() };
        if let Err(err) = orchestrator.synthesize(&request, &sink, &task_cancel).await {
            if err.is_reportable() {
                let _ = tx.send(Err(err)).await;
            } else {
                tracing::debug!("HTTP client disconnected during synthesis");
            }
        }
    });

    let guard = cancel.drop_guard();

    match rx.recv().await {
        Some(Ok(Frame::Metadata {
            sample_rate,
            audio_format,
        })) => {
            let body = audio_body(BodyState { rx, _guard: guard });
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, audio_format.media_type())
                .header(headers::SAMPLE_RATE, sample_rate.to_string())
                .header(headers::AUDIO_FORMAT, audio_format.as_str())
                .body(body)
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
        Some(Err(err)) => Err(err.into()),
        Some(Ok(other)) => Err(ApiError::Internal(format!(
            "unexpected {} frame before metadata",
            other.kind()
        ))),
        None => Err(ApiError::Internal(
            "synthesis ended without output".to_string(),
        )),
    }
}
