//! Synthesis Context - 响应帧
//!
//! 一次请求的响应由若干帧组成，顺序严格为：
//! `metadata → audio* → complete`，或在任意位置以单个 `error` 终止。

use bytes::Bytes;
use serde_json::json;

use super::AudioFormat;

/// 帧类型（多路复用传输中作为 msgType 帧发送）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Metadata,
    Audio,
    Complete,
    Error,
    Response,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Metadata => "metadata",
            FrameKind::Audio => "audio",
            FrameKind::Complete => "complete",
            FrameKind::Error => "error",
            FrameKind::Response => "response",
        }
    }

    /// 是否为终止帧
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FrameKind::Complete | FrameKind::Error | FrameKind::Response
        )
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 传输无关的响应帧
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Metadata {
        sample_rate: u32,
        audio_format: AudioFormat,
    },
    Audio(Bytes),
    Complete {
        chunks: usize,
    },
    Error {
        message: String,
    },
    Response(serde_json::Value),
}

/// 线上发送单元
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    pub kind: FrameKind,
    pub bytes: Bytes,
}

impl Frame {
    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Metadata { .. } => FrameKind::Metadata,
            Frame::Audio(_) => FrameKind::Audio,
            Frame::Complete { .. } => FrameKind::Complete,
            Frame::Error { .. } => FrameKind::Error,
            Frame::Response(_) => FrameKind::Response,
        }
    }

    /// JSON 表示（audio 帧没有 JSON 表示）
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Frame::Metadata {
                sample_rate,
                audio_format,
            } => Some(json!({
                "status": "streaming",
                "sample_rate": sample_rate,
                "audio_format": audio_format,
            })),
            Frame::Audio(_) => None,
            Frame::Complete { chunks } => Some(json!({
                "status": "complete",
                "chunks": chunks,
            })),
            Frame::Error { message } => Some(json!({ "error": message })),
            Frame::Response(value) => Some(value.clone()),
        }
    }

    /// 编码为线上帧：audio 为原始字节，其余为 UTF-8 JSON
    pub fn encode(&self) -> EncodedFrame {
        let bytes = match self {
            Frame::Audio(data) => data.clone(),
            other => other
                .to_json()
                .map(|v| Bytes::from(v.to_string()))
                .unwrap_or_default(),
        };
        EncodedFrame {
            kind: self.kind(),
            bytes,
        }
    }
}
