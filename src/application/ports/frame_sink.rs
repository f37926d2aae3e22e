//! Frame Sink Port - 响应帧回写抽象
//!
//! 传输无关的"写回发起方"。ZMQ 按 identity 路由，
//! HTTP/WebSocket 则直接写入连接本身。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::synthesis::Frame;

/// 对端已断开，写入失败
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("client disconnected")]
pub struct SinkClosed;

/// Frame Sink Port
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// 发送一帧；返回 Err 表示对端已不可达，调用方应停止生产
    async fn send(&self, frame: Frame) -> Result<(), SinkClosed>;
}
