//! ZMQ Frame Sink
//!
//! 每个请求任务持有一个 sink，帧经 mpsc 交给 socket 所有者任务发送。
//! socket 所有者通过 oneshot 回报是否写出成功。
//! identity 为 payload 之前的全部帧，原样回写，经过代理的多跳路由也能送达。

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::application::ports::{FrameSink, SinkClosed};
use crate::domain::synthesis::{EncodedFrame, Frame};

/// 待发送的一帧
#[derive(Debug)]
pub struct Outbound {
    pub identity: Vec<Bytes>,
    pub frame: EncodedFrame,
    pub ack: oneshot::Sender<bool>,
}

/// 写回某个客户端 identity 的 sink
pub struct ZmqFrameSink {
    identity: Vec<Bytes>,
    outbound: mpsc::Sender<Outbound>,
}

impl ZmqFrameSink {
    pub fn new(identity: Vec<Bytes>, outbound: mpsc::Sender<Outbound>) -> Self {
        Self { identity, outbound }
    }

    pub fn identity(&self) -> &[Bytes] {
        &self.identity
    }
}

#[async_trait]
impl FrameSink for ZmqFrameSink {
    async fn send(&self, frame: Frame) -> Result<(), SinkClosed> {
        let (ack, delivered) = oneshot::channel();
        self.outbound
            .send(Outbound {
                identity: self.identity.clone(),
                frame: frame.encode(),
                ack,
            })
            .await
            .map_err(|_| SinkClosed)?;

        match delivered.await {
            Ok(true) => Ok(()),
            _ => Err(SinkClosed),
        }
    }
}
