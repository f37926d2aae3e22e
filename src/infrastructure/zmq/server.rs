//! ZMQ ROUTER Server
//!
//! 单个 socket 所有者任务同时负责收和发：
//! - 入站消息 `[identity 帧..., payload]` → 每条消息一个处理任务
//! - 处理任务经 mpsc 提交响应帧，所有者写出 `[identity 帧..., msg_type, data]`
//! - identity 帧（含客户端自带的空分隔帧）原样回写，不额外插入分隔帧
//! - 配置了 PUB 地址时改为广播 `[msg_type, data]`

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use zeromq::{PubSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use super::sink::{Outbound, ZmqFrameSink};
use crate::application::RequestRouter;

/// 出站队列容量
const OUTBOUND_BUFFER: usize = 64;

/// 传输层错误
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },
}

/// ZMQ 服务器配置
#[derive(Debug, Clone)]
pub struct ZmqServerConfig {
    pub bind_address: String,
    pub pub_address: Option<String>,
}

impl Default for ZmqServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "tcp://127.0.0.1:20501".to_string(),
            pub_address: None,
        }
    }
}

/// ZMQ 服务器（未绑定）
pub struct ZmqServer {
    config: ZmqServerConfig,
    router: Arc<RequestRouter>,
}

impl ZmqServer {
    pub fn new(config: ZmqServerConfig, router: Arc<RequestRouter>) -> Self {
        Self { config, router }
    }

    /// 绑定 ROUTER（以及可选的 PUB）socket
    pub async fn bind(self) -> Result<BoundZmqServer, TransportError> {
        let mut socket = RouterSocket::new();
        let endpoint = socket
            .bind(&self.config.bind_address)
            .await
            .map_err(|e| TransportError::Bind {
                address: self.config.bind_address.clone(),
                message: e.to_string(),
            })?;

        let publisher = match &self.config.pub_address {
            Some(address) => {
                let mut publisher = PubSocket::new();
                publisher
                    .bind(address)
                    .await
                    .map_err(|e| TransportError::Bind {
                        address: address.clone(),
                        message: e.to_string(),
                    })?;
                info!(address = %address, "ZMQ PUB broadcast enabled");
                Some(publisher)
            }
            None => None,
        };

        Ok(BoundZmqServer {
            socket,
            publisher,
            endpoint: endpoint.to_string(),
            router: self.router,
        })
    }

    /// 绑定并运行直到 shutdown 被取消；绑定失败立即返回
    pub async fn run_with_shutdown(self, shutdown: CancellationToken) -> Result<(), TransportError> {
        self.bind().await?.serve(shutdown).await;
        Ok(())
    }
}

/// 已绑定的 ZMQ 服务器
pub struct BoundZmqServer {
    socket: RouterSocket,
    publisher: Option<PubSocket>,
    endpoint: String,
    router: Arc<RequestRouter>,
}

impl BoundZmqServer {
    /// 实际监听地址
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// socket 所有者循环
    pub async fn serve(self, shutdown: CancellationToken) {
        let Self {
            mut socket,
            mut publisher,
            endpoint,
            router,
        } = self;
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);

        info!(endpoint = %endpoint, "ZMQ ROUTER server listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = socket.recv() => match received {
                    Ok(message) => {
                        spawn_request(&router, message, &outbound_tx, &shutdown);
                    }
                    Err(e) => warn!(error = %e, "ZMQ receive error"),
                },
                Some(outbound) = outbound_rx.recv() => {
                    let delivered = deliver(&mut socket, publisher.as_mut(), &outbound).await;
                    let _ = outbound.ack.send(delivered);
                }
            }
        }

        info!(endpoint = %endpoint, "ZMQ server stopped");
    }
}

/// 拆出 identity（payload 之前的全部帧）与 payload（最后一帧）；少于两帧返回 None
fn split_message(message: ZmqMessage) -> Option<(Vec<Bytes>, Bytes)> {
    let mut frames = message.into_vec();
    if frames.len() < 2 {
        return None;
    }
    let payload = frames.pop()?;
    Some((frames, payload))
}

/// 日志用：非空 identity 帧的十六进制，按跳以 `/` 连接
fn client_label(identity: &[Bytes]) -> String {
    identity
        .iter()
        .filter(|frame| !frame.is_empty())
        .map(|frame| frame.iter().map(|b| format!("{:02x}", b)).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

/// 回复消息：`[identity 帧..., msg_type, data]`
fn reply_message(identity: &[Bytes], kind: Bytes, data: Bytes) -> ZmqMessage {
    let mut message = ZmqMessage::from(kind);
    message.push_back(data);
    for frame in identity.iter().rev() {
        message.push_front(frame.clone());
    }
    message
}

fn spawn_request(
    router: &Arc<RequestRouter>,
    message: ZmqMessage,
    outbound: &mpsc::Sender<Outbound>,
    shutdown: &CancellationToken,
) {
    let frame_count = message.len();
    let Some((identity, payload)) = split_message(message) else {
        warn!(
            frames = frame_count,
            "Invalid message format: expected at least 2 frames"
        );
        return;
    };

    let span = info_span!("zmq_request", client = %client_label(&identity));
    let router = router.clone();
    let sink = ZmqFrameSink::new(identity, outbound.clone());
    let cancel = shutdown.child_token();

    tokio::spawn(
        async move {
            router.handle_message(&payload, &sink, &cancel).await;
        }
        .instrument(span),
    );
}

async fn deliver(
    socket: &mut RouterSocket,
    publisher: Option<&mut PubSocket>,
    outbound: &Outbound,
) -> bool {
    let kind = Bytes::from_static(outbound.frame.kind.as_str().as_bytes());

    let result = match publisher {
        Some(publisher) => {
            let mut message = ZmqMessage::from(kind);
            message.push_back(outbound.frame.bytes.clone());
            publisher.send(message).await
        }
        None => {
            let message = reply_message(&outbound.identity, kind, outbound.frame.bytes.clone());
            socket.send(message).await
        }
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(
                client = %client_label(&outbound.identity),
                error = %e,
                "Failed to deliver frame"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use zeromq::DealerSocket;

    use crate::application::router::tests::build_services;
    use crate::application::testing::{StubModel, StubModelManager, StubVoiceStore};

    fn router(model: StubModel) -> Arc<RequestRouter> {
        let services = build_services(
            Arc::new(StubVoiceStore::with_voices(&["v1"])),
            Arc::new(StubModelManager::new(model)),
        );
        Arc::new(RequestRouter::new(services, None))
    }

    fn frames(parts: &[&'static [u8]]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from_static(p)).collect()
    }

    fn message(parts: &[&'static [u8]]) -> ZmqMessage {
        let mut parts = frames(parts).into_iter();
        let mut message = ZmqMessage::from(parts.next().unwrap());
        for part in parts {
            message.push_back(part);
        }
        message
    }

    #[test]
    fn test_split_message_keeps_every_identity_frame() {
        let (identity, payload) = split_message(message(&[b"id", b"", b"payload"])).unwrap();
        assert_eq!(identity, frames(&[b"id", b""]));
        assert_eq!(payload.as_ref(), b"payload");

        let (identity, payload) =
            split_message(message(&[b"hop1", b"hop2", b"payload"])).unwrap();
        assert_eq!(identity, frames(&[b"hop1", b"hop2"]));
        assert_eq!(payload.as_ref(), b"payload");

        let (identity, _) = split_message(message(&[b"id", b"payload"])).unwrap();
        assert_eq!(identity, frames(&[b"id"]));

        assert!(split_message(message(&[b"id"])).is_none());
    }

    #[test]
    fn test_reply_echoes_identity_without_extra_delimiter() {
        let reply = reply_message(
            &frames(&[b"hop1", b"hop2"]),
            Bytes::from_static(b"audio"),
            Bytes::from_static(b"data"),
        );
        assert_eq!(reply.into_vec(), frames(&[b"hop1", b"hop2", b"audio", b"data"]));

        let reply = reply_message(
            &frames(&[b"id", b""]),
            Bytes::from_static(b"complete"),
            Bytes::from_static(b"{}"),
        );
        assert_eq!(reply.into_vec(), frames(&[b"id", b"", b"complete", b"{}"]));
    }

    #[test]
    fn test_client_label() {
        assert_eq!(
            client_label(&[Bytes::from_static(&[0x00, 0xab]), Bytes::new(), Bytes::from_static(&[0x10])]),
            "00ab/10"
        );
    }

    #[tokio::test]
    async fn test_concurrent_clients_are_isolated() {
        let router = router(StubModel::new(3, 10));
        let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);

        let collector = tokio::spawn(async move {
            let mut by_client: HashMap<Vec<Bytes>, Vec<&'static str>> = HashMap::new();
            while let Some(outbound) = rx.recv().await {
                by_client
                    .entry(outbound.identity.clone())
                    .or_default()
                    .push(outbound.frame.kind.as_str());
                let _ = outbound.ack.send(true);
            }
            by_client
        });

        let payload = br#"{"api_key":"secret","text":"Hello","voice_id":"v1"}"#;
        let mut handles = Vec::new();
        for name in ["alpha", "beta"] {
            let router = router.clone();
            let sink = ZmqFrameSink::new(vec![Bytes::from(name)], tx.clone());
            handles.push(tokio::spawn(async move {
                router
                    .handle_message(payload, &sink, &CancellationToken::new())
                    .await;
            }));
        }
        drop(tx);
        for handle in handles {
            handle.await.unwrap();
        }

        let by_client = collector.await.unwrap();
        for name in ["alpha", "beta"] {
            assert_eq!(
                by_client[&vec![Bytes::from(name)]],
                vec!["metadata", "audio", "audio", "audio", "complete"]
            );
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let server = ZmqServer::new(
            ZmqServerConfig {
                bind_address: "not-an-endpoint".to_string(),
                pub_address: None,
            },
            router(StubModel::new(1, 10)),
        );
        assert!(matches!(
            server.bind().await,
            Err(TransportError::Bind { .. })
        ));
    }

    async fn serve_on_loopback() -> (String, CancellationToken, tokio::task::JoinHandle<()>) {
        let server = ZmqServer::new(
            ZmqServerConfig {
                bind_address: "tcp://127.0.0.1:0".to_string(),
                pub_address: None,
            },
            router(StubModel::new(1, 10)),
        )
        .bind()
        .await
        .unwrap();
        let endpoint = server.endpoint().to_string();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(shutdown.clone()));
        (endpoint, shutdown, handle)
    }

    async fn health_reply(endpoint: &str, request: ZmqMessage) -> Vec<Bytes> {
        let mut client = DealerSocket::new();
        client.connect(endpoint).await.unwrap();
        client.send(request).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), client.recv())
            .await
            .unwrap()
            .unwrap()
            .into_vec()
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let (endpoint, shutdown, handle) = serve_on_loopback().await;

        // 不带分隔帧：回复只有 [msg_type, data]
        let reply = health_reply(&endpoint, message(&[br#"{"type":"health"}"#])).await;
        assert_eq!(reply.len(), 2);
        assert_eq!(reply[0].as_ref(), b"response");
        let body: serde_json::Value = serde_json::from_slice(&reply[1]).unwrap();
        assert_eq!(body["status"], "healthy");

        // 带空分隔帧：分隔帧原样回写
        let reply = health_reply(&endpoint, message(&[b"", br#"{"type":"health"}"#])).await;
        assert_eq!(reply.len(), 3);
        assert!(reply[0].is_empty());
        assert_eq!(reply[1].as_ref(), b"response");

        shutdown.cancel();
        handle.await.unwrap();
    }
}
