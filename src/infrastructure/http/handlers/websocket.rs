//! WebSocket Handler - /stream
//!
//! 每个连接处理一次合成：
//! 1. 第一条消息为 JSON 请求（含 api_key）
//! 2. 文本帧 `{status: "streaming"}` → 二进制音频帧 → `{status: "complete"}`
//! 3. 任何失败发送 `{error}` 后关闭

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::envelope::{decode_payload, DecodedMessage, RequestEnvelope};
use crate::application::ports::{FrameSink, SinkClosed};
use crate::application::{GatewayError, GatewayServices};
use crate::domain::synthesis::{Frame, FrameKind, SynthesisRequest};
use crate::infrastructure::http::state::AppState;

/// 请求被拒绝：发送 `{error}` 并以 code 关闭
#[derive(Debug, PartialEq)]
struct Rejection {
    code: u16,
    message: String,
}

impl Rejection {
    fn policy(message: impl Into<String>) -> Self {
        Self {
            code: close_code::POLICY,
            message: message.into(),
        }
    }

    fn unsupported(message: impl Into<String>) -> Self {
        Self {
            code: close_code::UNSUPPORTED,
            message: message.into(),
        }
    }
}

/// 解码并认证第一条消息
fn prepare_request(
    services: &GatewayServices,
    payload: &[u8],
) -> Result<SynthesisRequest, Rejection> {
    match decode_payload(payload, false) {
        DecodedMessage::Envelope { api_key, request } => {
            services
                .auth
                .verify(api_key.as_deref())
                .map_err(|e| Rejection::policy(e.to_string()))?;

            match request {
                RequestEnvelope::Synthesize(payload) => payload
                    .into_request()
                    .map_err(|e| Rejection::unsupported(format!("Invalid request: {}", e))),
                other => Err(Rejection::unsupported(format!(
                    "Unsupported request type on stream: {}",
                    other.type_name()
                ))),
            }
        }
        other => Err(Rejection::unsupported(
            other
                .error_message()
                .unwrap_or_else(|| "Invalid request".to_string()),
        )),
    }
}

/// 写回 WebSocket 的 sink
struct WsFrameSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsFrameSink {
    async fn send_message(&self, message: Message) -> Result<(), SinkClosed> {
        self.sender
            .lock()
            .await
            .send(message)
            .await
            .map_err(|_| SinkClosed)
    }

    async fn close(&self, code: u16, reason: &'static str) {
        let frame = CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        };
        let _ = self.send_message(Message::Close(Some(frame))).await;
    }

    async fn reject(&self, rejection: Rejection) {
        let _ = self.send(Frame::error(rejection.message)).await;
        self.close(rejection.code, "").await;
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&self, frame: Frame) -> Result<(), SinkClosed> {
        let encoded = frame.encode();
        let message = match encoded.kind {
            FrameKind::Audio => Message::Binary(encoded.bytes.to_vec()),
            _ => Message::Text(String::from_utf8_lossy(&encoded.bytes).into_owned()),
        };
        self.send_message(message).await
    }
}

/// GET /stream
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream_socket(socket, state))
}

async fn handle_stream_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sink = WsFrameSink {
        sender: Mutex::new(sender),
    };

    // 等待第一条请求消息
    let payload = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text.into_bytes(),
            Some(Ok(Message::Binary(data))) => break data,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket error before request");
                return;
            }
        }
    };

    let request = match prepare_request(&state.services, &payload) {
        Ok(request) => request,
        Err(rejection) => {
            tracing::warn!(code = rejection.code, error = %rejection.message, "WebSocket request rejected");
            sink.reject(rejection).await;
            return;
        }
    };

    tracing::info!(
        voice_id = %request.voice_id(),
        audio_format = %request.audio_format(),
        "WebSocket synthesis started"
    );

    // 客户端关闭即取消合成
    let cancel = CancellationToken::new();
    let watcher_cancel = cancel.clone();
    let watcher = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
        watcher_cancel.cancel();
    });

    let result = state
        .services
        .orchestrator
        .synthesize(&request, &sink, &cancel)
        .await;
    watcher.abort();

    match result {
        Ok(_) => sink.close(close_code::NORMAL, "").await,
        Err(GatewayError::Disconnected) => {
            tracing::info!(voice_id = %request.voice_id(), "WebSocket client disconnected");
        }
        Err(err @ GatewayError::NotFound { .. }) => {
            sink.reject(Rejection::unsupported(err.to_string())).await;
        }
        Err(err) => {
            tracing::warn!(category = err.category(), error = %err, "WebSocket synthesis failed");
            let _ = sink.send(Frame::error(err.to_string())).await;
            sink.close(close_code::NORMAL, "").await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::{routing::get, Router};
    use tokio_tungstenite::{
        connect_async,
        tungstenite::{protocol::frame::coding::CloseCode, Message as WsMessage},
    };

    use crate::application::router::tests::build_services;
    use crate::application::testing::{StubModel, StubModelManager, StubVoiceStore};

    fn services() -> Arc<GatewayServices> {
        build_services(
            Arc::new(StubVoiceStore::with_voices(&["v1"])),
            Arc::new(StubModelManager::new(StubModel::new(1, 10))),
        )
    }

    #[test]
    fn test_bad_key_is_policy_violation() {
        let rejection = prepare_request(
            &services(),
            br#"{"api_key":"nope","text":"Hi","voice_config":{"voice_id":"v1"}}"#,
        )
        .unwrap_err();
        assert_eq!(rejection.code, 1008);
        assert_eq!(rejection.message, "Invalid or missing API key");
    }

    #[test]
    fn test_invalid_request_is_unsupported() {
        let rejection = prepare_request(
            &services(),
            br#"{"api_key":"secret","text":"","voice_config":{"voice_id":"v1"}}"#,
        )
        .unwrap_err();
        assert_eq!(rejection.code, 1003);
        assert!(rejection.message.starts_with("Invalid request"));

        let rejection = prepare_request(&services(), b"not json").unwrap_err();
        assert_eq!(rejection.code, 1003);
        assert_eq!(rejection.message, "Invalid JSON");

        let rejection =
            prepare_request(&services(), br#"{"api_key":"secret","type":"list_voices"}"#)
                .unwrap_err();
        assert_eq!(rejection.code, 1003);
    }

    #[test]
    fn test_valid_request() {
        let request = prepare_request(
            &services(),
            br#"{"api_key":"secret","text":"Hi","audio_format":"wav","voice_config":{"voice_id":"v1"}}"#,
        )
        .unwrap();
        assert_eq!(request.voice_id().as_str(), "v1");
        assert_eq!(request.audio_format().as_str(), "wav");
    }

    // ========================================================================
    // 端到端：真实监听端口 + WebSocket 客户端
    // ========================================================================

    const REQUEST: &str =
        r#"{"api_key":"secret","text":"Hello","audio_format":"pcm","voice_config":{"voice_id":"v1"}}"#;

    async fn serve(model: StubModel) -> String {
        let services = build_services(
            Arc::new(StubVoiceStore::with_voices(&["v1"])),
            Arc::new(StubModelManager::new(model)),
        );
        let state = Arc::new(AppState::new(services, 1024));
        let app = Router::new()
            .route("/stream", get(stream_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{}/stream", addr)
    }

    /// 读到关闭帧（或连接结束）为止
    async fn read_until_close<S>(ws: &mut S) -> Vec<WsMessage>
    where
        S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let mut messages = Vec::new();
        let read = async {
            while let Some(Ok(message)) = ws.next().await {
                let closed = matches!(message, WsMessage::Close(_));
                messages.push(message);
                if closed {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), read).await.unwrap();
        messages
    }

    fn json(message: &WsMessage) -> serde_json::Value {
        match message {
            WsMessage::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    fn close_code_of(message: Option<&WsMessage>) -> CloseCode {
        match message {
            Some(WsMessage::Close(Some(frame))) => frame.code,
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_session_sequence() {
        let url = serve(StubModel::new(3, 10)).await;
        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
        ws.send(WsMessage::Text(REQUEST.to_string())).await.unwrap();

        let messages = read_until_close(&mut ws).await;
        assert_eq!(messages.len(), 6);

        let metadata = json(&messages[0]);
        assert_eq!(metadata["status"], "streaming");
        assert_eq!(metadata["sample_rate"], 24000);
        assert_eq!(metadata["audio_format"], "pcm");

        for message in &messages[1..4] {
            match message {
                WsMessage::Binary(data) => assert_eq!(data.len(), 10 * 2),
                other => panic!("expected binary audio frame, got {:?}", other),
            }
        }

        let complete = json(&messages[4]);
        assert_eq!(complete["status"], "complete");
        assert_eq!(complete["chunks"], 3);
        assert_eq!(close_code_of(messages.get(5)), CloseCode::Normal);
    }

    #[tokio::test]
    async fn test_stream_bad_key_closes_with_policy() {
        let url = serve(StubModel::new(3, 10)).await;
        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
        ws.send(WsMessage::Text(
            r#"{"api_key":"nope","text":"Hello","voice_config":{"voice_id":"v1"}}"#.to_string(),
        ))
        .await
        .unwrap();

        let messages = read_until_close(&mut ws).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(json(&messages[0])["error"], "Invalid or missing API key");
        let code = close_code_of(messages.get(1));
        assert_eq!(code, CloseCode::Policy);
        assert_eq!(u16::from(code), 1008);
    }

    #[tokio::test]
    async fn test_client_close_cancels_synthesis() {
        let total = 1000;
        let mut model = StubModel::new(total, 10);
        model.chunk_delay = Some(Duration::from_millis(10));
        let pulled = model.pulled.clone();
        let url = serve(model).await;

        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
        ws.send(WsMessage::Text(REQUEST.to_string())).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(json(&first)["status"], "streaming");
        let audio = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(audio, WsMessage::Binary(_)));

        ws.send(WsMessage::Close(None)).await.unwrap();
        drop(ws);

        // 取消后不再拉取合成流
        tokio::time::sleep(Duration::from_millis(200)).await;
        let after_close = pulled.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), after_close);
        assert!(after_close < total);
    }
}
