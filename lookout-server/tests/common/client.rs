//! WebSocket test client for protocol testing
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A connected viewer
pub struct TestClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl TestClient {
    /// Connect and consume the initial `client_update` and
    /// `processing_status` messages.
    #[allow(dead_code)]
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self::connect_raw(addr).await;
        client.expect("client_update").await;
        client.expect("processing_status").await;
        client
    }

    /// Connect without consuming anything
    pub async fn connect_raw(addr: SocketAddr) -> Self {
        let url = format!("ws://{}/ws", addr);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send JSON message
    #[allow(dead_code)]
    pub async fn send(&mut self, msg: Value) {
        self.send_raw(&msg.to_string()).await;
    }

    /// Send raw text message
    #[allow(dead_code)]
    pub async fn send_raw(&mut self, text: &str) {
        self.sink
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    /// Next JSON message of any type, or None on close or timeout
    #[allow(dead_code)]
    pub async fn next_message(&mut self, within: Duration) -> Option<Value> {
        let read = async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some(serde_json::from_str(&text).expect("Failed to parse JSON"));
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                    Some(Ok(_)) => continue,
                }
            }
        };
        tokio::time::timeout(within, read).await.ok().flatten()
    }

    /// Skip messages until one of type `kind` arrives
    #[allow(dead_code)]
    pub async fn expect(&mut self, kind: &str) -> Value {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_message(remaining).await {
                Some(msg) if msg["type"] == kind => return msg,
                Some(_) => continue,
                None => panic!("Expected {} message, got nothing", kind),
            }
        }
    }

    /// Assert no message of type `kind` arrives within `duration`
    #[allow(dead_code)]
    pub async fn expect_none(&mut self, kind: &str, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match self.next_message(remaining).await {
                Some(msg) => assert_ne!(msg["type"], kind, "Unexpected message: {}", msg),
                None => return,
            }
        }
    }

    /// Read until the server closes the socket; returns the close code
    #[allow(dead_code)]
    pub async fn expect_close(&mut self) -> Option<u16> {
        let read = async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => return None,
                }
            }
        };
        tokio::time::timeout(RECV_TIMEOUT, read)
            .await
            .expect("Expected the server to close the socket")
    }

    /// Close the connection
    #[allow(dead_code)]
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }

    /// Set display name
    #[allow(dead_code)]
    pub async fn join(&mut self, username: &str) {
        self.send(serde_json::json!({"type": "user_joined", "username": username}))
            .await;
    }
}
