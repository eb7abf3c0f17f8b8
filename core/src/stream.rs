//! Streaming-phase connection.
//!
//! The server pushes frames over a receive-only websocket at `/ws/frames`.
//! [`MessageSource`] is the seam the orchestrator drains; the tungstenite
//! implementation lives here, and scripted implementations back the
//! session tests.

use crate::error::StreamError;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Source of inbound text messages. `Ok(None)` means the peer closed the
/// connection cleanly.
#[async_trait]
pub trait MessageSource: Send {
    async fn next_text(&mut self) -> Result<Option<String>, StreamError>;
}

/// The live websocket carrying frame messages.
pub struct FrameSocket {
    ws: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl FrameSocket {
    /// Open the frame socket. Connection-open failure is terminal for the
    /// session, so the wait here is bounded too.
    pub async fn connect(host: &str, timeout: Duration) -> Result<Self, StreamError> {
        let url = format!("wss://{}/ws/frames", host);
        crate::info_log!("connecting to {}", url);

        match tokio::time::timeout(timeout, connect_async(&url)).await {
            Ok(Ok((ws, _response))) => Ok(Self { ws }),
            Ok(Err(e)) => Err(StreamError::OpenFailed {
                url,
                reason: e.to_string(),
            }),
            Err(_) => Err(StreamError::OpenFailed {
                url,
                reason: format!("no response within {timeout:?}"),
            }),
        }
    }
}

#[async_trait]
impl MessageSource for FrameSocket {
    async fn next_text(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                // control frames and unexpected binary are not protocol
                // messages; keep reading
                Some(Ok(Message::Ping(_)))
                | Some(Ok(Message::Pong(_)))
                | Some(Ok(Message::Binary(_)))
                | Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => {
                    return Err(StreamError::Transport {
                        reason: e.to_string(),
                    })
                }
            }
        }
    }
}
