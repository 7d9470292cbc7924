use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use tracing::debug;

/// Failures of the underlying connection
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    /// Peer sent a frame kind the protocol does not use
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(&'static str),

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

/// Text message channel a session runs over.
///
/// `recv` must be cancel safe: the session polls it alongside the tick timer.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound text frame; `None` once the peer has gone away
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection from our side
    async fn close(&mut self) {}
}

#[async_trait]
impl Transport for WebSocket {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match WebSocket::recv(self).await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                // pings are answered by the websocket layer itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Binary(_)) => {
                    return Some(Err(TransportError::UnsupportedFrame("binary")))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Close frame received");
                    return None;
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        WebSocket::send(self, Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = WebSocket::send(self, Message::Close(None)).await;
    }
}
