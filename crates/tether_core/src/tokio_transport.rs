//! Tokio-tungstenite channel transport.
//!
//! Wraps `tokio_tungstenite::connect_async()` and implements the
//! [`ChannelTransport`] trait.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::transport::{ChannelError, ChannelTransport, TransportConnector, WsMessage};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`ChannelTransport`] backed by tokio-tungstenite.
pub struct TokioTransport {
    ws: WsStream,
}

impl TokioTransport {
    /// Connect to a WebSocket URL and return a `TokioTransport`.
    pub async fn connect(url: &str) -> Result<Self, ChannelError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|err| ChannelError::ConnectionFailed(err.to_string()))?;
        Ok(Self { ws })
    }
}

#[async_trait::async_trait]
impl ChannelTransport for TokioTransport {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| ChannelError::SendFailed(err.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), ChannelError> {
        self.ws
            .send(Message::Ping(vec![].into()))
            .await
            .map_err(|err| ChannelError::SendFailed(err.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<WsMessage, ChannelError>> {
        match self.ws.next().await {
            Some(Ok(Message::Text(text))) => Some(Ok(WsMessage::Text(text.to_string()))),
            Some(Ok(Message::Binary(data))) => Some(Ok(WsMessage::Binary(data.to_vec()))),
            Some(Ok(Message::Ping(data))) => Some(Ok(WsMessage::Ping(data.to_vec()))),
            Some(Ok(Message::Pong(data))) => Some(Ok(WsMessage::Pong(data.to_vec()))),
            Some(Ok(Message::Close(_))) => Some(Ok(WsMessage::Close)),
            Some(Ok(Message::Frame(_))) => {
                // Raw frames are not expected; skip.
                Some(Ok(WsMessage::Pong(vec![])))
            }
            Some(Err(err)) => Some(Err(ChannelError::Other(err.to_string()))),
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.ws
            .close(None)
            .await
            .map_err(|err| ChannelError::Other(err.to_string()))
    }
}

/// Connector that dials [`TokioTransport`] connections.
pub struct TokioConnector;

#[async_trait::async_trait]
impl TransportConnector for TokioConnector {
    type Transport = TokioTransport;

    async fn connect(&self, url: &str) -> Result<Self::Transport, ChannelError> {
        TokioTransport::connect(url).await
    }
}
