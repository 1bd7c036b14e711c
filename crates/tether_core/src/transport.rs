//! Persistent-channel transport abstraction.
//!
//! [`ChannelTransport`] wraps one live push-channel connection;
//! [`TransportConnector`] dials new ones. The reconnect supervisor owns the
//! transport instance exclusively and replaces it wholesale on reconnect —
//! nothing else ever holds the connection.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a channel transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Dialing the channel failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// A send on the open channel failed.
    #[error("send failed: {0}")]
    SendFailed(String),
    /// The channel closed underneath us.
    #[error("connection closed")]
    Closed,
    /// Anything else the underlying stack reports.
    #[error("{0}")]
    Other(String),
}

/// A message received from the persistent channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// A text frame (the patch-message protocol is text).
    Text(String),
    /// A binary frame; the engine ignores these.
    Binary(Vec<u8>),
    /// Keepalive ping.
    Ping(Vec<u8>),
    /// Keepalive pong.
    Pong(Vec<u8>),
    /// The server closed the channel.
    Close,
}

/// One live push-channel connection.
#[async_trait]
pub trait ChannelTransport: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Send a keepalive ping.
    async fn send_ping(&mut self) -> Result<(), ChannelError>;

    /// Receive the next frame. `None` means the stream ended.
    async fn recv(&mut self) -> Option<Result<WsMessage, ChannelError>>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// Dials new channel connections for the reconnect supervisor.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// The transport type this connector produces.
    type Transport: ChannelTransport;

    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Self::Transport, ChannelError>;
}

/// Connection lifecycle status published by the reconnect supervisor.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No connection and no attempt in flight.
    Disconnected,
    /// Dialing the channel.
    Connecting,
    /// Channel open and delivering messages.
    Connected,
    /// Channel lost; a retry is scheduled.
    Reconnecting {
        /// Consecutive attempt number since the last successful open.
        attempt: u32,
    },
}

/// Callback type for connection status changes.
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;
