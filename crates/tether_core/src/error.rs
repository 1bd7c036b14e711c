//! Engine error types.

use thiserror::Error;

use crate::api::ApiError;
use crate::patch::PatchError;
use crate::transport::ChannelError;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, TetherError>;

/// Top-level error for engine operations.
#[derive(Debug, Error)]
pub enum TetherError {
    /// A request/response call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The persistent channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A patch batch was malformed and could not be applied.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A wire message could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The launch URL could not be parsed.
    #[error("invalid launch URL: {0}")]
    LaunchUrl(String),

    /// A command was issued before initialization finished.
    #[error("session is still initializing")]
    NotReady,

    /// The persistent channel has no active connection to send through.
    #[error("persistent channel is not connected")]
    ChannelClosed,
}
