//! Collaborator seams: the narrow interfaces the engine calls out through.
//!
//! The engine never renders, presents dialogs, or runs actions itself.
//! Embedding environments implement these traits and hand them to the
//! engine at construction time; everything else stays internal.

use std::sync::Arc;

use serde_json::Value;

use crate::api::ApiError;
use crate::document::DocumentKind;

/// Receives transport errors and policy notices for user presentation.
///
/// Called exactly once per failed request, and once per gated attempt in
/// preview mode (as an informational notice, `status == 0`).
pub trait ErrorSink: Send + Sync {
    /// Present `error` to the user.
    fn notify(&self, error: &ApiError);
}

/// Receives recognized `runAction` messages from the persistent channel.
pub trait ActionDispatcher: Send + Sync {
    /// Run `action` with its payload.
    fn dispatch(&self, action: &str, payload: Value);
}

/// Per-merge document-changed notification: which document, new version.
pub type ChangeCallback = Arc<dyn Fn(DocumentKind, u64) + Send + Sync>;
