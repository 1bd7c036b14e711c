//! Request/response transport: a thin POST client with uniform error
//! shaping, plus the outgoing-call throttle.
//!
//! Every failure is normalized into one [`ApiError`] shape, reported to the
//! [`ErrorSink`] exactly once, and propagated to the caller so dependent
//! call chains can abort.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hooks::ErrorSink;
use crate::protocol::INSPECTION_MODE_HEADER;

/// Message used when the backend returns no structured detail.
const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

/// Window for collapsing repeated outgoing calls.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(1000);

/// Detail block of an [`ApiError`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Optional short title for the detail block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Uniform error shape for failed request/response calls.
///
/// `status == 0` marks an informational notice (e.g. the preview-mode
/// gating message) rather than a transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{title} ({status}): {}", .details.message)]
pub struct ApiError {
    /// HTTP status code, or 0 for local notices.
    pub status: u16,
    /// Short error title.
    pub title: String,
    /// Detail block.
    pub details: ErrorDetails,
}

impl ApiError {
    /// Build an informational notice (not a transport failure).
    pub fn notice(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: 0,
            title: title.into(),
            details: ErrorDetails {
                message: message.into(),
                title: None,
            },
        }
    }

    /// True for informational notices.
    pub fn is_notice(&self) -> bool {
        self.status == 0
    }
}

/// Raw error body shape the backend may return.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<ErrorDetails>,
}

/// Normalize a non-2xx response into the uniform error shape.
///
/// Tries the structured body first; a `404` with no structured detail
/// reports "`<path>` not found"; everything else falls back to the generic
/// message.
fn shape_error(status: u16, path: &str, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
    let fallback_message = || {
        if status == 404 {
            format!("{path} not found")
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        }
    };
    let details = match parsed.details {
        Some(mut details) => {
            if details.message.is_empty() {
                details.message = fallback_message();
            }
            details
        }
        None => ErrorDetails {
            message: parsed.message.unwrap_or_else(fallback_message),
            title: None,
        },
    };
    ApiError {
        status,
        title: parsed.title.unwrap_or_else(|| "Error".to_string()),
        details,
    }
}

/// Thin POST client over the backend's request/response endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    errors: Arc<dyn ErrorSink>,
}

impl ApiClient {
    /// Create a client for `base_url` (trailing slash trimmed).
    pub fn new(base_url: &str, api_token: Option<String>, errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            errors,
        }
    }

    /// POST `body` to `path` and parse a JSON response if one is present.
    pub async fn request(&self, path: &str, body: &Value) -> Result<Option<Value>, ApiError> {
        self.request_with_flags(path, body)
            .await
            .map(|(json, _)| json)
    }

    /// Like [`request`](Self::request), additionally exposing whether the
    /// response flagged inspection mode.
    pub async fn request_with_flags(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<(Option<Value>, bool), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.api_token {
            request = request.header("x-api-token", token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let error = ApiError {
                    status: 0,
                    title: "Network error".to_string(),
                    details: ErrorDetails {
                        message: err.to_string(),
                        title: None,
                    },
                };
                self.errors.notify(&error);
                return Err(error);
            }
        };

        let status = response.status();
        let inspection = response
            .headers()
            .get(INSPECTION_MODE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value == "true" || value == "1")
            .unwrap_or(false);
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            if text.is_empty() {
                return Ok((None, inspection));
            }
            match serde_json::from_str(&text) {
                Ok(json) => Ok((Some(json), inspection)),
                Err(err) => {
                    let error = ApiError {
                        status: status.as_u16(),
                        title: "Invalid response".to_string(),
                        details: ErrorDetails {
                            message: format!("{path} returned a malformed body: {err}"),
                            title: None,
                        },
                    };
                    self.errors.notify(&error);
                    Err(error)
                }
            }
        } else {
            let error = shape_error(status.as_u16(), path, &text);
            // Reported exactly once per failure, then propagated.
            self.errors.notify(&error);
            Err(error)
        }
    }
}

/// What the caller should do with the current invocation.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Dispatch now.
    Dispatch,
    /// Schedule a trailing flush after the returned delay.
    Trail(Duration),
    /// A trailing flush is already scheduled; drop this invocation.
    Coalesced,
}

#[derive(Default)]
struct ThrottleInner {
    window_opened: Option<Instant>,
    trailing_scheduled: bool,
}

/// Collapses repeated outgoing calls into at most one per window.
///
/// The leading call dispatches immediately; calls landing inside the window
/// coalesce into a single trailing flush (last-call-wins, no queueing of
/// intermediate calls).
pub struct Throttle {
    window: Duration,
    inner: Mutex<ThrottleInner>,
}

impl Throttle {
    /// Create a throttle with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inner: Mutex::new(ThrottleInner::default()),
        }
    }

    /// Decide what to do with an invocation arriving now.
    pub fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        match inner.window_opened {
            Some(opened) if now.duration_since(opened) < self.window => {
                if inner.trailing_scheduled {
                    Admission::Coalesced
                } else {
                    inner.trailing_scheduled = true;
                    Admission::Trail(self.window - now.duration_since(opened))
                }
            }
            _ => {
                inner.window_opened = Some(now);
                inner.trailing_scheduled = false;
                Admission::Dispatch
            }
        }
    }

    /// Mark the trailing flush as fired and reopen the window.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.window_opened = Some(Instant::now());
        inner.trailing_scheduled = false;
    }
}
