//! Startup context: who the engine talks to and how the client was
//! launched.
//!
//! There are no global singletons. The embedding environment builds one
//! [`AppContext`] before startup (token acquisition itself is out of
//! scope) and the engine threads it through every component that needs it.

use serde_json::{Map, Value};
use url::Url;

use crate::error::{Result, TetherError};

/// Connection and identity context supplied prior to startup.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Backend base address, e.g. `https://app.example.com`.
    pub server_address: String,
    /// Authentication token for API calls and the push channel.
    pub api_token: Option<String>,
    /// Identifier of the owning task, when one exists.
    pub task_id: Option<i64>,
    /// Detached/static mode: seed the documents from stored task settings
    /// instead of fetching live snapshots.
    pub is_static_version: bool,
    /// Client-side app: no owning backend task, so the session-info fetch
    /// is skipped.
    pub is_client_side_app: bool,
    /// The URL the client was launched with; its query string becomes the
    /// integration context.
    pub launch_url: String,
}

impl AppContext {
    /// Server address with any trailing slash trimmed.
    pub fn base_url(&self) -> &str {
        self.server_address.trim_end_matches('/')
    }
}

/// Integration context parsed from the launch URL query string.
///
/// Echoed back to the backend in the `context` field of every outbound
/// request and channel frame.
#[derive(Debug, Clone, Default)]
pub struct IntegrationContext {
    values: Map<String, Value>,
}

impl IntegrationContext {
    /// Parse the query string of `launch_url` into context entries.
    pub fn from_launch_url(launch_url: &str) -> Result<Self> {
        let url = Url::parse(launch_url)
            .map_err(|err| TetherError::LaunchUrl(format!("{launch_url:?}: {err}")))?;
        let mut values = Map::new();
        for (key, value) in url.query_pairs() {
            values.insert(key.into_owned(), Value::String(value.into_owned()));
        }
        Ok(Self { values })
    }

    /// A context entry, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// The context as a JSON object for outbound bodies.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}
