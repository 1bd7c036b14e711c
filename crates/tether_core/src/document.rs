//! Document store: owns the two synchronized document trees.
//!
//! The store is the only code path that mutates the documents. Every merge
//! that changes a document bumps that document's version counter and fires
//! the registered change callbacks, so observers can distinguish structural
//! changes without hooking into the trees themselves.

use std::sync::{Mutex, RwLock};

use serde_json::Value;

use crate::error::Result;
use crate::hooks::ChangeCallback;
use crate::patch;
use crate::protocol::MergePayload;

/// Which of the two synchronized documents a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Round-trips to/from the remote; drives gating flags.
    State,
    /// Read-mostly payload document.
    Data,
}

impl DocumentKind {
    /// Wire name of the document.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::State => "state",
            DocumentKind::Data => "data",
        }
    }
}

/// Outcome of a [`DocumentStore::merge`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The `state` document changed.
    pub state_changed: bool,
    /// The `data` document changed.
    pub data_changed: bool,
}

impl MergeOutcome {
    /// True when the merge changed neither document.
    pub fn is_noop(self) -> bool {
        !self.state_changed && !self.data_changed
    }
}

struct Documents {
    state: Value,
    data: Value,
    state_version: u64,
    data_version: u64,
}

/// Owns the `state` and `data` documents and publishes change
/// notifications.
///
/// Mutation happens only through [`merge`](DocumentStore::merge) and the
/// startup seeding path; everyone else reads deep-clone snapshots plus
/// version counters.
pub struct DocumentStore {
    docs: Mutex<Documents>,
    observers: RwLock<Vec<ChangeCallback>>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Create a store with two empty documents.
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Documents {
                state: Value::Object(Default::default()),
                data: Value::Object(Default::default()),
                state_version: 0,
                data_version: 0,
            }),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register a change callback, fired once per changed document per merge.
    pub fn subscribe(&self, callback: ChangeCallback) {
        self.observers.write().unwrap().push(callback);
    }

    /// Deep-clone snapshot of a document.
    pub fn snapshot(&self, kind: DocumentKind) -> Value {
        let docs = self.docs.lock().unwrap();
        match kind {
            DocumentKind::State => docs.state.clone(),
            DocumentKind::Data => docs.data.clone(),
        }
    }

    /// Current version counter of a document.
    pub fn version(&self, kind: DocumentKind) -> u64 {
        let docs = self.docs.lock().unwrap();
        match kind {
            DocumentKind::State => docs.state_version,
            DocumentKind::Data => docs.data_version,
        }
    }

    /// Replace a document wholesale (startup seeding). Notifies observers.
    pub fn replace_document(&self, kind: DocumentKind, value: Value) {
        let version = {
            let mut docs = self.docs.lock().unwrap();
            match kind {
                DocumentKind::State => {
                    docs.state = value;
                    docs.state_version += 1;
                    docs.state_version
                }
                DocumentKind::Data => {
                    docs.data = value;
                    docs.data_version += 1;
                    docs.data_version
                }
            }
        };
        self.emit(kind, version);
    }

    /// Apply the patch batches in `payload`, one document at a time.
    ///
    /// A payload with neither batch (or with empty batches) is a no-op and
    /// fires no notification. Callbacks run outside the document lock.
    pub fn merge(&self, payload: &MergePayload) -> Result<MergeOutcome> {
        let mut outcome = MergeOutcome::default();
        let mut notify: Vec<(DocumentKind, u64)> = Vec::new();
        {
            let mut docs = self.docs.lock().unwrap();
            if let Some(batch) = payload.state.as_deref() {
                if !batch.is_empty() {
                    patch::apply_batch(&mut docs.state, batch)?;
                    docs.state_version += 1;
                    outcome.state_changed = true;
                    notify.push((DocumentKind::State, docs.state_version));
                }
            }
            if let Some(batch) = payload.data.as_deref() {
                if !batch.is_empty() {
                    patch::apply_batch(&mut docs.data, batch)?;
                    docs.data_version += 1;
                    outcome.data_changed = true;
                    notify.push((DocumentKind::Data, docs.data_version));
                }
            }
        }
        for (kind, version) in notify {
            log::debug!("[Store] {} document changed (v{version})", kind.as_str());
            self.emit(kind, version);
        }
        Ok(outcome)
    }

    fn emit(&self, kind: DocumentKind, version: u64) {
        for callback in self.observers.read().unwrap().iter() {
            callback(kind, version);
        }
    }
}
