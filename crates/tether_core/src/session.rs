//! Session controller: startup sequencing, lifecycle state, and gating.
//!
//! Phases run `initializing → ready → (interactive | preview)`. Preview is
//! one-way: once the owning task reaches a terminal status the session
//! stays read-only for good, and every gated attempt surfaces exactly one
//! user-visible notice with no network side effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::api::{Admission, ApiClient, ApiError, DEFAULT_THROTTLE_WINDOW, Throttle};
use crate::context::{AppContext, IntegrationContext};
use crate::document::{DocumentKind, DocumentStore, MergeOutcome};
use crate::error::{Result, TetherError};
use crate::hooks::ErrorSink;
use crate::protocol::{ChannelCommand, MergePayload, SessionInfo, paths};

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Startup sequence in flight; no user command is accepted.
    Initializing,
    /// Initialization succeeded; waiting for the channel to connect.
    Ready,
    /// Commands are dispatched to the backend.
    Interactive,
    /// Read-only: the owning task reached a terminal status.
    Preview,
}

/// Status of the owning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting to be scheduled.
    Queued,
    /// Running.
    Started,
    /// Failed.
    Error,
    /// Completed.
    Finished,
    /// Shutting down.
    Terminating,
    /// Stopped by the owner.
    Stopped,
}

impl TaskStatus {
    /// Terminal statuses park the session in preview permanently.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Error | TaskStatus::Finished | TaskStatus::Terminating | TaskStatus::Stopped
        )
    }
}

/// Metadata of the owning task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskInfo {
    /// Task identifier, when known.
    #[serde(default)]
    pub id: Option<i64>,
    /// Current status.
    pub status: TaskStatus,
    /// Owner-defined settings blob; seeds the documents in static mode.
    #[serde(default)]
    pub settings: Value,
}

/// Drives startup, owns lifecycle state, and gates outgoing traffic.
pub struct SessionController {
    context: AppContext,
    api: Arc<ApiClient>,
    store: Arc<DocumentStore>,
    errors: Arc<dyn ErrorSink>,
    phase: Mutex<SessionPhase>,
    task: Mutex<Option<TaskInfo>>,
    session_info: Mutex<Option<SessionInfo>>,
    integration: Mutex<Value>,
    loading: AtomicBool,
    inspection_mode: AtomicBool,
    throttle: Throttle,
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl SessionController {
    /// Create a controller in the `initializing` phase.
    pub fn new(
        context: AppContext,
        api: Arc<ApiClient>,
        store: Arc<DocumentStore>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            context,
            api,
            store,
            errors,
            phase: Mutex::new(SessionPhase::Initializing),
            task: Mutex::new(None),
            session_info: Mutex::new(None),
            integration: Mutex::new(Value::Object(Default::default())),
            loading: AtomicBool::new(true),
            inspection_mode: AtomicBool::new(false),
            throttle: Throttle::new(DEFAULT_THROTTLE_WINDOW),
            outgoing: Mutex::new(None),
        }
    }

    /// The startup context this session was built with.
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    /// True while the startup sequence is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// True when the initial-state response flagged a debug/inspection
    /// session. Inspection sessions opt out of automatic reconnection.
    pub fn inspection_mode(&self) -> bool {
        self.inspection_mode.load(Ordering::SeqCst)
    }

    /// Snapshot of the owning task, if one was resolved.
    pub fn task(&self) -> Option<TaskInfo> {
        self.task.lock().unwrap().clone()
    }

    /// Session metadata from the session-info endpoint, if fetched.
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.session_info.lock().unwrap().clone()
    }

    /// Run the startup sequence.
    ///
    /// Exactly one of "fetch live snapshots" or "seed from stored task
    /// settings" happens, governed by `is_static_version`. The loading flag
    /// clears on every path; failures propagate to the caller.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        let result = self.run_startup().await;
        // Guaranteed cleanup: the loading indicator clears no matter how
        // startup ended.
        self.loading.store(false, Ordering::SeqCst);
        result?;
        let mut phase = self.phase.lock().unwrap();
        if *phase == SessionPhase::Initializing {
            *phase = SessionPhase::Ready;
        }
        Ok(())
    }

    async fn run_startup(&self) -> Result<()> {
        let integration = IntegrationContext::from_launch_url(&self.context.launch_url)?;
        *self.integration.lock().unwrap() = integration.to_value();

        if self.context.is_static_version {
            self.seed_from_task().await
        } else {
            self.fetch_live_snapshots().await
        }
    }

    /// Live mode: fetch session metadata and both snapshots concurrently.
    ///
    /// All requests are awaited before any result is consumed; one failing
    /// does not abandon the others mid-flight.
    async fn fetch_live_snapshots(&self) -> Result<()> {
        let body = json!({ "context": self.integration_value() });

        if self.context.is_client_side_app {
            let (state_result, data_result) = tokio::join!(
                self.api.request_with_flags(paths::APP_STATE, &body),
                self.api.request(paths::APP_DATA, &body),
            );
            let (state, inspection) = state_result?;
            let data = data_result?;
            self.install_snapshots(state, data, inspection);
        } else {
            let (info_result, state_result, data_result) = tokio::join!(
                self.api.request(paths::SESSION_INFO, &body),
                self.api.request_with_flags(paths::APP_STATE, &body),
                self.api.request(paths::APP_DATA, &body),
            );
            let info = info_result?;
            let (state, inspection) = state_result?;
            let data = data_result?;
            if let Some(info) = info {
                let info: SessionInfo = serde_json::from_value(info)?;
                log::info!(
                    "[Session] resolved session info (task {:?}, env {:?})",
                    info.task_id,
                    info.environment
                );
                *self.session_info.lock().unwrap() = Some(info);
            }
            self.install_snapshots(state, data, inspection);
        }
        Ok(())
    }

    /// Static mode: resolve the owning task and seed the documents from its
    /// stored settings. No live snapshots are fetched.
    async fn seed_from_task(&self) -> Result<()> {
        let body = json!({
            "taskId": self.context.task_id,
            "context": self.integration_value(),
        });
        let Some(value) = self.api.request(paths::TASK_INFO, &body).await? else {
            log::warn!("[Session] static mode without task metadata; documents stay empty");
            return Ok(());
        };
        let task: TaskInfo = serde_json::from_value(value)?;
        if let Some(state) = task.settings.get("state").cloned() {
            self.store.replace_document(DocumentKind::State, state);
        }
        if let Some(data) = task.settings.get("data").cloned() {
            self.store.replace_document(DocumentKind::Data, data);
        }
        let terminal = task.status.is_terminal();
        *self.task.lock().unwrap() = Some(task);
        if terminal {
            self.enter_preview();
        }
        Ok(())
    }

    fn install_snapshots(&self, state: Option<Value>, data: Option<Value>, inspection: bool) {
        if inspection {
            log::info!("[Session] inspection mode flagged by the backend");
        }
        self.inspection_mode.store(inspection, Ordering::SeqCst);
        if let Some(state) = state {
            self.store.replace_document(DocumentKind::State, state);
        }
        if let Some(data) = data {
            self.store.replace_document(DocumentKind::Data, data);
        }
    }

    /// Install the outgoing side of the persistent channel.
    pub(crate) fn attach_channel(&self, sender: mpsc::UnboundedSender<String>) {
        *self.outgoing.lock().unwrap() = Some(sender);
    }

    /// Channel connected: `ready → interactive`. Never leaves preview.
    pub fn on_channel_connected(&self) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == SessionPhase::Ready {
            *phase = SessionPhase::Interactive;
            log::info!("[Session] interactive");
        }
    }

    /// Push-channel task status notification.
    ///
    /// A terminal status parks the session in preview; later status flaps
    /// cannot revive a terminal task.
    pub fn on_task_status(&self, status: TaskStatus) {
        {
            let mut task = self.task.lock().unwrap();
            match task.as_mut() {
                Some(task) => {
                    if task.status.is_terminal() {
                        return;
                    }
                    task.status = status;
                }
                None => {
                    *task = Some(TaskInfo {
                        id: self.context.task_id,
                        status,
                        settings: Value::Null,
                    });
                }
            }
        }
        if status.is_terminal() {
            log::info!("[Session] task status {status:?} is terminal; entering preview");
            self.enter_preview();
        }
    }

    fn enter_preview(&self) {
        // One-way transition; there is no path back out.
        *self.phase.lock().unwrap() = SessionPhase::Preview;
    }

    /// Merge a payload from the channel or a command response, then run the
    /// post-merge persistence hook.
    pub fn apply_merge(self: &Arc<Self>, payload: &MergePayload) -> Result<MergeOutcome> {
        let outcome = self.store.merge(payload)?;
        if outcome.state_changed {
            self.on_state_merged();
        }
        Ok(outcome)
    }

    /// Opportunistic upstream persistence after a successful state merge.
    fn on_state_merged(self: &Arc<Self>) {
        if self.context.is_static_version || self.phase() == SessionPhase::Preview {
            return;
        }
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.persist_state().await;
        });
    }

    /// Throttled, best-effort push of the current `state` document.
    ///
    /// Fire-and-forget from the caller's perspective; the leading call in a
    /// window dispatches inline so a following command observes a bounded
    /// persistence order.
    pub async fn persist_state(self: &Arc<Self>) {
        if self.context.is_static_version || self.phase() == SessionPhase::Preview {
            return;
        }
        match self.throttle.admit() {
            Admission::Dispatch => self.push_state_now().await,
            Admission::Trail(delay) => {
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    session.throttle.flush();
                    // Last-call-wins: the flush reads the state as it is now.
                    session.push_state_now().await;
                });
            }
            Admission::Coalesced => {}
        }
    }

    async fn push_state_now(&self) {
        let body = json!({
            "state": self.store.snapshot(DocumentKind::State),
            "context": self.integration_value(),
        });
        if let Err(err) = self.api.request(paths::SYNC_STATE, &body).await {
            // Best-effort: the sink has already been notified.
            log::debug!("[Session] state sync failed: {err}");
        }
    }

    /// Dispatch a command over the persistent channel.
    ///
    /// Gated: rejected while initializing, suppressed (with one notice per
    /// attempt) in preview.
    pub async fn command(self: &Arc<Self>, name: &str, payload: Value) -> Result<()> {
        self.check_gate(name)?;
        if self.phase() == SessionPhase::Preview {
            return Ok(());
        }
        self.persist_state().await;
        let frame = ChannelCommand {
            command: name.to_string(),
            state: self.store.snapshot(DocumentKind::State),
            context: self.integration_value(),
            payload,
        };
        let text = serde_json::to_string(&frame)?;
        self.send_on_channel(text)
    }

    /// POST to a backend endpoint and merge an optional response payload.
    ///
    /// Gated exactly like [`command`](Self::command).
    pub async fn post(self: &Arc<Self>, path: &str, payload: Value) -> Result<()> {
        self.check_gate(path)?;
        if self.phase() == SessionPhase::Preview {
            return Ok(());
        }
        self.persist_state().await;
        let body = json!({
            "state": self.store.snapshot(DocumentKind::State),
            "context": self.integration_value(),
            "payload": payload,
        });
        let response = self.api.request(path, &body).await?;
        if let Some(value) = response {
            let merge: MergePayload = serde_json::from_value(value)?;
            self.apply_merge(&merge)?;
        }
        Ok(())
    }

    /// Best-effort shutdown notification to the backend.
    pub async fn shutdown(&self) {
        if self.context.is_static_version {
            return;
        }
        let body = json!({ "context": self.integration_value() });
        if let Err(err) = self.api.request(paths::SHUTDOWN, &body).await {
            log::debug!("[Session] shutdown notification failed: {err}");
        }
    }

    /// Reject or suppress an outgoing operation based on the current phase.
    ///
    /// Preview is a policy rejection, not an error: the caller gets `Ok`
    /// after exactly one notice per attempt and no network call happens.
    fn check_gate(&self, what: &str) -> Result<()> {
        match self.phase() {
            SessionPhase::Initializing => Err(TetherError::NotReady),
            SessionPhase::Preview => {
                self.errors.notify(&ApiError::notice(
                    "Session is read-only",
                    format!("The session has finished; {what:?} was not sent."),
                ));
                Ok(())
            }
            SessionPhase::Ready | SessionPhase::Interactive => Ok(()),
        }
    }

    fn integration_value(&self) -> Value {
        self.integration.lock().unwrap().clone()
    }

    fn send_on_channel(&self, text: String) -> Result<()> {
        let outgoing = self.outgoing.lock().unwrap();
        match outgoing.as_ref() {
            Some(sender) => sender.send(text).map_err(|_| TetherError::ChannelClosed),
            None => Err(TetherError::ChannelClosed),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_phase(&self, phase: SessionPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    #[cfg(test)]
    pub(crate) fn force_inspection_mode(&self, inspection: bool) {
        self.inspection_mode.store(inspection, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct RecordingSink {
        notices: Mutex<Vec<ApiError>>,
        count: AtomicUsize,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                notices: Mutex::new(Vec::new()),
                count: AtomicUsize::new(0),
            })
        }
    }

    impl ErrorSink for RecordingSink {
        fn notify(&self, error: &ApiError) {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.notices.lock().unwrap().push(error.clone());
        }
    }

    fn test_context(is_static: bool) -> AppContext {
        AppContext {
            // Nothing listens here; gated paths must never reach it.
            server_address: "http://127.0.0.1:9".to_string(),
            api_token: None,
            task_id: Some(42),
            is_static_version: is_static,
            is_client_side_app: false,
            launch_url: "http://127.0.0.1:9/run?env=test".to_string(),
        }
    }

    fn build_session(is_static: bool) -> (Arc<SessionController>, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let context = test_context(is_static);
        let api = Arc::new(ApiClient::new(
            &context.server_address,
            None,
            sink.clone(),
        ));
        let store = Arc::new(DocumentStore::new());
        let session = Arc::new(SessionController::new(
            context,
            api,
            store,
            sink.clone(),
        ));
        (session, sink)
    }

    #[tokio::test]
    async fn test_command_rejected_while_initializing() {
        let (session, sink) = build_session(true);
        let err = session.command("run", json!({})).await.unwrap_err();
        assert!(matches!(err, TetherError::NotReady));
        // A pre-ready rejection is not a user-facing notice.
        assert_eq!(sink.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preview_gates_with_one_notice_per_attempt() {
        let (session, sink) = build_session(true);
        session.force_phase(SessionPhase::Ready);
        session.on_task_status(TaskStatus::Finished);
        assert_eq!(session.phase(), SessionPhase::Preview);

        assert!(session.command("run", json!({})).await.is_ok());
        assert!(session.command("run", json!({})).await.is_ok());
        assert!(session.post("/custom", json!({})).await.is_ok());

        let notices = sink.notices.lock().unwrap();
        assert_eq!(notices.len(), 3);
        assert!(notices.iter().all(|notice| notice.is_notice()));
        assert!(notices[0].title.contains("read-only"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_one_way() {
        let (session, _sink) = build_session(true);
        session.force_phase(SessionPhase::Interactive);
        session.on_task_status(TaskStatus::Stopped);
        assert_eq!(session.phase(), SessionPhase::Preview);

        // A late non-terminal flap cannot revive the session.
        session.on_task_status(TaskStatus::Started);
        assert_eq!(session.phase(), SessionPhase::Preview);
        assert_eq!(session.task().unwrap().status, TaskStatus::Stopped);
    }

    #[tokio::test]
    async fn test_non_terminal_status_keeps_session_interactive() {
        let (session, _sink) = build_session(true);
        session.force_phase(SessionPhase::Interactive);
        session.on_task_status(TaskStatus::Started);
        assert_eq!(session.phase(), SessionPhase::Interactive);
    }

    #[tokio::test]
    async fn test_channel_connected_promotes_ready_only() {
        let (session, _sink) = build_session(true);
        session.on_channel_connected();
        assert_eq!(session.phase(), SessionPhase::Initializing);

        session.force_phase(SessionPhase::Ready);
        session.on_channel_connected();
        assert_eq!(session.phase(), SessionPhase::Interactive);

        session.force_phase(SessionPhase::Preview);
        session.on_channel_connected();
        assert_eq!(session.phase(), SessionPhase::Preview);
    }

    #[tokio::test]
    async fn test_command_without_channel_reports_closed() {
        let (session, _sink) = build_session(true);
        session.force_phase(SessionPhase::Interactive);
        let err = session.command("run", json!({})).await.unwrap_err();
        assert!(matches!(err, TetherError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_command_sends_frame_with_state_snapshot() {
        let (session, _sink) = build_session(true);
        session.force_phase(SessionPhase::Interactive);

        let (tx, mut rx) = mpsc::unbounded_channel();
        session.attach_channel(tx);

        session
            .command("select", json!({"row": 3}))
            .await
            .unwrap();

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["command"], "select");
        assert_eq!(frame["payload"]["row"], 3);
        assert!(frame["state"].is_object());
    }

    #[tokio::test]
    async fn test_startup_failure_clears_loading_and_propagates() {
        // Live mode against a dead address: the fetches fail, the loading
        // flag still clears, the error reaches the caller.
        let (session, sink) = build_session(false);
        assert!(session.is_loading());
        let result = session.initialize().await;
        assert!(result.is_err());
        assert!(!session.is_loading());
        assert_eq!(session.phase(), SessionPhase::Initializing);
        // The transport failure was reported to the sink as well.
        assert!(sink.count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_invalid_launch_url_fails_startup() {
        let sink = RecordingSink::new();
        let mut context = test_context(true);
        context.launch_url = "not a url".to_string();
        let api = Arc::new(ApiClient::new(
            &context.server_address,
            None,
            sink.clone(),
        ));
        let session = Arc::new(SessionController::new(
            context,
            api,
            Arc::new(DocumentStore::new()),
            sink,
        ));
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, TetherError::LaunchUrl(_)));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_apply_merge_updates_store() {
        use crate::patch::{PatchKind, PatchOp};

        let (session, _sink) = build_session(true);
        session.force_phase(SessionPhase::Interactive);
        let payload = MergePayload {
            state: Some(vec![PatchOp {
                op: PatchKind::Add,
                path: "/count".to_string(),
                value: Some(json!(7)),
                from: None,
            }]),
            data: None,
            run_action: None,
        };
        let outcome = session.apply_merge(&payload).unwrap();
        assert!(outcome.state_changed);
    }
}
