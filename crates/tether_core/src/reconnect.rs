//! Reconnect supervisor: owns the persistent channel lifecycle.
//!
//! The supervisor is the only component that ever holds the connection. It
//! dials, watches for close, schedules fixed-delay retries forever (unless
//! the session is a debug/inspection one), routes inbound frames, and
//! forwards outgoing frames handed to it through the session's channel
//! sender. Teardown is idempotent and cancels any pending retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, watch};

use crate::hooks::ActionDispatcher;
use crate::protocol::{MergePayload, TASK_STATUS_ACTION, paths};
use crate::session::{SessionController, TaskStatus};
use crate::transport::{
    ChannelTransport, ConnectionStatus, StatusCallback, TransportConnector, WsMessage,
};

/// Keepalive ping cadence on an open channel.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Reconnection policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Automatic reconnection on unexpected close. Inspection sessions opt
    /// out at runtime regardless of this flag.
    pub enabled: bool,
    /// Fixed delay between a close and the next attempt.
    pub retry_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Wire shape of the reserved task-status action payload.
#[derive(Debug, Deserialize)]
struct StatusNotice {
    status: TaskStatus,
}

/// Owns the persistent channel: connect, watch for close, retry, route.
pub struct ReconnectSupervisor<C: TransportConnector> {
    connector: C,
    config: ReconnectConfig,
    session: Arc<SessionController>,
    dispatcher: Arc<dyn ActionDispatcher>,
    status: Mutex<Option<StatusCallback>>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    outgoing_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl<C: TransportConnector> ReconnectSupervisor<C> {
    /// Create a supervisor and wire the session's outgoing sends to it.
    pub fn new(
        connector: C,
        config: ReconnectConfig,
        session: Arc<SessionController>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        session.attach_channel(outgoing_tx);
        let (shutdown, _) = watch::channel(false);
        Self {
            connector,
            config,
            session,
            dispatcher,
            status: Mutex::new(None),
            running: AtomicBool::new(true),
            shutdown,
            outgoing_rx: tokio::sync::Mutex::new(outgoing_rx),
        }
    }

    /// Set the callback for connection status changes.
    pub fn set_on_status(&self, callback: StatusCallback) {
        *self.status.lock().unwrap() = Some(callback);
    }

    /// Tear down the channel. Idempotent; cancels any pending retry.
    pub fn teardown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("[Supervisor] teardown requested");
            let _ = self.shutdown.send(true);
        }
    }

    /// Run the channel lifecycle until torn down.
    ///
    /// `disconnected → connecting → connected → disconnected (retry
    /// scheduled) → …`, forever. A successful open resets the attempt
    /// counter; the retry sleep is cancelled by teardown.
    pub async fn run(self: Arc<Self>) {
        let url = self.channel_url();
        let mut attempt: u32 = 0;

        while self.running.load(Ordering::SeqCst) {
            self.publish(ConnectionStatus::Connecting);
            match self.connector.connect(&url).await {
                Ok(transport) => {
                    log::info!("[Supervisor] channel connected");
                    // A successful open ends the retry cycle.
                    attempt = 0;
                    self.publish(ConnectionStatus::Connected);
                    self.session.on_channel_connected();
                    self.drive(transport).await;
                    self.publish(ConnectionStatus::Disconnected);
                }
                Err(err) => {
                    log::warn!("[Supervisor] connect failed: {err}");
                }
            }

            if !self.running.load(Ordering::SeqCst) || !self.reconnect_enabled() {
                break;
            }

            attempt += 1;
            self.publish(ConnectionStatus::Reconnecting { attempt });
            log::info!(
                "[Supervisor] retrying in {:?} (attempt {attempt})",
                self.config.retry_delay
            );
            let mut shutdown = self.shutdown.subscribe();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.publish(ConnectionStatus::Disconnected);
        log::info!("[Supervisor] channel loop exited");
    }

    /// Pump one open connection until it closes or teardown fires.
    async fn drive(&self, mut transport: C::Transport) {
        let mut outgoing = self.outgoing_rx.lock().await;
        let mut shutdown = self.shutdown.subscribe();
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                message = transport.recv() => match message {
                    Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text),
                    Some(Ok(WsMessage::Binary(_))) => {
                        log::debug!("[Supervisor] ignoring binary frame");
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close)) => {
                        log::info!("[Supervisor] channel closed by server");
                        break;
                    }
                    Some(Err(err)) => {
                        log::warn!("[Supervisor] channel error: {err}");
                        break;
                    }
                    None => break,
                },
                frame = outgoing.recv() => match frame {
                    Some(text) => {
                        if let Err(err) = transport.send_text(text).await {
                            log::warn!("[Supervisor] send failed: {err}");
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if let Err(err) = transport.send_ping().await {
                        log::warn!("[Supervisor] ping failed: {err}");
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    let _ = transport.close().await;
                    break;
                }
            }
        }
    }

    /// Parse and route one inbound frame.
    ///
    /// Malformed frames are logged and dropped without touching the
    /// connection. Action frames route to the dispatcher instead of the
    /// patch path; the reserved task-status action feeds the session's
    /// lifecycle instead.
    fn handle_frame(&self, text: &str) {
        let mut payload: MergePayload = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("[Supervisor] dropping malformed channel message: {err}");
                return;
            }
        };

        if let Some(action) = payload.run_action.take() {
            if action.action == TASK_STATUS_ACTION {
                match serde_json::from_value::<StatusNotice>(action.payload) {
                    Ok(notice) => self.session.on_task_status(notice.status),
                    Err(err) => {
                        log::warn!("[Supervisor] dropping malformed task-status notice: {err}");
                    }
                }
            } else {
                self.dispatcher.dispatch(&action.action, action.payload);
            }
            return;
        }

        if let Err(err) = self.session.apply_merge(&payload) {
            log::warn!("[Supervisor] merge failed: {err}");
        }
    }

    fn reconnect_enabled(&self) -> bool {
        self.config.enabled && !self.session.inspection_mode()
    }

    fn channel_url(&self) -> String {
        let context = self.session.context();
        let base = context
            .base_url()
            .replace("https://", "wss://")
            .replace("http://", "ws://");
        match &context.api_token {
            Some(token) => format!("{base}{}?token={token}", paths::CHANNEL),
            None => format!("{base}{}", paths::CHANNEL),
        }
    }

    fn publish(&self, status: ConnectionStatus) {
        if let Some(callback) = self.status.lock().unwrap().as_ref() {
            callback(status);
        }
    }
}
