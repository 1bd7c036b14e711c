//! # `tether_core`
//!
//! Reactive state synchronization engine. Tether keeps a thin client's
//! `state` and `data` documents mirrored against a backend process: the
//! backend pushes incremental patches over a persistent channel, the client
//! applies them in place, and local mutations flow back upstream to be
//! acknowledged and merged.
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────────┐   POST (snapshots, commands)   ┌─────────────┐
//!   │  ApiClient  │───────────────────────────────▶│             │
//!   └──────┬──────┘                                │   backend   │
//!          │                 push channel          │             │
//!   ┌──────┴──────────┐◀──────────────────────────▶└─────────────┘
//!   │ ReconnectSuper- │
//!   │ visor           │── patches ──▶ DocumentStore ── change events ──▶ UI
//!   └──────┬──────────┘                    ▲
//!          │ lifecycle                     │ merge / snapshot
//!   ┌──────┴────────────┐──────────────────┘
//!   │ SessionController │◀── command() / post() ── embedding environment
//!   └───────────────────┘
//! ```
//!
//! The rendering layer, error dialogs, and action handlers stay outside:
//! they implement the seams in [`hooks`] and read snapshots plus version
//! counters from the [`document::DocumentStore`].

#![warn(missing_docs)]

pub mod api;
pub mod context;
pub mod document;
pub mod error;
pub mod hooks;
pub mod patch;
pub mod protocol;
pub mod reconnect;
pub mod session;
pub mod tokio_transport;
pub mod transport;

pub use api::{ApiClient, ApiError, ErrorDetails, Throttle};
pub use context::{AppContext, IntegrationContext};
pub use document::{DocumentKind, DocumentStore, MergeOutcome};
pub use error::{Result, TetherError};
pub use hooks::{ActionDispatcher, ChangeCallback, ErrorSink};
pub use patch::{PatchError, PatchKind, PatchOp, apply_batch};
pub use protocol::{ChannelCommand, MergePayload, RunAction, SessionInfo};
pub use reconnect::{ReconnectConfig, ReconnectSupervisor};
pub use session::{SessionController, SessionPhase, TaskInfo, TaskStatus};
pub use tokio_transport::{TokioConnector, TokioTransport};
pub use transport::{
    ChannelError, ChannelTransport, ConnectionStatus, StatusCallback, TransportConnector,
    WsMessage,
};
