//! # lifegrid-collab: network layer of the Lifegrid client
//!
//! Keeps a reconnecting WebSocket session with the simulation server and
//! turns its binary frames into typed events.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   WebSocket    ┌──────────────┐
//! │  SyncClient  │ ◄────────────► │  simulation  │
//! │  (driver)    │  binary frames │  server      │
//! └──────┬───────┘                └──────────────┘
//!        │ ClientEvent
//!        ▼
//! ┌──────────────┐   intents   ┌────────────────┐
//! │ SessionState │ ──────────► │ CommandEmitter │ ──► ClientHandle
//! │ (reducer)    │             └────────────────┘
//! └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: envelope and payload codec (protobuf-compatible)
//! - [`backoff`]: reconnect delay policy
//! - [`client`]: connection state machine and async driver
//! - [`session`]: pure session reducer
//! - [`emitter`]: user intents to outbound frames

pub mod backoff;
pub mod client;
pub mod emitter;
pub mod protocol;
pub mod session;

pub use backoff::Backoff;
pub use client::{
    ClientConfig, ClientEvent, ClientHandle, ConnectionManager, ConnectionPhase, SyncClient,
    TransportError,
};
pub use emitter::{CommandEmitter, CommandError, FrameSink};
pub use protocol::{Envelope, Inbound, MessageType, Outbound, ProtocolError, WireMessage, WorldData};
pub use session::{SessionEvent, SessionState};
