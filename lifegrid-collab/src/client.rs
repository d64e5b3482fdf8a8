//! Reconnecting WebSocket client for the simulation server.
//!
//! ## Architecture
//!
//! ```text
//!  ClientHandle ──frames──►┐
//!                          │        ┌───────────────────┐
//!  reconnect deadline ────►├──────► │ driver task       │ ──ClientEvent──► app
//!  watchdog tick ─────────►│        │ ConnectionManager │
//!                          │        └─────────┬─────────┘
//!  (generation, event) ───►┘                  │ spawn / abort
//!         ▲                                   ▼
//!         └──────────────────────── connection task (one per attempt)
//! ```
//!
//! The driver is the only owner of [`ConnectionManager`]; every transport
//! event, outbound frame and timer is handled inside one `select!` loop, so
//! handlers never interleave. Connection tasks tag everything they forward
//! with their generation, and the manager discards events from superseded
//! generations.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::backoff::{Backoff, INITIAL_DELAY, MAX_DELAY};
use crate::protocol::{Envelope, Inbound};

/// Transport lifecycle as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Unconnected,
    Connected,
    Registered,
}

impl ConnectionPhase {
    /// Whether outbound frames have a live transport to go to.
    pub fn is_open(self) -> bool {
        !matches!(self, ConnectionPhase::Unconnected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("closed by server (code {0})")]
    Closed(u16),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full WebSocket URL, e.g. `ws://localhost:5000/ws`.
    pub url: String,
    pub initial_retry: Duration,
    pub max_retry: Duration,
    /// Upper bound on the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
    /// How often to check for a missing transport with no reconnect queued.
    pub watchdog_interval: Duration,
    /// Capacity of the event channel handed to the application.
    pub event_capacity: usize,
    pub outbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5000/ws".into(),
            initial_retry: INITIAL_DELAY,
            max_retry: MAX_DELAY,
            connect_timeout: Duration::from_secs(5),
            watchdog_interval: Duration::from_secs(1),
            event_capacity: 256,
            outbound_capacity: 256,
        }
    }
}

/// Events published to the application, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected { retry_in: Duration },
    Message(Inbound),
}

// ─── Connection state machine ──────────────────────────────────

/// Synchronous core of the client: phase, generation and backoff.
///
/// Contains no I/O, so every transition is unit-testable.
#[derive(Debug)]
pub struct ConnectionManager {
    phase: ConnectionPhase,
    generation: u64,
    /// Generation of the transport currently owned, if any.
    live: Option<u64>,
    reconnect_pending: bool,
    backoff: Backoff,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}

impl ConnectionManager {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            phase: ConnectionPhase::Unconnected,
            generation: 0,
            live: None,
            reconnect_pending: false,
            backoff,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn retry_delay(&self) -> Duration {
        self.backoff.current()
    }

    /// Generation of the transport currently owned, if any.
    pub fn live_generation(&self) -> Option<u64> {
        self.live
    }

    fn is_current(&self, generation: u64) -> bool {
        self.live == Some(generation)
    }

    /// Start a new attempt. Any previous transport is superseded.
    pub fn begin_connect(&mut self) -> u64 {
        self.generation += 1;
        self.live = Some(self.generation);
        self.reconnect_pending = false;
        self.phase = ConnectionPhase::Unconnected;
        self.generation
    }

    /// Returns `false` for a stale generation.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            log::debug!("ignoring open from stale generation {generation}");
            return false;
        }
        self.phase = ConnectionPhase::Connected;
        self.backoff.reset();
        true
    }

    /// Decode one binary frame. Malformed frames are logged and dropped.
    pub fn on_frame(&mut self, generation: u64, frame: Bytes) -> Option<Inbound> {
        if !self.is_current(generation) {
            log::debug!("dropping {} byte frame from stale generation {generation}", frame.len());
            return None;
        }

        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("dropping frame: {e}");
                return None;
            }
        };

        let inbound = match Inbound::decode(&envelope) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => {
                log::debug!("ignoring {:?} envelope", envelope.kind);
                return None;
            }
            Err(e) => {
                log::warn!("dropping {:?} payload: {e}", envelope.kind);
                return None;
            }
        };

        if let Inbound::Registered(player) = &inbound {
            log::info!("registered as {:?}", player.name);
            self.phase = ConnectionPhase::Registered;
        }
        Some(inbound)
    }

    /// Record a close or failed connect. Returns the reconnect delay, or
    /// `None` when the event belongs to a superseded transport.
    pub fn on_close(&mut self, generation: u64, error: Option<&TransportError>) -> Option<Duration> {
        if !self.is_current(generation) {
            log::debug!("ignoring close from stale generation {generation}");
            return None;
        }
        self.live = None;
        self.phase = ConnectionPhase::Unconnected;
        self.reconnect_pending = true;
        let delay = self.backoff.fail();
        match error {
            Some(e) => log::warn!("connection lost: {e}, retrying in {delay:?}"),
            None => log::info!("connection closed, retrying in {delay:?}"),
        }
        Some(delay)
    }

    /// Watchdog check: no transport and nothing scheduled.
    pub fn needs_connect(&self) -> bool {
        self.live.is_none() && !self.reconnect_pending
    }
}

// ─── Async driver ──────────────────────────────────────────────

#[derive(Debug)]
enum ConnectionEvent {
    Opened(mpsc::Sender<Bytes>),
    Frame(Bytes),
    Closed(Option<TransportError>),
}

/// Cloneable handle for sending frames and observing the phase.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    outbound: mpsc::Sender<Bytes>,
    phase: watch::Receiver<ConnectionPhase>,
}

impl ClientHandle {
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// Queue an encoded envelope. Returns `false` if the queue is full or
    /// the client has shut down.
    pub fn send_frame(&self, frame: Bytes) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

/// A running client: the driver task plus its handle and event stream.
pub struct SyncClient {
    handle: ClientHandle,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
    task: JoinHandle<()>,
}

impl SyncClient {
    /// Spawn the driver and start connecting immediately.
    pub fn spawn(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Unconnected);
        let (conn_tx, conn_rx) = mpsc::channel(256);

        let driver = Driver::new(config, event_tx, phase_tx, conn_tx);
        let task = tokio::spawn(driver.run(conn_rx, outbound_rx));

        Self {
            handle: ClientHandle {
                outbound: outbound_tx,
                phase: phase_rx,
            },
            event_rx: Some(event_rx),
            task,
        }
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.handle.phase()
    }

    /// Stop the driver; the live connection task is aborted with it.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

struct Driver {
    config: ClientConfig,
    manager: ConnectionManager,
    events: mpsc::Sender<ClientEvent>,
    phase: watch::Sender<ConnectionPhase>,
    conn_tx: mpsc::Sender<(u64, ConnectionEvent)>,
    connection: Option<JoinHandle<()>>,
    writer: Option<mpsc::Sender<Bytes>>,
    reconnect_at: Option<Instant>,
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Some(task) = self.connection.take() {
            task.abort();
        }
    }
}

impl Driver {
    fn new(
        config: ClientConfig,
        events: mpsc::Sender<ClientEvent>,
        phase: watch::Sender<ConnectionPhase>,
        conn_tx: mpsc::Sender<(u64, ConnectionEvent)>,
    ) -> Self {
        Self {
            manager: ConnectionManager::new(Backoff::new(config.initial_retry, config.max_retry)),
            config,
            events,
            phase,
            conn_tx,
            connection: None,
            writer: None,
            reconnect_at: None,
        }
    }

    async fn run(
        mut self,
        mut conn_rx: mpsc::Receiver<(u64, ConnectionEvent)>,
        mut outbound_rx: mpsc::Receiver<Bytes>,
    ) {
        let mut watchdog = tokio::time::interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        self.connect();

        loop {
            tokio::select! {
                Some((generation, event)) = conn_rx.recv() => {
                    self.handle_connection_event(generation, event).await;
                }
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => self.send(frame),
                    None => break,
                },
                _ = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect();
                }
                _ = watchdog.tick() => self.watchdog().await,
            }
        }

        log::debug!("all client handles dropped, driver exiting");
    }

    /// Catch a transport that is missing, or whose task ended without
    /// reporting a close.
    async fn watchdog(&mut self) {
        if self.manager.needs_connect() {
            log::info!("watchdog: no live transport, reconnecting");
            self.connect();
            return;
        }
        if !self.connection.as_ref().is_some_and(|task| task.is_finished()) {
            return;
        }
        // A close already queued for this generation becomes stale and is dropped.
        if let Some(generation) = self.manager.live_generation() {
            log::warn!("watchdog: connection task {generation} ended without a close");
            self.handle_connection_event(generation, ConnectionEvent::Closed(None))
                .await;
        }
    }

    fn connect(&mut self) {
        if let Some(task) = self.connection.take() {
            task.abort();
        }
        self.writer = None;

        let generation = self.manager.begin_connect();
        self.publish_phase();
        log::info!("connecting to {} (attempt {generation})", self.config.url);

        let url = self.config.url.clone();
        let events = self.conn_tx.clone();
        let capacity = self.config.outbound_capacity.max(1);
        let handshake = self.config.connect_timeout;
        self.connection = Some(tokio::spawn(run_connection(
            generation, url, handshake, capacity, events,
        )));
    }

    async fn handle_connection_event(&mut self, generation: u64, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened(writer) => {
                if self.manager.on_open(generation) {
                    log::info!("connected to {}", self.config.url);
                    self.writer = Some(writer);
                    self.reconnect_at = None;
                    self.publish_phase();
                    self.emit(ClientEvent::Connected).await;
                }
            }
            ConnectionEvent::Frame(frame) => {
                if let Some(inbound) = self.manager.on_frame(generation, frame) {
                    self.publish_phase();
                    self.emit(ClientEvent::Message(inbound)).await;
                }
            }
            ConnectionEvent::Closed(error) => {
                if let Some(delay) = self.manager.on_close(generation, error.as_ref()) {
                    self.writer = None;
                    self.connection = None;
                    self.reconnect_at = Some(Instant::now() + delay);
                    self.publish_phase();
                    self.emit(ClientEvent::Disconnected { retry_in: delay }).await;
                }
            }
        }
    }

    fn send(&mut self, frame: Bytes) {
        match &self.writer {
            Some(writer) => {
                if writer.try_send(frame).is_err() {
                    log::warn!("writer queue full or closed, dropping outbound frame");
                }
            }
            None => log::debug!("no live transport, dropping {} byte frame", frame.len()),
        }
    }

    fn publish_phase(&self) {
        self.phase.send_replace(self.manager.phase());
    }

    async fn emit(&self, event: ClientEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("event receiver dropped");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// One transport attempt: connect, then pump frames both ways until close.
async fn run_connection(
    generation: u64,
    url: String,
    handshake: Duration,
    capacity: usize,
    events: mpsc::Sender<(u64, ConnectionEvent)>,
) {
    let attempt = tokio::time::timeout(handshake, tokio_tungstenite::connect_async(url.as_str()));
    let reason = match attempt.await {
        Ok(Ok((stream, _response))) => {
            pump(generation, stream, capacity, events).await;
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("no handshake within {handshake:?}"),
    };
    let error = TransportError::Connect { url, reason };
    let _ = events.send((generation, ConnectionEvent::Closed(Some(error)))).await;
}

async fn pump(
    generation: u64,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    capacity: usize,
    events: mpsc::Sender<(u64, ConnectionEvent)>,
) {
    let (mut sink, mut source) = stream.split();
    let (writer_tx, mut writer_rx) = mpsc::channel::<Bytes>(capacity);
    if events.send((generation, ConnectionEvent::Opened(writer_tx))).await.is_err() {
        return;
    }

    let error = loop {
        tokio::select! {
            msg = source.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    if events.send((generation, ConnectionEvent::Frame(data))).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| TransportError::Closed(u16::from(f.code)));
                }
                // Text frames carry nothing for us; ping/pong is answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(TransportError::Read(e.to_string())),
                None => break None,
            },
            Some(frame) = writer_rx.recv() => {
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    break Some(TransportError::Write(e.to_string()));
                }
            }
        }
    };

    let _ = events.send((generation, ConnectionEvent::Closed(error))).await;
}
