//! Client-side session state as a pure reducer.
//!
//! Every change goes through [`SessionState::reduce`]: connection events from
//! the client driver, decoded server payloads, and local user intents. The
//! state never performs I/O; the emitter and renderer read from it.

use std::sync::Arc;
use std::time::Duration;

use lifegrid_core::{BoardSnapshot, Pattern, Player, Rgb};

use crate::backoff::INITIAL_DELAY;
use crate::client::{ClientEvent, ConnectionPhase};
use crate::protocol::Inbound;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened,
    Closed { retry_delay: Duration },
    Inbound(Inbound),
    SubmitName { name: String, color: Rgb },
    /// Toggle: arming the armed pattern disarms it.
    ArmPattern(String),
}

impl From<ClientEvent> for SessionEvent {
    fn from(event: ClientEvent) -> Self {
        match event {
            ClientEvent::Connected => SessionEvent::Opened,
            ClientEvent::Disconnected { retry_in } => SessionEvent::Closed {
                retry_delay: retry_in,
            },
            ClientEvent::Message(inbound) => SessionEvent::Inbound(inbound),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    pub local_name: String,
    /// Name the server accepted in its last registration acknowledgement.
    pub remote_name: String,
    pub local_color: Rgb,
    pub roster: Vec<Player>,
    pub catalog: Vec<Pattern>,
    pub active_pattern: Option<Pattern>,
    pub last_board: Option<Arc<BoardSnapshot>>,
    pub retry_delay: Duration,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Unconnected,
            local_name: String::new(),
            remote_name: String::new(),
            local_color: Rgb::BLACK,
            roster: Vec::new(),
            catalog: Vec::new(),
            active_pattern: None,
            last_board: None,
            retry_delay: INITIAL_DELAY,
        }
    }
}

impl SessionState {
    /// Pure transition: returns the next state, leaves `self` untouched.
    pub fn apply(&self, event: &SessionEvent) -> SessionState {
        self.clone().reduce(event.clone())
    }

    /// Owning transition, for callers that replace their state in place.
    pub fn reduce(mut self, event: SessionEvent) -> SessionState {
        match event {
            SessionEvent::Opened => {
                self.phase = ConnectionPhase::Connected;
                self.retry_delay = INITIAL_DELAY;
            }
            SessionEvent::Closed { retry_delay } => {
                return SessionState {
                    retry_delay,
                    ..SessionState::default()
                };
            }
            SessionEvent::Inbound(inbound) => self.apply_inbound(inbound),
            SessionEvent::SubmitName { name, color } => {
                self.local_name = name;
                self.local_color = color;
            }
            SessionEvent::ArmPattern(name) => self.arm_pattern(&name),
        }
        self
    }

    fn apply_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Registered(player) => {
                self.remote_name = player.name;
                self.phase = ConnectionPhase::Registered;
            }
            Inbound::World(world) => {
                let board = world.into_snapshot(self.last_board.as_deref());
                self.last_board = Some(Arc::new(board));
            }
            Inbound::Roster(players) => self.roster = players,
            Inbound::Catalog(patterns) => {
                if let Some(active) = &self.active_pattern {
                    if !patterns.iter().any(|p| p.name() == active.name()) {
                        log::info!("pattern {:?} left the catalog, disarming", active.name());
                        self.active_pattern = None;
                    }
                }
                self.catalog = patterns;
            }
        }
    }

    /// Arming does not depend on the pause flag; the preview and the click
    /// target only matter once the board is paused.
    fn arm_pattern(&mut self, name: &str) {
        if self.active_pattern.as_ref().is_some_and(|p| p.name() == name) {
            self.active_pattern = None;
            return;
        }
        match self.catalog.iter().find(|p| p.name() == name) {
            Some(pattern) => self.active_pattern = Some(pattern.clone()),
            None => log::debug!("no pattern named {name:?} in the catalog"),
        }
    }

    /// The local name has been accepted by the server.
    pub fn name_settled(&self) -> bool {
        !self.local_name.is_empty() && self.local_name == self.remote_name
    }

    pub fn local_player(&self) -> Player {
        Player::with_rgb(self.local_name.clone(), self.local_color)
    }

    pub fn paused(&self) -> bool {
        self.last_board.as_ref().is_some_and(|b| b.paused())
    }

    pub fn find_pattern(&self, name: &str) -> Option<&Pattern> {
        self.catalog.iter().find(|p| p.name() == name)
    }
}
