//! Turns user intents into outbound frames.
//!
//! Commands are fire-and-forget: nothing is queued while disconnected, and a
//! rejected command is reported once through [`CommandError`].

use bytes::Bytes;
use lifegrid_core::{Command, Player, Rgb};
use thiserror::Error;

use crate::client::ClientHandle;
use crate::protocol::Outbound;
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("not connected")]
    NotConnected,
    #[error("outbound queue rejected the frame")]
    QueueFull,
}

/// Anything that can take an encoded envelope.
pub trait FrameSink {
    /// Returns `false` when the frame was not accepted.
    fn send_frame(&self, frame: Bytes) -> bool;
}

impl FrameSink for ClientHandle {
    fn send_frame(&self, frame: Bytes) -> bool {
        ClientHandle::send_frame(self, frame)
    }
}

pub struct CommandEmitter<S> {
    sink: S,
}

impl<S: FrameSink> CommandEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn emit(&self, session: &SessionState, outbound: Outbound) -> Result<(), CommandError> {
        if !session.phase.is_open() {
            log::debug!("{:?} rejected: not connected", outbound.kind());
            return Err(CommandError::NotConnected);
        }
        if !self.sink.send_frame(outbound.encode()) {
            log::debug!("{:?} rejected by the outbound queue", outbound.kind());
            return Err(CommandError::QueueFull);
        }
        Ok(())
    }

    fn command(&self, session: &SessionState, command: Command) -> Result<(), CommandError> {
        log::debug!("sending {}", command.label());
        self.emit(session, Outbound::Command(command))
    }

    /// Register (or rename) the local player.
    pub fn submit_name(
        &self,
        session: &SessionState,
        name: &str,
        color: Rgb,
    ) -> Result<(), CommandError> {
        self.emit(session, Outbound::Register(Player::with_rgb(name, color)))
    }

    pub fn toggle_pause(&self, session: &SessionState) -> Result<(), CommandError> {
        self.command(session, Command::TogglePause)
    }

    pub fn mark_cell(&self, session: &SessionState, x: u32, y: u32) -> Result<(), CommandError> {
        self.command(session, Command::MarkCell { x, y })
    }

    pub fn place_pattern(
        &self,
        session: &SessionState,
        name: &str,
        x: u32,
        y: u32,
    ) -> Result<(), CommandError> {
        self.command(session, Command::place_pattern(name, x, y))
    }

    pub fn clear_board(&self, session: &SessionState) -> Result<(), CommandError> {
        self.command(session, Command::ClearBoard)
    }

    /// A click on a cell: stamp the armed pattern there, or mark the cell.
    pub fn click_cell(&self, session: &SessionState, x: u32, y: u32) -> Result<(), CommandError> {
        match &session.active_pattern {
            Some(pattern) => self.place_pattern(session, pattern.name(), x, y),
            None => self.mark_cell(session, x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionPhase;
    use crate::protocol::{Envelope, Inbound};
    use crate::session::SessionEvent;
    use lifegrid_core::Pattern;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        frames: RefCell<Vec<Bytes>>,
        reject: bool,
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&self, frame: Bytes) -> bool {
            if self.reject {
                return false;
            }
            self.frames.borrow_mut().push(frame);
            true
        }
    }

    fn sent(emitter: &CommandEmitter<RecordingSink>) -> Vec<Outbound> {
        emitter
            .sink()
            .frames
            .borrow()
            .iter()
            .map(|f| {
                let env = Envelope::decode(f.clone()).unwrap();
                Outbound::decode(&env).unwrap().unwrap()
            })
            .collect()
    }

    fn connected() -> SessionState {
        SessionState {
            phase: ConnectionPhase::Connected,
            ..SessionState::default()
        }
    }

    #[test]
    fn test_not_connected_rejected() {
        let emitter = CommandEmitter::new(RecordingSink::default());
        let session = SessionState::default();
        assert_eq!(emitter.toggle_pause(&session), Err(CommandError::NotConnected));
        assert!(emitter.sink().frames.borrow().is_empty());
    }

    #[test]
    fn test_queue_full() {
        let emitter = CommandEmitter::new(RecordingSink {
            reject: true,
            ..RecordingSink::default()
        });
        assert_eq!(emitter.clear_board(&connected()), Err(CommandError::QueueFull));
    }

    #[test]
    fn test_submit_name_sends_register() {
        let emitter = CommandEmitter::new(RecordingSink::default());
        emitter
            .submit_name(&connected(), "alice", Rgb::new(0x12, 0x34, 0x56))
            .unwrap();
        assert_eq!(
            sent(&emitter),
            vec![Outbound::Register(Player::new("alice", 0x1234_5600))]
        );
    }

    #[test]
    fn test_commands_encode() {
        let emitter = CommandEmitter::new(RecordingSink::default());
        let session = connected();
        emitter.toggle_pause(&session).unwrap();
        emitter.mark_cell(&session, 10, 20).unwrap();
        emitter.place_pattern(&session, "glider", 1, 2).unwrap();
        emitter.clear_board(&session).unwrap();

        assert_eq!(
            sent(&emitter),
            vec![
                Outbound::Command(Command::TogglePause),
                Outbound::Command(Command::MarkCell { x: 10, y: 20 }),
                Outbound::Command(Command::place_pattern("glider", 1, 2)),
                Outbound::Command(Command::ClearBoard),
            ]
        );
    }

    #[test]
    fn test_click_uses_armed_pattern() {
        let emitter = CommandEmitter::new(RecordingSink::default());
        let session = connected()
            .reduce(SessionEvent::Inbound(Inbound::Catalog(vec![Pattern::from_rows(
                "glider",
                &[".o.", "..o", "ooo"],
            )])));

        emitter.click_cell(&session, 3, 4).unwrap();
        let armed = session.apply(&SessionEvent::ArmPattern("glider".into()));
        emitter.click_cell(&armed, 5, 6).unwrap();

        assert_eq!(
            sent(&emitter),
            vec![
                Outbound::Command(Command::MarkCell { x: 3, y: 4 }),
                Outbound::Command(Command::place_pattern("glider", 5, 6)),
            ]
        );
    }
}
