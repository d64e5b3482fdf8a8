//! Application state: wires the session, renderer and command emitter.
//!
//! `AppState` is the single owner of everything the driver loop touches:
//! client events and stdin commands both come through here, and every
//! visible change ends in [`AppState::repaint`].

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use lifegrid_collab::{
    ClientEvent, CommandEmitter, CommandError, FrameSink, Inbound, SessionEvent, SessionState,
};
use lifegrid_core::Rgb;
use lifegrid_render::{
    CellMapper, FrameStats, PixelSurface, RenderFrame, Renderer, Surface, SurfaceError,
};

use crate::input::{Input, HELP};

/// What the driver should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    Text(String),
    Quit,
}

pub struct AppState<S> {
    pub session: SessionState,
    pub renderer: Renderer,
    pub surface: PixelSurface,
    emitter: CommandEmitter<S>,
    /// Pointer position in surface pixels.
    pub pointer: Option<(f64, f64)>,
    /// Registration replayed on every connect.
    auto_register: Option<(String, Rgb)>,
}

impl<S: FrameSink> AppState<S> {
    pub fn new(emitter: CommandEmitter<S>, auto_register: Option<(String, Rgb)>) -> Result<Self, SurfaceError> {
        let (width, height) = CellMapper::new(0, 0).canvas_size();
        Ok(Self {
            session: SessionState::default(),
            renderer: Renderer::default(),
            surface: PixelSurface::new(width, height)?,
            emitter,
            pointer: None,
            auto_register,
        })
    }

    /// Feed one client event through the session reducer.
    pub fn handle_client_event(&mut self, event: ClientEvent) -> Option<FrameStats> {
        let connected = matches!(event, ClientEvent::Connected);
        let redraw = matches!(
            event,
            ClientEvent::Message(Inbound::World(_)) | ClientEvent::Disconnected { .. }
        );
        if let ClientEvent::Message(Inbound::Roster(players)) = &event {
            log::info!("{} players online", players.len());
        }

        let session = std::mem::take(&mut self.session);
        self.session = session.reduce(event.into());

        if connected {
            if let Some((name, color)) = self.auto_register.clone() {
                self.register(&name, color);
            }
        }
        if redraw {
            self.repaint()
        } else {
            None
        }
    }

    fn register(&mut self, name: &str, color: Rgb) {
        let session = std::mem::take(&mut self.session);
        self.session = session.reduce(SessionEvent::SubmitName {
            name: name.to_owned(),
            color,
        });
        self.report(self.emitter.submit_name(&self.session, name, color));
    }

    fn report(&self, result: Result<(), CommandError>) {
        if let Err(e) = result {
            log::debug!("command dropped: {e}");
        }
    }

    /// Mapping over the surface as it is, which is what the renderer draws
    /// with even when a resize was refused.
    fn mapper(&self) -> Option<CellMapper> {
        let (width, height) = self.surface.size();
        let board = self.session.last_board.as_deref()?;
        Some(CellMapper::with_canvas(board.width(), board.height(), width, height))
    }

    /// Size the surface to the board and redraw if anything changed.
    pub fn repaint(&mut self) -> Option<FrameStats> {
        if let Some(board) = self.session.last_board.as_deref() {
            let (width, height) = CellMapper::for_board(board).canvas_size();
            if let Err(e) = self.surface.resize(width, height) {
                log::warn!("keeping {:?} surface: {e}", self.surface.size());
            }
        }
        let frame = RenderFrame {
            board: self.session.last_board.as_deref(),
            active_pattern: self.session.active_pattern.as_ref(),
            pointer: self.pointer,
            local_color: self.session.local_color,
        };
        self.renderer.repaint(&mut self.surface, &frame)
    }

    pub fn handle_input(&mut self, input: Input) -> Reply {
        match input {
            Input::Name { name, color } => {
                self.auto_register = Some((name.clone(), color));
                self.register(&name, color);
            }
            Input::Pause => self.report(self.emitter.toggle_pause(&self.session)),
            Input::Clear => self.report(self.emitter.clear_board(&self.session)),
            Input::Arm(name) => {
                let session = std::mem::take(&mut self.session);
                self.session = session.reduce(SessionEvent::ArmPattern(name));
                self.repaint();
                let armed = self.session.active_pattern.as_ref().map(|p| p.name().to_owned());
                return Reply::Text(match armed {
                    Some(name) => format!("armed {name}"),
                    None => "no pattern armed".into(),
                });
            }
            Input::Move { x, y } => {
                self.pointer = Some((x, y));
                self.repaint();
            }
            Input::Leave => {
                self.pointer = None;
                self.repaint();
            }
            Input::Click { x, y } => match self.mapper().and_then(|m| m.pixel_to_cell(x, y)) {
                Some((cx, cy)) => self.report(self.emitter.click_cell(&self.session, cx, cy)),
                None => log::debug!("click at ({x}, {y}) is off the board"),
            },
            Input::Players => return Reply::Text(self.players()),
            Input::Patterns => return Reply::Text(self.patterns()),
            Input::Save(path) => {
                return Reply::Text(match self.save(&path) {
                    Ok(()) => format!("saved {}", path.display()),
                    Err(e) => format!("save failed: {e}"),
                });
            }
            Input::Status => return Reply::Text(self.status()),
            Input::Help => return Reply::Text(HELP.into()),
            Input::Quit => return Reply::Quit,
        }
        Reply::Nothing
    }

    fn save(&self, path: &Path) -> Result<(), SurfaceError> {
        let file = File::create(path)?;
        self.surface.write_ppm(BufWriter::new(file))
    }

    fn players(&self) -> String {
        let mut out = format!("{} online", self.session.roster.len());
        for player in &self.session.roster {
            let _ = write!(out, "\n  #{} {}", player.color_hex(), player.name);
        }
        out
    }

    fn patterns(&self) -> String {
        let mut out = format!("{} patterns", self.session.catalog.len());
        for pattern in &self.session.catalog {
            let armed = self
                .session
                .active_pattern
                .as_ref()
                .is_some_and(|p| p.name() == pattern.name());
            let _ = write!(
                out,
                "\n  {}{} ({}×{})",
                if armed { "* " } else { "" },
                pattern.name(),
                pattern.width(),
                pattern.height()
            );
        }
        out
    }

    fn status(&self) -> String {
        let s = &self.session;
        let board = match s.last_board.as_deref() {
            Some(b) => format!(
                "{}×{} tick {}{}",
                b.width(),
                b.height(),
                b.tick(),
                if b.paused() { " (paused)" } else { "" }
            ),
            None => "no board".into(),
        };
        format!(
            "{:?} | name {:?}{} | {board} | {} redraws | retry {:?}",
            s.phase,
            s.local_name,
            if s.name_settled() { " (accepted)" } else { "" },
            self.renderer.redraws(),
            s.retry_delay
        )
    }
}
