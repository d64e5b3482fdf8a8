/// A user intent that travels to the server.
///
/// Commands are fire-and-forget: built, encoded, sent, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    MarkCell { x: u32, y: u32 },
    PlacePattern { name: String, x: u32, y: u32 },
    ClearBoard,
}

impl Command {
    pub fn place_pattern(name: impl Into<String>, x: u32, y: u32) -> Self {
        Command::PlacePattern {
            name: name.into(),
            x,
            y,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Command::TogglePause => "toggle-pause",
            Command::MarkCell { .. } => "mark-cell",
            Command::PlacePattern { .. } => "place-pattern",
            Command::ClearBoard => "clear-board",
        }
    }
}
