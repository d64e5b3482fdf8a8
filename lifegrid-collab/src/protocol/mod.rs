//! Binary protocol between the client and the simulation server.
//!
//! Every WebSocket frame carries one [`Envelope`]:
//!
//! ```text
//! Envelope { 1: varint kind, 2: bytes content }
//!                                  │
//!     kind ────────────────────────┼─► REGISTER     Player   { 1: name, 2: fixed32 color }
//!                                  ├─► WORLD_DATA   WorldData{ 1: width, 2: height, 3: cells, 4: tick, 5: paused }
//!                                  ├─► COMMAND      Command  { 1: kind, 2: x, 3: y, 4: text }
//!                                  ├─► PLAYERS      Roster   { 1: repeated Player }
//!                                  └─► RLE_OPTIONS  Catalog  { 1: repeated Pattern{ 1: name, 2: w, 3: h, 4: cells } }
//! ```
//!
//! Field encoding is protobuf-compatible (see [`wire`]). Board cells travel as
//! a packed run of little-endian `u32` words, one [`PackedCell`] each.
//!
//! Decoding never panics: malformed input surfaces as
//! [`ProtocolError::MalformedMessage`] and the caller drops that one frame.

pub mod wire;

use bytes::Bytes;
use lifegrid_core::{BoardSnapshot, Command, PackedCell, Pattern, Player};
use thiserror::Error;

use self::wire::{FieldReader, FieldWriter};

/// Patterns larger than this are dropped from the catalog.
pub const MAX_PATTERN_AREA: u64 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Envelope kind. Values the client does not know are kept as `Unknown`
/// and ignored by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Register,
    EnterWorld,
    LeaveWorld,
    WorldData,
    Command,
    Players,
    RleOptions,
    Unknown(u64),
}

impl MessageType {
    pub fn from_wire(value: u64) -> Self {
        match value {
            0 => MessageType::Register,
            1 => MessageType::EnterWorld,
            2 => MessageType::LeaveWorld,
            3 => MessageType::WorldData,
            4 => MessageType::Command,
            5 => MessageType::Players,
            6 => MessageType::RleOptions,
            other => MessageType::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u64 {
        match self {
            MessageType::Register => 0,
            MessageType::EnterWorld => 1,
            MessageType::LeaveWorld => 2,
            MessageType::WorldData => 3,
            MessageType::Command => 4,
            MessageType::Players => 5,
            MessageType::RleOptions => 6,
            MessageType::Unknown(other) => other,
        }
    }
}

/// Outer frame: a kind tag plus the still-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: MessageType,
    pub content: Bytes,
}

impl Envelope {
    pub fn new(kind: MessageType, content: impl Into<Bytes>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut w = FieldWriter::new();
        w.uint64(1, self.kind.to_wire()).bytes(2, &self.content);
        w.finish()
    }

    pub fn decode(frame: Bytes) -> Result<Self> {
        let mut kind = MessageType::Register;
        let mut content = Bytes::new();

        let mut r = FieldReader::new(frame);
        while let Some(field) = r.next_field()? {
            match field.number {
                1 => kind = MessageType::from_wire(field.as_u64()?),
                2 => content = field.as_bytes()?,
                _ => {}
            }
        }

        Ok(Self { kind, content })
    }
}

/// A payload that can live inside an [`Envelope`].
pub trait WireMessage: Sized {
    fn write_fields(&self, w: &mut FieldWriter);

    fn decode(buf: Bytes) -> Result<Self>;

    fn encode(&self) -> Bytes {
        let mut w = FieldWriter::new();
        self.write_fields(&mut w);
        w.finish()
    }
}

impl WireMessage for Player {
    fn write_fields(&self, w: &mut FieldWriter) {
        w.string(1, &self.name).fixed32(2, self.color);
    }

    fn decode(buf: Bytes) -> Result<Self> {
        let mut player = Player::default();
        let mut r = FieldReader::new(buf);
        while let Some(field) = r.next_field()? {
            match field.number {
                1 => player.name = field.as_string()?,
                2 => player.color = field.as_fixed32()?,
                _ => {}
            }
        }
        Ok(player)
    }
}

const COMMAND_MARK_CELL: u64 = 0;
const COMMAND_PLACE_RLE: u64 = 1;
const COMMAND_TOGGLE_PAUSE: u64 = 2;
const COMMAND_CLEAR_BOARD: u64 = 4;

impl WireMessage for Command {
    fn write_fields(&self, w: &mut FieldWriter) {
        match self {
            Command::MarkCell { x, y } => {
                w.uint64(1, COMMAND_MARK_CELL)
                    .uint64(2, u64::from(*x))
                    .uint64(3, u64::from(*y));
            }
            Command::PlacePattern { name, x, y } => {
                w.uint64(1, COMMAND_PLACE_RLE)
                    .uint64(2, u64::from(*x))
                    .uint64(3, u64::from(*y))
                    .string(4, name);
            }
            Command::TogglePause => {
                w.uint64(1, COMMAND_TOGGLE_PAUSE);
            }
            Command::ClearBoard => {
                w.uint64(1, COMMAND_CLEAR_BOARD);
            }
        }
    }

    fn decode(buf: Bytes) -> Result<Self> {
        let (mut kind, mut x, mut y, mut text) = (0u64, 0u32, 0u32, String::new());
        let mut r = FieldReader::new(buf);
        while let Some(field) = r.next_field()? {
            match field.number {
                1 => kind = field.as_u64()?,
                2 => x = field.as_u32()?,
                3 => y = field.as_u32()?,
                4 => text = field.as_string()?,
                _ => {}
            }
        }

        match kind {
            COMMAND_MARK_CELL => Ok(Command::MarkCell { x, y }),
            COMMAND_PLACE_RLE => Ok(Command::PlacePattern { name: text, x, y }),
            COMMAND_TOGGLE_PAUSE => Ok(Command::TogglePause),
            COMMAND_CLEAR_BOARD => Ok(Command::ClearBoard),
            other => Err(ProtocolError::MalformedMessage(format!(
                "unsupported command kind {other}"
            ))),
        }
    }
}

/// Board update as it appears on the wire.
///
/// Dimensions are signed on the wire; [`WorldData::into_snapshot`] clamps
/// them. A width or height of zero means "unchanged since the last full
/// update".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldData {
    pub width: i64,
    pub height: i64,
    pub cells: Vec<PackedCell>,
    pub tick: i64,
    pub paused: bool,
}

impl WorldData {
    pub fn from_snapshot(board: &BoardSnapshot) -> Self {
        Self {
            width: clamp_to_i64(board.width()),
            height: clamp_to_i64(board.height()),
            cells: board.cells().to_vec(),
            tick: clamp_to_i64(board.tick()),
            paused: board.paused(),
        }
    }

    /// Build a snapshot, inheriting dimensions from `previous` when this
    /// update omits them.
    pub fn into_snapshot(self, previous: Option<&BoardSnapshot>) -> BoardSnapshot {
        let mut width = non_negative("width", self.width);
        let mut height = non_negative("height", self.height);
        if width == 0 || height == 0 {
            if let Some(prev) = previous {
                width = prev.width();
                height = prev.height();
            }
        }
        let tick = non_negative("tick", self.tick);
        BoardSnapshot::new(width, height, tick, self.paused, self.cells)
    }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn non_negative(what: &str, value: i64) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| {
        log::warn!("{}", ProtocolError::ProtocolViolation(format!("negative {what} {value}, using 0")));
        0
    })
}

impl WireMessage for WorldData {
    fn write_fields(&self, w: &mut FieldWriter) {
        let mut data = Vec::with_capacity(self.cells.len() * 4);
        for cell in &self.cells {
            data.extend_from_slice(&cell.to_le_bytes());
        }
        w.int64(1, self.width)
            .int64(2, self.height)
            .bytes(3, &data)
            .int64(4, self.tick)
            .bool(5, self.paused);
    }

    fn decode(buf: Bytes) -> Result<Self> {
        let mut world = WorldData::default();
        let mut r = FieldReader::new(buf);
        while let Some(field) = r.next_field()? {
            match field.number {
                1 => world.width = field.as_i64()?,
                2 => world.height = field.as_i64()?,
                // Packed repeated field: split occurrences concatenate.
                3 => append_packed_cells(&mut world.cells, &field.as_bytes()?),
                4 => world.tick = field.as_i64()?,
                5 => world.paused = field.as_bool()?,
                _ => {}
            }
        }
        Ok(world)
    }
}

fn append_packed_cells(cells: &mut Vec<PackedCell>, data: &[u8]) {
    let words = data.chunks_exact(4);
    if !words.remainder().is_empty() {
        log::warn!(
            "{}",
            ProtocolError::ProtocolViolation(format!(
                "cell data length {} is not a multiple of 4, dropping {} trailing bytes",
                data.len(),
                words.remainder().len()
            ))
        );
    }
    cells.extend(words.map(|w| PackedCell(u32::from_le_bytes([w[0], w[1], w[2], w[3]]))));
}

/// Players currently online, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster(pub Vec<Player>);

impl WireMessage for Roster {
    fn write_fields(&self, w: &mut FieldWriter) {
        for player in &self.0 {
            w.embedded(1, &player.encode());
        }
    }

    fn decode(buf: Bytes) -> Result<Self> {
        let mut players = Vec::new();
        let mut r = FieldReader::new(buf);
        while let Some(field) = r.next_field()? {
            if field.number == 1 {
                players.push(Player::decode(field.as_bytes()?)?);
            }
        }
        Ok(Roster(players))
    }
}

/// Patterns the server can stamp.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog(pub Vec<Pattern>);

fn write_pattern(pattern: &Pattern) -> Bytes {
    let cells: Vec<u8> = pattern
        .cells()
        .iter()
        .map(|alive| if *alive { 0xFF } else { 0x00 })
        .collect();
    let mut w = FieldWriter::new();
    w.string(1, pattern.name())
        .uint64(2, u64::from(pattern.width()))
        .uint64(3, u64::from(pattern.height()))
        .bytes(4, &cells);
    w.finish()
}

/// `Ok(None)` when the entry is well-formed but unusable.
fn read_pattern(buf: Bytes) -> Result<Option<Pattern>> {
    let (mut name, mut width, mut height, mut cells) = (String::new(), 0u32, 0u32, Bytes::new());
    let mut r = FieldReader::new(buf);
    while let Some(field) = r.next_field()? {
        match field.number {
            1 => name = field.as_string()?,
            2 => width = field.as_u32()?,
            3 => height = field.as_u32()?,
            4 => cells = field.as_bytes()?,
            _ => {}
        }
    }

    let area = u64::from(width) * u64::from(height);
    if area > MAX_PATTERN_AREA {
        log::warn!(
            "{}",
            ProtocolError::ProtocolViolation(format!(
                "pattern {name:?} is {width}×{height}, above the {MAX_PATTERN_AREA} cell limit"
            ))
        );
        return Ok(None);
    }

    let mask = cells.iter().map(|b| *b != 0).collect();
    Ok(Some(Pattern::new(name, width, height, mask)))
}

impl WireMessage for Catalog {
    fn write_fields(&self, w: &mut FieldWriter) {
        for pattern in &self.0 {
            w.embedded(1, &write_pattern(pattern));
        }
    }

    fn decode(buf: Bytes) -> Result<Self> {
        let mut patterns = Vec::new();
        let mut r = FieldReader::new(buf);
        while let Some(field) = r.next_field()? {
            if field.number == 1 {
                if let Some(pattern) = read_pattern(field.as_bytes()?)? {
                    patterns.push(pattern);
                }
            }
        }
        Ok(Catalog(patterns))
    }
}

/// Typed server → client payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Registration acknowledgement: the server echoes the accepted player.
    Registered(Player),
    World(WorldData),
    Roster(Vec<Player>),
    Catalog(Vec<Pattern>),
}

impl Inbound {
    /// Decode the payload selected by the envelope kind.
    ///
    /// Kinds without client-side meaning yield `Ok(None)`.
    pub fn decode(envelope: &Envelope) -> Result<Option<Self>> {
        let content = envelope.content.clone();
        let inbound = match envelope.kind {
            MessageType::Register => Inbound::Registered(Player::decode(content)?),
            MessageType::WorldData => Inbound::World(WorldData::decode(content)?),
            MessageType::Players => Inbound::Roster(Roster::decode(content)?.0),
            MessageType::RleOptions => Inbound::Catalog(Catalog::decode(content)?.0),
            MessageType::EnterWorld
            | MessageType::LeaveWorld
            | MessageType::Command
            | MessageType::Unknown(_) => return Ok(None),
        };
        Ok(Some(inbound))
    }

    pub fn kind(&self) -> MessageType {
        match self {
            Inbound::Registered(_) => MessageType::Register,
            Inbound::World(_) => MessageType::WorldData,
            Inbound::Roster(_) => MessageType::Players,
            Inbound::Catalog(_) => MessageType::RleOptions,
        }
    }

    /// Full frame bytes, as a server would send them.
    pub fn encode(&self) -> Bytes {
        let content = match self {
            Inbound::Registered(player) => player.encode(),
            Inbound::World(world) => world.encode(),
            Inbound::Roster(players) => Roster(players.clone()).encode(),
            Inbound::Catalog(patterns) => Catalog(patterns.clone()).encode(),
        };
        Envelope::new(self.kind(), content).encode()
    }
}

/// Typed client → server payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Register(Player),
    Command(Command),
}

impl Outbound {
    pub fn kind(&self) -> MessageType {
        match self {
            Outbound::Register(_) => MessageType::Register,
            Outbound::Command(_) => MessageType::Command,
        }
    }

    pub fn encode(&self) -> Bytes {
        let content = match self {
            Outbound::Register(player) => player.encode(),
            Outbound::Command(command) => command.encode(),
        };
        Envelope::new(self.kind(), content).encode()
    }

    /// Server-side view of a client frame.
    pub fn decode(envelope: &Envelope) -> Result<Option<Self>> {
        let content = envelope.content.clone();
        match envelope.kind {
            MessageType::Register => Ok(Some(Outbound::Register(Player::decode(content)?))),
            MessageType::Command => Ok(Some(Outbound::Command(Command::decode(content)?))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifegrid_core::{pack_rows, Rgb};

    fn roundtrip<T: WireMessage + PartialEq + std::fmt::Debug>(value: T) {
        let decoded = T::decode(value.encode()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_message_type_values() {
        assert_eq!(MessageType::Register.to_wire(), 0);
        assert_eq!(MessageType::EnterWorld.to_wire(), 1);
        assert_eq!(MessageType::LeaveWorld.to_wire(), 2);
        assert_eq!(MessageType::WorldData.to_wire(), 3);
        assert_eq!(MessageType::Command.to_wire(), 4);
        assert_eq!(MessageType::Players.to_wire(), 5);
        assert_eq!(MessageType::RleOptions.to_wire(), 6);
        assert_eq!(MessageType::from_wire(99), MessageType::Unknown(99));
    }

    #[test]
    fn test_envelope_roundtrip() {
        for kind in [MessageType::Register, MessageType::WorldData, MessageType::Unknown(42)] {
            let env = Envelope::new(kind, Bytes::from_static(b"payload"));
            assert_eq!(Envelope::decode(env.encode()).unwrap(), env);
        }
        let empty = Envelope::new(MessageType::Register, Bytes::new());
        assert!(empty.encode().is_empty());
        assert_eq!(Envelope::decode(Bytes::new()).unwrap(), empty);
    }

    #[test]
    fn test_envelope_garbage_is_malformed() {
        let result = Envelope::decode(Bytes::from_static(&[0xFF, 0xFE, 0xFD]));
        assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn test_player_roundtrip() {
        roundtrip(Player::new("alice", 0xFF88_0000));
        roundtrip(Player::new("", 0));
        roundtrip(Player::new("ünïcødé", u32::MAX));
    }

    #[test]
    fn test_command_roundtrip() {
        roundtrip(Command::TogglePause);
        roundtrip(Command::ClearBoard);
        roundtrip(Command::MarkCell { x: 0, y: 0 });
        roundtrip(Command::MarkCell { x: 999, y: u32::MAX });
        roundtrip(Command::place_pattern("glider", 10, 20));
        roundtrip(Command::place_pattern("", 0, 0));
    }

    #[test]
    fn test_unknown_command_kind() {
        let mut w = FieldWriter::new();
        w.uint64(1, 3);
        assert!(Command::decode(w.finish()).is_err());
    }

    #[test]
    fn test_world_data_roundtrip() {
        let cells = pack_rows(8, 3, |x, y| (x == y).then_some((Rgb::new(1, 2, 3), 127)));
        roundtrip(WorldData {
            width: 8,
            height: 3,
            cells,
            tick: 123_456_789_012,
            paused: true,
        });
        roundtrip(WorldData::default());
        roundtrip(WorldData {
            width: -4,
            height: i64::MAX,
            cells: vec![PackedCell(u32::MAX)],
            tick: -1,
            paused: false,
        });
    }

    #[test]
    fn test_world_data_trailing_bytes_dropped() {
        let mut w = FieldWriter::new();
        w.bytes(3, &[0x03, 0, 0, 0, 0x02, 0]);
        let world = WorldData::decode(w.finish()).unwrap();
        assert_eq!(world.cells, vec![PackedCell(0x03)]);
    }

    #[test]
    fn test_world_data_split_cell_fields_concatenate() {
        let mut w = FieldWriter::new();
        w.bytes(3, &[0x03, 0, 0, 0]).bytes(3, &[0x02, 0, 0, 0]);
        let world = WorldData::decode(w.finish()).unwrap();
        assert_eq!(world.cells, vec![PackedCell(0x03), PackedCell(0x02)]);
    }

    #[test]
    fn test_into_snapshot_inherits_dimensions() {
        let full = WorldData {
            width: 4,
            height: 2,
            cells: vec![PackedCell(0x03)],
            tick: 1,
            paused: false,
        }
        .into_snapshot(None);
        assert_eq!((full.width(), full.height()), (4, 2));

        let partial = WorldData {
            cells: vec![PackedCell(0x02), PackedCell(0x03)],
            tick: 2,
            paused: true,
            ..WorldData::default()
        }
        .into_snapshot(Some(&full));
        assert_eq!((partial.width(), partial.height(), partial.tick()), (4, 2, 2));
        assert!(partial.paused());
    }

    #[test]
    fn test_snapshot_survives_the_wire() {
        let cells = pack_rows(5, 4, |x, y| (x + y == 4).then_some((Rgb::new(9, 8, 7), 64)));
        let board = BoardSnapshot::new(5, 4, 99, true, cells);
        let decoded = WorldData::decode(WorldData::from_snapshot(&board).encode()).unwrap();
        let rebuilt = decoded.into_snapshot(None);
        assert_eq!(rebuilt, board);
        assert_eq!(rebuilt.token(), board.token());
    }

    #[test]
    fn test_into_snapshot_clamps_negatives() {
        let snapshot = WorldData {
            width: -5,
            height: 3,
            cells: Vec::new(),
            tick: -7,
            paused: false,
        }
        .into_snapshot(None);
        assert_eq!((snapshot.width(), snapshot.tick()), (0, 0));
        assert!(snapshot.is_zero_area());
    }

    #[test]
    fn test_roster_roundtrip() {
        roundtrip(Roster(Vec::new()));
        roundtrip(Roster(vec![Player::new("", 0), Player::new("bob", 0x00FF_0000)]));
        let many = (0..1000).map(|i| Player::new(format!("p{i}"), i)).collect();
        roundtrip(Roster(many));
    }

    #[test]
    fn test_catalog_roundtrip() {
        roundtrip(Catalog(vec![
            Pattern::from_rows("glider", &[".o.", "..o", "ooo"]),
            Pattern::new("empty", 0, 0, Vec::new()),
        ]));
    }

    #[test]
    fn test_oversized_pattern_dropped() {
        let mut entry = FieldWriter::new();
        entry.string(1, "huge").uint64(2, 100_000).uint64(3, 100_000);
        let mut w = FieldWriter::new();
        w.embedded(1, &entry.finish());
        w.embedded(1, &write_pattern(&Pattern::from_rows("dot", &["o"])));

        let catalog = Catalog::decode(w.finish()).unwrap();
        assert_eq!(catalog.0.len(), 1);
        assert_eq!(catalog.0[0].name(), "dot");
    }

    #[test]
    fn test_inbound_dispatch_by_kind() {
        let frame = Inbound::Registered(Player::new("alice", 1)).encode();
        let env = Envelope::decode(frame).unwrap();
        assert_eq!(
            Inbound::decode(&env).unwrap(),
            Some(Inbound::Registered(Player::new("alice", 1)))
        );

        let ignored = Envelope::new(MessageType::Unknown(77), Bytes::from_static(b"\xFF"));
        assert_eq!(Inbound::decode(&ignored).unwrap(), None);

        let enter = Envelope::new(MessageType::EnterWorld, Bytes::new());
        assert_eq!(Inbound::decode(&enter).unwrap(), None);
    }

    #[test]
    fn test_inbound_garbled_payload_is_malformed() {
        let env = Envelope::new(MessageType::WorldData, Bytes::from_static(&[0x1A, 0x09, 0x00]));
        assert!(matches!(
            Inbound::decode(&env),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_outbound_roundtrip() {
        for out in [
            Outbound::Register(Player::new("carol", 0x1234_5600)),
            Outbound::Command(Command::TogglePause),
            Outbound::Command(Command::place_pattern("glider", 3, 4)),
        ] {
            let env = Envelope::decode(out.encode()).unwrap();
            assert_eq!(env.kind, out.kind());
            assert_eq!(Outbound::decode(&env).unwrap(), Some(out));
        }
    }
}
