//! Packed cell encoding shared by the world-state stream.
//!
//! Every cell on the wire is a single `u32`:
//!
//! ```text
//!  31      24 23      16 15       8 7        1   0
//! ┌──────────┬──────────┬──────────┬──────────┬───┐
//! │   red    │  green   │   blue   │  weight  │ 1 │   alive
//! └──────────┴──────────┴──────────┴──────────┴───┘
//! ┌──────────────────────────────────────────┬───┐
//! │          run length of dead cells        │ 0 │   dead
//! └──────────────────────────────────────────┴───┘
//! ```
//!
//! Player colours use the same `0xRRGGBB__` byte order, so a player's colour
//! can be OR-ed straight into an alive cell.

/// Bit 0: the alive flag.
pub const ALIVE_BIT: u32 = 0x0000_0001;

/// Largest representable aliveness weight (7 bits).
pub const MAX_WEIGHT: u8 = 0x7F;

/// 24-bit colour in the canonical `0xRRGGBB__` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Read the colour from the top three bytes of a packed word.
    pub const fn from_packed(word: u32) -> Self {
        Self {
            r: (word >> 24) as u8,
            g: (word >> 16) as u8,
            b: (word >> 8) as u8,
        }
    }

    /// Place the colour into the top three bytes; the low byte is zero.
    pub const fn to_packed(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8)
    }

    /// Parse `rrggbb` (optionally prefixed with `#`).
    pub fn parse_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        Some(Self::from_packed(value << 8))
    }

    /// Uppercase `RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// One word of the sparse board stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedCell(pub u32);

impl PackedCell {
    /// An alive cell; `weight` is clamped to [`MAX_WEIGHT`].
    pub const fn alive(color: Rgb, weight: u8) -> Self {
        let weight = if weight > MAX_WEIGHT { MAX_WEIGHT } else { weight };
        PackedCell(color.to_packed() | ((weight as u32) << 1) | ALIVE_BIT)
    }

    /// A dead-run marker skipping `run` cells. Runs above `u32::MAX >> 1`
    /// are clamped.
    pub const fn dead_run(run: u32) -> Self {
        let run = if run > (u32::MAX >> 1) { u32::MAX >> 1 } else { run };
        PackedCell(run << 1)
    }

    pub const fn is_alive(self) -> bool {
        self.0 & ALIVE_BIT != 0
    }

    /// Dead cells to skip. Zero for alive cells.
    pub const fn run_length(self) -> u32 {
        if self.is_alive() {
            0
        } else {
            self.0 >> 1
        }
    }

    pub const fn color(self) -> Rgb {
        Rgb::from_packed(self.0)
    }

    /// Aliveness weight in `0..=127`.
    pub const fn weight(self) -> u8 {
        ((self.0 >> 1) & MAX_WEIGHT as u32) as u8
    }

    /// Render alpha for an alive cell: `(weight + 128) / 255`.
    pub fn alpha(self) -> f32 {
        weight_to_alpha(self.weight())
    }

    /// Little-endian wire bytes.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

/// Affine mapping from aliveness weight to render alpha.
pub fn weight_to_alpha(weight: u8) -> f32 {
    (f32::from(weight) + 128.0) / 255.0
}
