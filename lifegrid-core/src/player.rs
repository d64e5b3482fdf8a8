use crate::cell::Rgb;

/// A registered participant as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Player {
    pub name: String,
    /// `0xRRGGBB__`, same byte order as packed cells.
    pub color: u32,
}

impl Player {
    pub fn new(name: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    pub fn with_rgb(name: impl Into<String>, rgb: Rgb) -> Self {
        Self::new(name, rgb.to_packed())
    }

    pub fn rgb(&self) -> Rgb {
        Rgb::from_packed(self.color)
    }

    /// `RRGGBB` swatch for roster display.
    pub fn color_hex(&self) -> String {
        self.rgb().to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_ignores_low_byte() {
        let player = Player::new("alice", 0xAB_CD_EF_FF);
        assert_eq!(player.color_hex(), "ABCDEF");
        assert_eq!(player.rgb(), Rgb::new(0xAB, 0xCD, 0xEF));
    }

    #[test]
    fn test_with_rgb() {
        let player = Player::with_rgb("bob", Rgb::new(1, 2, 3));
        assert_eq!(player.color, 0x0102_0300);
    }
}
