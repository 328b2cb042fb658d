use rand::Rng;
use serde::{Deserialize, Serialize};

/// Overlay color for one effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`, the form a web overlay expects
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Colors a random effect picks from
pub const PALETTE: [Color; 6] = [
    Color::rgb(255, 0, 85),   // hot pink
    Color::rgb(0, 229, 255),  // cyan
    Color::rgb(255, 214, 0),  // yellow
    Color::rgb(118, 255, 3),  // lime
    Color::rgb(213, 0, 249),  // purple
    Color::rgb(255, 255, 255),
];

/// How an effect's color is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Uniformly at random from `PALETTE`
    #[default]
    Random,
    /// Always white
    White,
}

impl ColorMode {
    pub fn pick(&self) -> Color {
        match self {
            ColorMode::Random => PALETTE[rand::rng().random_range(0..PALETTE.len())],
            ColorMode::White => Color::WHITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_mode_is_fixed() {
        for _ in 0..10 {
            assert_eq!(ColorMode::White.pick(), Color::WHITE);
        }
    }

    #[test]
    fn test_random_mode_stays_in_palette() {
        for _ in 0..100 {
            assert!(PALETTE.contains(&ColorMode::Random.pick()));
        }
    }

    #[test]
    fn test_hex() {
        assert_eq!(Color::rgb(255, 0, 85).hex(), "#ff0055");
        assert_eq!(Color::WHITE.to_string(), "#ffffff");
    }
}
