use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// Helper for const palettes
pub const fn rgb(r: u8, g: u8, b: u8) -> Rgb {
    Rgb { r, g, b }
}

impl Rgb {
    pub const WHITE: Rgb = rgb(255, 255, 255);

    // `amount` is clamped to [0, 1]; channels are truncated like the integer
    // packing of a hex color.
    pub fn lerp(self, other: Rgb, amount: f32) -> Rgb {
        let t = amount.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + t * (b as f32 - a as f32)) as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb(c.r, c.g, c.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a #rrggbb color, got {:?}", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }
        let packed = u32::from_str_radix(hex, 16).map_err(|_| ParseColorError(s.to_string()))?;
        Ok(rgb((packed >> 16) as u8, (packed >> 8) as u8, packed as u8))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenePalette {
    pub sky_top: Rgb,
    pub sky_bottom: Rgb,
    pub mountain_background: Rgb,
    pub mountain_foreground: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swatch {
    pub calm: Rgb,
    pub intense: Rgb,
    pub day: Rgb,
}

impl Swatch {
    pub fn blend(&self, intensity: f32, sunrise_mix: f32) -> Rgb {
        self.calm.lerp(self.intense, intensity).lerp(self.day, sunrise_mix)
    }
}
