//! Display colour with unit-interval channels.

use serde::{Deserialize, Serialize};

/// RGBA colour, each channel in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColourRGBAf {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for ColourRGBAf {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 0.0,
            b: 0.0,
            a: 1.0,
        }
    }
}

impl ColourRGBAf {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self::opaque(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Parse a six-digit `RRGGBB` hex triple (no leading `#`).
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&s[0..2], 16).ok()?;
        let g = u8::from_str_radix(&s[2..4], 16).ok()?;
        let b = u8::from_str_radix(&s[4..6], 16).ok()?;
        Some(Self::from_bytes(r, g, b))
    }

    /// Lowercase `rrggbb` hex form, alpha discarded.
    pub fn to_hex(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}",
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8
        )
    }

    pub fn in_unit_range(&self) -> bool {
        [self.r, self.g, self.b, self.a]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let c = ColourRGBAf::from_hex("00ffa0").unwrap();
        assert_eq!(c.to_hex(), "00ffa0");
        assert!(ColourRGBAf::from_hex("xyzzy!").is_none());
        assert!(ColourRGBAf::from_hex("abcd").is_none());
    }

    #[test]
    fn test_unit_range() {
        assert!(ColourRGBAf::opaque(0.2, 0.4, 1.0).in_unit_range());
        assert!(!ColourRGBAf::opaque(1.2, 0.0, 0.0).in_unit_range());
    }
}
