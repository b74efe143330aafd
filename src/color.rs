//! Text color parsing and conversion

use crate::error::{Result, TextBehindError};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An 8-bit straight-alpha RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl RgbaColor {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const BLACK: Self = Self::opaque(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse a `#RRGGBB` color picker value into a fully opaque color.
    ///
    /// The leading `#` is optional and hex digits are case-insensitive.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the value is not six hex digits.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TextBehindError::invalid_config(format!(
                "Invalid font color '{}': expected #RRGGBB",
                hex
            )));
        }

        let channel = |range: std::ops::Range<usize>| -> Result<u8> {
            digits
                .get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| TextBehindError::invalid_config(format!("Invalid hex color '{}'", hex)))
        };

        Ok(Self::opaque(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Format as `#RRGGBB`, dropping the alpha channel
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Same color with alpha 0
    #[must_use]
    pub fn transparent(self) -> Self {
        Self { a: 0, ..self }
    }

    #[must_use]
    pub fn to_pixel(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

impl Default for RgbaColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<RgbaColor> for Rgba<u8> {
    fn from(color: RgbaColor) -> Self {
        color.to_pixel()
    }
}

impl FromStr for RgbaColor {
    type Err = TextBehindError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "{}{:02X}", self.to_hex(), self.a)
        }
    }
}
