//! Parameter types for image operations.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100, default 75). Clamped on construction.
//! - [`Color`]: Normalised RGBA colour used for pixel access and fills.
//! - [`Fill`]: How a freshly allocated image is initialised.
//! - [`ScaleFilter`]: Resampling algorithm for the scale family of operations.
//! - [`Optimize2Bw`]: Settings for the scan-to-bi-level conversion.

use crate::error::{ImageError, Result};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// RGBA colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Components clamped to the unit range, as `f32` for pixel math.
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r.clamp(0.0, 1.0) as f32,
            self.g.clamp(0.0, 1.0) as f32,
            self.b.clamp(0.0, 1.0) as f32,
            self.a.clamp(0.0, 1.0) as f32,
        ]
    }

    pub fn from_f32(px: [f32; 4]) -> Self {
        Self::rgba(px[0] as f64, px[1] as f64, px[2] as f64, px[3] as f64)
    }

    /// Rec. 601 luma.
    pub fn luma(self) -> f64 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }
}

impl FromStr for Color {
    type Err = ImageError;

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ImageError::InvalidArgument(format!("invalid color '{s}'"));
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let component = |i: usize, width: usize| -> Result<f64> {
            let digits = &hex[i..i + width];
            let v = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
            let v = if width == 1 { v * 17 } else { v };
            Ok(v as f64 / 255.0)
        };
        match hex.len() {
            3 => Ok(Color::rgb(component(0, 1)?, component(1, 1)?, component(2, 1)?)),
            6 => Ok(Color::rgb(component(0, 2)?, component(2, 2)?, component(4, 2)?)),
            8 => Ok(Color::rgba(
                component(0, 2)?,
                component(2, 2)?,
                component(4, 2)?,
                component(6, 2)?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_f32().map(|c| (c * 255.0).round() as u8);
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

/// Initial content of an image created with
/// [`Image::with_type_and_size`](super::Image::with_type_and_size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fill {
    /// Every sample zero (RGBA 0,0,0,0).
    #[default]
    Transparent,
    /// The handle's background colour.
    Background,
}

/// Resampling algorithm for scale operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFilter {
    /// Box when shrinking, bilinear when enlarging.
    Best,
    Nearest,
    Box,
    Bilinear,
    /// Fast area sampling intended for previews.
    Thumbnail,
}

/// Settings for [`Image::optimize_2bw`](super::Image::optimize_2bw).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optimize2Bw {
    /// Input level mapped to black; 0 detects the darkest ink.
    pub low: u8,
    /// Input level mapped to white; 0 detects the paper colour.
    pub high: u8,
    /// Gray level above which a pixel turns white; 0 means 200.
    pub threshold: u8,
    /// Unsharp mask radius in pixels; 0 skips sharpening.
    pub radius: u32,
    /// Standard deviation of the unsharp mask.
    pub sd: f64,
    /// Rescale to this horizontal DPI before thresholding; 0 keeps the size.
    pub target_dpi: u32,
}

impl Default for Optimize2Bw {
    fn default() -> Self {
        Self {
            low: 0,
            high: 255,
            threshold: 170,
            radius: 3,
            sd: 2.3,
            target_dpi: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 0);
        assert_eq!(Quality::new(80).value(), 80);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn parse_hex_colors() {
        assert_eq!("#ffffff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("000".parse::<Color>().unwrap(), Color::BLACK);
        let c: Color = "#ff000080".parse().unwrap();
        assert_eq!(c.r, 1.0);
        assert!((c.a - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("#12".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
        assert!("#ééé".parse::<Color>().is_err());
    }

    #[test]
    fn color_display_roundtrips() {
        for s in ["#1a2b3c", "#ffffff", "#00000000"] {
            assert_eq!(s.parse::<Color>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn luma_of_white_is_one() {
        assert!((Color::WHITE.luma() - 1.0).abs() < 1e-9);
    }
}
