//! Colour space naming and conversion.
//!
//! A colour space is a samples-per-pixel / bits-per-sample pair with a
//! short name (`gray1`, `rgb8`, `rgba16`, ...). The `image` crate has no
//! sub-byte buffers, so `gray1`, `gray2` and `gray4` are stored as 8-bit
//! luma quantised to `2^bps` levels.

use crate::error::{ImageError, Result};
use image::{ColorType, DynamicImage, GrayImage};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colorspace {
    Gray1,
    Gray2,
    Gray4,
    Gray8,
    Gray16,
    GrayAlpha8,
    GrayAlpha16,
    Rgb8,
    Rgb16,
    Rgba8,
    Rgba16,
    Rgb32F,
    Rgba32F,
}

/// Threshold used when re-quantising bi-level images after pixel operations.
pub const DEFAULT_THRESHOLD: u8 = 127;

impl Colorspace {
    pub const ALL: [Colorspace; 13] = [
        Colorspace::Gray1,
        Colorspace::Gray2,
        Colorspace::Gray4,
        Colorspace::Gray8,
        Colorspace::Gray16,
        Colorspace::GrayAlpha8,
        Colorspace::GrayAlpha16,
        Colorspace::Rgb8,
        Colorspace::Rgb16,
        Colorspace::Rgba8,
        Colorspace::Rgba16,
        Colorspace::Rgb32F,
        Colorspace::Rgba32F,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Colorspace::Gray1 => "gray1",
            Colorspace::Gray2 => "gray2",
            Colorspace::Gray4 => "gray4",
            Colorspace::Gray8 => "gray8",
            Colorspace::Gray16 => "gray16",
            Colorspace::GrayAlpha8 => "graya8",
            Colorspace::GrayAlpha16 => "graya16",
            Colorspace::Rgb8 => "rgb8",
            Colorspace::Rgb16 => "rgb16",
            Colorspace::Rgba8 => "rgba8",
            Colorspace::Rgba16 => "rgba16",
            Colorspace::Rgb32F => "rgb32f",
            Colorspace::Rgba32F => "rgba32f",
        }
    }

    /// Look up a colour space by name, case-insensitively.
    ///
    /// Accepts the canonical names plus `bw`/`bilevel`, `gray`, `rgb`
    /// and `rgba` as aliases for the 1-bit and 8-bit variants.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let alias = match lower.as_str() {
            "bw" | "bilevel" => Some(Colorspace::Gray1),
            "gray" | "grey" => Some(Colorspace::Gray8),
            "rgb" => Some(Colorspace::Rgb8),
            "rgba" => Some(Colorspace::Rgba8),
            _ => None,
        };
        alias
            .or_else(|| Self::ALL.into_iter().find(|cs| cs.name() == lower))
            .ok_or_else(|| ImageError::UnsupportedColorspace(name.to_string()))
    }

    /// Map a samples-per-pixel / bits-per-sample pair to a colour space.
    pub fn from_layout(spp: u32, bps: u32) -> Result<Self> {
        let cs = match (spp, bps) {
            (1, 1) => Colorspace::Gray1,
            (1, 2) => Colorspace::Gray2,
            (1, 4) => Colorspace::Gray4,
            (1, 8) => Colorspace::Gray8,
            (1, 16) => Colorspace::Gray16,
            (2, 8) => Colorspace::GrayAlpha8,
            (2, 16) => Colorspace::GrayAlpha16,
            (3, 8) => Colorspace::Rgb8,
            (3, 16) => Colorspace::Rgb16,
            (3, 32) => Colorspace::Rgb32F,
            (4, 8) => Colorspace::Rgba8,
            (4, 16) => Colorspace::Rgba16,
            (4, 32) => Colorspace::Rgba32F,
            _ => {
                return Err(ImageError::InvalidArgument(format!(
                    "no colorspace with {spp} samples of {bps} bits"
                )));
            }
        };
        Ok(cs)
    }

    pub fn channels(self) -> u32 {
        match self {
            Colorspace::Gray1
            | Colorspace::Gray2
            | Colorspace::Gray4
            | Colorspace::Gray8
            | Colorspace::Gray16 => 1,
            Colorspace::GrayAlpha8 | Colorspace::GrayAlpha16 => 2,
            Colorspace::Rgb8 | Colorspace::Rgb16 | Colorspace::Rgb32F => 3,
            Colorspace::Rgba8 | Colorspace::Rgba16 | Colorspace::Rgba32F => 4,
        }
    }

    pub fn bits_per_sample(self) -> u32 {
        match self {
            Colorspace::Gray1 => 1,
            Colorspace::Gray2 => 2,
            Colorspace::Gray4 => 4,
            Colorspace::Gray8 | Colorspace::GrayAlpha8 | Colorspace::Rgb8 | Colorspace::Rgba8 => 8,
            Colorspace::Gray16
            | Colorspace::GrayAlpha16
            | Colorspace::Rgb16
            | Colorspace::Rgba16 => 16,
            Colorspace::Rgb32F | Colorspace::Rgba32F => 32,
        }
    }

    pub fn is_sub_byte(self) -> bool {
        self.bits_per_sample() < 8
    }

    pub fn is_gray(self) -> bool {
        self.channels() <= 2
    }

    pub fn has_alpha(self) -> bool {
        matches!(self.channels(), 2 | 4)
    }

    /// The colour space that describes a decoded buffer as-is.
    pub fn of(img: &DynamicImage) -> Self {
        match img.color() {
            ColorType::L8 => Colorspace::Gray8,
            ColorType::L16 => Colorspace::Gray16,
            ColorType::La8 => Colorspace::GrayAlpha8,
            ColorType::La16 => Colorspace::GrayAlpha16,
            ColorType::Rgb8 => Colorspace::Rgb8,
            ColorType::Rgb16 => Colorspace::Rgb16,
            ColorType::Rgba8 => Colorspace::Rgba8,
            ColorType::Rgba16 => Colorspace::Rgba16,
            ColorType::Rgb32F => Colorspace::Rgb32F,
            ColorType::Rgba32F => Colorspace::Rgba32F,
            _ => Colorspace::Rgba8,
        }
    }

    /// Convert pixel data into this colour space.
    ///
    /// `threshold` only matters for `gray1`: luma strictly above it
    /// becomes white.
    pub fn convert(self, img: &DynamicImage, threshold: u8) -> DynamicImage {
        match self {
            Colorspace::Gray1 | Colorspace::Gray2 | Colorspace::Gray4 => DynamicImage::ImageLuma8(
                quantize(img.to_luma8(), self.bits_per_sample(), threshold),
            ),
            Colorspace::Gray8 => DynamicImage::ImageLuma8(img.to_luma8()),
            Colorspace::Gray16 => DynamicImage::ImageLuma16(img.to_luma16()),
            Colorspace::GrayAlpha8 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
            Colorspace::GrayAlpha16 => DynamicImage::ImageLumaA16(img.to_luma_alpha16()),
            Colorspace::Rgb8 => DynamicImage::ImageRgb8(img.to_rgb8()),
            Colorspace::Rgb16 => DynamicImage::ImageRgb16(img.to_rgb16()),
            Colorspace::Rgba8 => DynamicImage::ImageRgba8(img.to_rgba8()),
            Colorspace::Rgba16 => DynamicImage::ImageRgba16(img.to_rgba16()),
            Colorspace::Rgb32F => DynamicImage::ImageRgb32F(img.to_rgb32f()),
            Colorspace::Rgba32F => DynamicImage::ImageRgba32F(img.to_rgba32f()),
        }
    }
}

impl fmt::Display for Colorspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduce 8-bit luma to `2^bits` evenly spaced levels.
fn quantize(mut gray: GrayImage, bits: u32, threshold: u8) -> GrayImage {
    if bits == 1 {
        for p in gray.pixels_mut() {
            p.0[0] = if p.0[0] > threshold { 255 } else { 0 };
        }
        return gray;
    }
    let levels = ((1u32 << bits) - 1) as f32;
    for p in gray.pixels_mut() {
        let q = (p.0[0] as f32 * levels / 255.0).round();
        p.0[0] = (q * 255.0 / levels).round() as u8;
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn names_roundtrip() {
        for cs in Colorspace::ALL {
            assert_eq!(Colorspace::from_name(cs.name()).unwrap(), cs);
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(Colorspace::from_name("RGB").unwrap(), Colorspace::Rgb8);
        assert_eq!(Colorspace::from_name("gray").unwrap(), Colorspace::Gray8);
        assert_eq!(Colorspace::from_name("bilevel").unwrap(), Colorspace::Gray1);
    }

    #[test]
    fn unknown_name_is_error() {
        assert!(matches!(
            Colorspace::from_name("cmyk8"),
            Err(ImageError::UnsupportedColorspace(_))
        ));
    }

    #[test]
    fn layout_maps_to_channels_and_depth() {
        let cs = Colorspace::from_layout(3, 16).unwrap();
        assert_eq!(cs, Colorspace::Rgb16);
        assert_eq!(cs.channels(), 3);
        assert_eq!(cs.bits_per_sample(), 16);
        assert!(Colorspace::from_layout(3, 4).is_err());
        assert!(Colorspace::from_layout(5, 8).is_err());
    }

    #[test]
    fn gray1_thresholds() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(4, 1, |x, _| {
            Luma([[0, 127, 128, 255][x as usize]])
        }));
        let bw = Colorspace::Gray1.convert(&img, 127).to_luma8();
        let values: Vec<u8> = bw.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 0, 255, 255]);
    }

    #[test]
    fn gray2_has_four_levels() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(256, 1, |x, _| Luma([x as u8])));
        let q = Colorspace::Gray2.convert(&img, DEFAULT_THRESHOLD).to_luma8();
        let mut levels: Vec<u8> = q.pixels().map(|p| p.0[0]).collect();
        levels.dedup();
        assert_eq!(levels, vec![0, 85, 170, 255]);
    }

    #[test]
    fn of_reports_buffer_layout() {
        let img = DynamicImage::new_rgba16(2, 2);
        assert_eq!(Colorspace::of(&img), Colorspace::Rgba16);
        assert!(Colorspace::of(&img).has_alpha());
    }
}
