//! Shared test utilities for the exact-image test suite.
//!
//! Synthetic images built in memory so unit tests never depend on fixture
//! files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let img = gradient_rgb(64, 48);
//! let tiff = tiff_fixture(64, 48, 300);
//! ```

use image::{DynamicImage, Rgb, RgbImage};

use crate::imaging::codecs::{self, Codec, EncodeSource};
use crate::imaging::{Colorspace, Density, Quality};

/// An RGB image whose red channel ramps left to right and green channel
/// top to bottom, so no flip or quarter turn maps it onto itself.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    let ramp = |v: u32, span: u32| (v * 255 / span.saturating_sub(1).max(1)) as u8;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([ramp(x, width), ramp(y, height), 128])
    }))
}

/// Encoded RGB TIFF bytes with `dpi` stored in both resolution tags.
pub fn tiff_fixture(width: u32, height: u32, dpi: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    codecs::encode(
        EncodeSource {
            pixels: &img,
            colorspace: Colorspace::Rgb8,
            density: Density::new(dpi, dpi),
        },
        Codec::Tiff,
        Quality::default(),
        "",
    )
    .unwrap()
}

/// Write `data` into a fresh temp directory under `name`.
pub fn write_temp(name: &str, data: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join(name);
    std::fs::write(&path, data).unwrap();
    (tmp, path)
}
