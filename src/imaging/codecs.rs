//! Codec registry: format detection, decoding and encoding.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Detect format | `image::guess_format` (magic bytes) |
//! | Decode (all formats) | `image::load_from_memory_with_format` |
//! | Resolution on decode | [`density::read_density`](super::density::read_density) |
//! | Packed gray depth on decode | `png::Decoder` `Info::bit_depth`, `tiff::decoder::Decoder::colortype` |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` with JFIF pixel density |
//! | Encode PNG | `png::Encoder` (pHYs, 1/2/4-bit gray packing) |
//! | Encode TIFF | `tiff::encoder::TiffEncoder` (X/YResolution tags) |
//! | Encode WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode BMP / GIF / PNM | `DynamicImage::write_to` |

use super::colorspace::{Colorspace, DEFAULT_THRESHOLD};
use super::density::{Density, read_density};
use super::params::Quality;
use crate::error::{ImageError, Result};
use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat};
use std::fmt;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tiff::encoder::{Rational, TiffEncoder, TiffValue, colortype, compression};
use tiff::tags::ResolutionUnit;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Jpeg,
    Png,
    Tiff,
    WebP,
    Bmp,
    Gif,
    Pnm,
}

impl Codec {
    pub const ALL: [Codec; 7] = [
        Codec::Jpeg,
        Codec::Png,
        Codec::Tiff,
        Codec::WebP,
        Codec::Bmp,
        Codec::Gif,
        Codec::Pnm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Codec::Jpeg => "jpeg",
            Codec::Png => "png",
            Codec::Tiff => "tiff",
            Codec::WebP => "webp",
            Codec::Bmp => "bmp",
            Codec::Gif => "gif",
            Codec::Pnm => "pnm",
        }
    }

    /// File extensions recognised for this codec; the first is preferred.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Codec::Jpeg => &["jpg", "jpeg", "jpe"],
            Codec::Png => &["png"],
            Codec::Tiff => &["tif", "tiff"],
            Codec::WebP => &["webp"],
            Codec::Bmp => &["bmp"],
            Codec::Gif => &["gif"],
            Codec::Pnm => &["pnm", "ppm", "pgm", "pbm"],
        }
    }

    /// Look up a codec by name or extension, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == lower || c.extensions().contains(&lower.as_str()))
            .ok_or_else(|| ImageError::UnsupportedCodec(name.to_string()))
    }

    /// Pick a codec from a file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                ImageError::UnsupportedCodec(format!("no file extension on {}", path.display()))
            })?;
        Self::from_name(ext)
    }

    /// Sniff the codec of encoded bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        let format = image::guess_format(data).ok()?;
        Self::from_image_format(format)
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Codec::Jpeg),
            ImageFormat::Png => Some(Codec::Png),
            ImageFormat::Tiff => Some(Codec::Tiff),
            ImageFormat::WebP => Some(Codec::WebP),
            ImageFormat::Bmp => Some(Codec::Bmp),
            ImageFormat::Gif => Some(Codec::Gif),
            ImageFormat::Pnm => Some(Codec::Pnm),
            _ => None,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixels and metadata recovered from an encoded image.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub pixels: DynamicImage,
    /// Layout as stored in the file; 1, 2 and 4-bit gray survive here
    /// even though `pixels` holds them widened to 8 bits.
    pub colorspace: Colorspace,
    pub codec: Codec,
    pub density: Density,
}

/// Decode an image held in memory.
pub fn decode(data: &[u8]) -> Result<Decoded> {
    if data.is_empty() {
        return Err(ImageError::Decode("no data".into()));
    }
    let format = image::guess_format(data)
        .map_err(|e| ImageError::Decode(format!("unrecognised format: {e}")))?;
    let codec = Codec::from_image_format(format)
        .ok_or_else(|| ImageError::Decode(format!("{format:?} is not supported")))?;
    let mut pixels = image::load_from_memory_with_format(data, format)
        .map_err(|e| ImageError::Decode(format!("{codec}: {e}")))?;
    let density = read_density(data);

    let mut colorspace = Colorspace::of(&pixels);
    if colorspace == Colorspace::Gray8 {
        if let Some(stored) = stored_gray_depth(format, data).and_then(|bits| Colorspace::from_layout(1, bits).ok()) {
            pixels = stored.convert(&pixels, DEFAULT_THRESHOLD);
            colorspace = stored;
        }
    }

    debug!(
        codec = codec.name(),
        width = pixels.width(),
        height = pixels.height(),
        colorspace = colorspace.name(),
        xres = density.x,
        yres = density.y,
        bytes = data.len(),
        "decoded image"
    );

    Ok(Decoded {
        pixels,
        colorspace,
        codec,
        density,
    })
}

/// Bits per sample of gray images stored below 8 bits.
fn stored_gray_depth(format: ImageFormat, data: &[u8]) -> Option<u32> {
    let bits = match format {
        ImageFormat::Png => {
            let reader = png::Decoder::new(Cursor::new(data)).read_info().ok()?;
            let info = reader.info();
            if info.color_type != png::ColorType::Grayscale {
                return None;
            }
            match info.bit_depth {
                png::BitDepth::One => 1,
                png::BitDepth::Two => 2,
                png::BitDepth::Four => 4,
                _ => return None,
            }
        }
        ImageFormat::Tiff => {
            let mut decoder = tiff::decoder::Decoder::new(Cursor::new(data)).ok()?;
            match decoder.colortype().ok()? {
                tiff::ColorType::Gray(bits @ (1 | 2 | 4)) => u32::from(bits),
                _ => return None,
            }
        }
        _ => return None,
    };
    Some(bits)
}

/// Everything an encoder needs to know about the image being written.
#[derive(Debug, Clone, Copy)]
pub struct EncodeSource<'a> {
    pub pixels: &'a DynamicImage,
    pub colorspace: Colorspace,
    pub density: Density,
}

/// Encode pixels with the given codec.
///
/// `quality` only affects JPEG. `compression` is a codec-specific option
/// string; empty selects the codec default.
pub fn encode(
    source: EncodeSource<'_>,
    codec: Codec,
    quality: Quality,
    compression: &str,
) -> Result<Vec<u8>> {
    let pixels = source.pixels;
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(ImageError::EmptyImage);
    }

    let mut out = Vec::new();
    match codec {
        Codec::Jpeg => {
            no_compression_option(codec, compression)?;
            encode_jpeg(source, quality, &mut out)?;
        }
        Codec::Png => encode_png(source, PngCompression::parse(compression)?, &mut out)?,
        Codec::Tiff => encode_tiff(source, TiffCompression::parse(compression)?, &mut out)?,
        Codec::WebP => {
            no_compression_option(codec, compression)?;
            encode_webp(source, &mut out)?;
        }
        Codec::Bmp | Codec::Gif | Codec::Pnm => {
            no_compression_option(codec, compression)?;
            encode_generic(source, codec, &mut out)?;
        }
    }

    debug!(
        codec = codec.name(),
        quality = quality.value(),
        compression,
        width = pixels.width(),
        height = pixels.height(),
        bytes = out.len(),
        "encoded image"
    );
    Ok(out)
}

fn no_compression_option(codec: Codec, compression: &str) -> Result<()> {
    match compression.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "default" => Ok(()),
        other => Err(ImageError::InvalidArgument(format!(
            "{codec} has no compression option '{other}'"
        ))),
    }
}

fn encode_error(codec: Codec) -> impl Fn(String) -> ImageError {
    move |message| ImageError::Encode {
        codec: codec.name(),
        message,
    }
}

/// Fill in a missing axis from the other one for formats that need both.
fn both_axes(density: Density) -> (u32, u32) {
    match (density.x, density.y) {
        (0, y) => (y, y),
        (x, 0) => (x, x),
        (x, y) => (x, y),
    }
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

fn encode_jpeg(source: EncodeSource<'_>, quality: Quality, out: &mut Vec<u8>) -> Result<()> {
    let err = encode_error(Codec::Jpeg);
    let img = source.pixels;
    let (bytes, color) = if source.colorspace.is_gray() {
        (img.to_luma8().into_raw(), ExtendedColorType::L8)
    } else {
        (img.to_rgb8().into_raw(), ExtendedColorType::Rgb8)
    };

    let mut encoder = JpegEncoder::new_with_quality(out, quality.value().max(1));
    if source.density.is_known() {
        let (x, y) = both_axes(source.density);
        encoder.set_pixel_density(PixelDensity {
            density: (clamp_u16(x), clamp_u16(y)),
            unit: PixelDensityUnit::Inches,
        });
    }
    encoder
        .encode(&bytes, img.width(), img.height(), color)
        .map_err(|e| err(e.to_string()))
}

fn clamp_u16(v: u32) -> u16 {
    v.min(u16::MAX as u32) as u16
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PngCompression {
    Default,
    Fast,
    Best,
}

impl PngCompression {
    fn parse(option: &str) -> Result<Self> {
        match option.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "fast" => Ok(Self::Fast),
            "best" => Ok(Self::Best),
            other => Err(ImageError::InvalidArgument(format!(
                "unknown png compression '{other}' (expected default, fast or best)"
            ))),
        }
    }

    fn to_png(self) -> png::Compression {
        match self {
            Self::Default => png::Compression::Default,
            Self::Fast => png::Compression::Fast,
            Self::Best => png::Compression::Best,
        }
    }
}

fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

/// Pack 8-bit luma rows into `bits`-per-pixel rows, most significant bits first.
fn pack_gray(img: &image::GrayImage, bits: u32) -> Vec<u8> {
    let (w, h) = img.dimensions();
    let stride = (w as usize * bits as usize).div_ceil(8);
    let max = (1u32 << bits) - 1;
    let per_byte = 8 / bits;
    let mut packed = vec![0u8; stride * h as usize];

    for (y, row) in img.rows().enumerate() {
        let line = &mut packed[y * stride..(y + 1) * stride];
        for (x, p) in row.enumerate() {
            let level = (p.0[0] as u32 * max + 127) / 255;
            let shift = 8 - bits * (1 + x as u32 % per_byte);
            line[x / per_byte as usize] |= (level << shift) as u8;
        }
    }
    packed
}

fn encode_png(source: EncodeSource<'_>, compression: PngCompression, out: &mut Vec<u8>) -> Result<()> {
    let err = encode_error(Codec::Png);
    let img = source.pixels;
    let cs = source.colorspace;

    let (color, depth, data) = match cs {
        Colorspace::Gray1 | Colorspace::Gray2 | Colorspace::Gray4 => {
            let depth = match cs.bits_per_sample() {
                1 => png::BitDepth::One,
                2 => png::BitDepth::Two,
                _ => png::BitDepth::Four,
            };
            (
                png::ColorType::Grayscale,
                depth,
                pack_gray(&img.to_luma8(), cs.bits_per_sample()),
            )
        }
        Colorspace::Gray8 => (png::ColorType::Grayscale, png::BitDepth::Eight, img.to_luma8().into_raw()),
        Colorspace::Gray16 => (
            png::ColorType::Grayscale,
            png::BitDepth::Sixteen,
            be_bytes(img.to_luma16().as_raw()),
        ),
        Colorspace::GrayAlpha8 => (
            png::ColorType::GrayscaleAlpha,
            png::BitDepth::Eight,
            img.to_luma_alpha8().into_raw(),
        ),
        Colorspace::GrayAlpha16 => (
            png::ColorType::GrayscaleAlpha,
            png::BitDepth::Sixteen,
            be_bytes(img.to_luma_alpha16().as_raw()),
        ),
        Colorspace::Rgb8 => (png::ColorType::Rgb, png::BitDepth::Eight, img.to_rgb8().into_raw()),
        Colorspace::Rgb16 | Colorspace::Rgb32F => (
            png::ColorType::Rgb,
            png::BitDepth::Sixteen,
            be_bytes(img.to_rgb16().as_raw()),
        ),
        Colorspace::Rgba8 => (png::ColorType::Rgba, png::BitDepth::Eight, img.to_rgba8().into_raw()),
        Colorspace::Rgba16 | Colorspace::Rgba32F => (
            png::ColorType::Rgba,
            png::BitDepth::Sixteen,
            be_bytes(img.to_rgba16().as_raw()),
        ),
    };

    let mut encoder = png::Encoder::new(&mut *out, img.width(), img.height());
    encoder.set_color(color);
    encoder.set_depth(depth);
    encoder.set_compression(compression.to_png());
    if source.density.is_known() {
        let (x, y) = both_axes(source.density);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: dpi_to_ppm(x),
            yppu: dpi_to_ppm(y),
            unit: png::Unit::Meter,
        }));
    }
    let mut writer = encoder.write_header().map_err(|e| err(e.to_string()))?;
    writer
        .write_image_data(&data)
        .map_err(|e| err(e.to_string()))?;
    writer.finish().map_err(|e| err(e.to_string()))
}

fn dpi_to_ppm(dpi: u32) -> u32 {
    (dpi as f64 / 0.0254).round() as u32
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TiffCompression {
    None,
    Lzw,
    Deflate,
    Packbits,
}

impl TiffCompression {
    fn parse(option: &str) -> Result<Self> {
        match option.trim().to_ascii_lowercase().as_str() {
            "" | "lzw" => Ok(Self::Lzw),
            "none" => Ok(Self::None),
            "deflate" | "zip" => Ok(Self::Deflate),
            "packbits" => Ok(Self::Packbits),
            other => Err(ImageError::InvalidArgument(format!(
                "unknown tiff compression '{other}' (expected none, lzw, deflate or packbits)"
            ))),
        }
    }
}

fn encode_tiff(source: EncodeSource<'_>, compression: TiffCompression, out: &mut Vec<u8>) -> Result<()> {
    let err = encode_error(Codec::Tiff);
    let img = source.pixels;
    let (w, h) = (img.width(), img.height());
    let density = source.density;

    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut cursor).map_err(|e| err(e.to_string()))?;

    // The tiff encoder has no gray+alpha or sub-byte layouts
    match source.colorspace {
        Colorspace::Gray1 | Colorspace::Gray2 | Colorspace::Gray4 | Colorspace::Gray8 => {
            write_tiff::<_, colortype::Gray8>(&mut encoder, w, h, img.to_luma8().as_raw(), density, compression)
        }
        Colorspace::Gray16 => {
            write_tiff::<_, colortype::Gray16>(&mut encoder, w, h, img.to_luma16().as_raw(), density, compression)
        }
        Colorspace::Rgb8 => {
            write_tiff::<_, colortype::RGB8>(&mut encoder, w, h, img.to_rgb8().as_raw(), density, compression)
        }
        Colorspace::Rgb16 | Colorspace::Rgb32F => {
            write_tiff::<_, colortype::RGB16>(&mut encoder, w, h, img.to_rgb16().as_raw(), density, compression)
        }
        Colorspace::GrayAlpha8 | Colorspace::Rgba8 => {
            write_tiff::<_, colortype::RGBA8>(&mut encoder, w, h, img.to_rgba8().as_raw(), density, compression)
        }
        Colorspace::GrayAlpha16 | Colorspace::Rgba16 | Colorspace::Rgba32F => {
            write_tiff::<_, colortype::RGBA16>(&mut encoder, w, h, img.to_rgba16().as_raw(), density, compression)
        }
    }?;

    drop(encoder);
    out.extend_from_slice(cursor.get_ref());
    Ok(())
}

fn write_tiff<W, C>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    density: Density,
    compression: TiffCompression,
) -> Result<()>
where
    W: Write + Seek,
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    match compression {
        TiffCompression::None => {
            write_tiff_with::<W, C, _>(encoder, width, height, data, density, compression::Uncompressed)
        }
        TiffCompression::Lzw => {
            write_tiff_with::<W, C, _>(encoder, width, height, data, density, compression::Lzw)
        }
        TiffCompression::Deflate => write_tiff_with::<W, C, _>(
            encoder,
            width,
            height,
            data,
            density,
            compression::Deflate::default(),
        ),
        TiffCompression::Packbits => {
            write_tiff_with::<W, C, _>(encoder, width, height, data, density, compression::Packbits)
        }
    }
}

fn write_tiff_with<W, C, D>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    density: Density,
    method: D,
) -> Result<()>
where
    W: Write + Seek,
    C: colortype::ColorType,
    D: compression::Compression,
    [C::Inner]: TiffValue,
{
    let err = encode_error(Codec::Tiff);
    let mut image = encoder
        .new_image_with_compression::<C, D>(width, height, method)
        .map_err(|e| err(e.to_string()))?;
    if density.is_known() {
        let (x, y) = both_axes(density);
        image.resolution_unit(ResolutionUnit::Inch);
        image.x_resolution(Rational { n: x, d: 1 });
        image.y_resolution(Rational { n: y, d: 1 });
    }
    image.write_data(data).map_err(|e| err(e.to_string()))
}

// ---------------------------------------------------------------------------
// WebP, BMP, GIF, PNM
// ---------------------------------------------------------------------------

fn encode_webp(source: EncodeSource<'_>, out: &mut Vec<u8>) -> Result<()> {
    let err = encode_error(Codec::WebP);
    let img = source.pixels;
    let (data, color) = if source.colorspace.has_alpha() {
        (img.to_rgba8().into_raw(), ExtendedColorType::Rgba8)
    } else {
        (img.to_rgb8().into_raw(), ExtendedColorType::Rgb8)
    };
    WebPEncoder::new_lossless(out)
        .encode(&data, img.width(), img.height(), color)
        .map_err(|e| err(e.to_string()))
}

fn encode_generic(source: EncodeSource<'_>, codec: Codec, out: &mut Vec<u8>) -> Result<()> {
    let err = encode_error(codec);
    let img = source.pixels;
    let cs = source.colorspace;
    let (converted, format) = match codec {
        Codec::Bmp if cs.is_gray() && !cs.has_alpha() => (DynamicImage::ImageLuma8(img.to_luma8()), ImageFormat::Bmp),
        Codec::Bmp if cs.has_alpha() => (DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::Bmp),
        Codec::Bmp => (DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Bmp),
        Codec::Gif => (DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::Gif),
        Codec::Pnm if cs == Colorspace::Gray16 => (DynamicImage::ImageLuma16(img.to_luma16()), ImageFormat::Pnm),
        Codec::Pnm if cs.is_gray() => (DynamicImage::ImageLuma8(img.to_luma8()), ImageFormat::Pnm),
        Codec::Pnm if cs.bits_per_sample() > 8 => (DynamicImage::ImageRgb16(img.to_rgb16()), ImageFormat::Pnm),
        Codec::Pnm => (DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Pnm),
        other => return Err(ImageError::UnsupportedCodec(other.name().to_string())),
    };
    converted
        .write_to(&mut Cursor::new(out), format)
        .map_err(|e| err(e.to_string()))
}
