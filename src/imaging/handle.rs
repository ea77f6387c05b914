//! The image handle.
//!
//! An [`Image`] owns decoded pixels together with the metadata the codecs
//! carry alongside them: colour space, X/Y resolution and a background
//! colour for fills. It is created empty (or blank with a given layout),
//! filled by decoding, queried and mutated through methods, encoded, and
//! released when dropped.
//!
//! ```no_run
//! use exact_image::imaging::{Image, Quality};
//!
//! let mut image = Image::new();
//! image.decode_file("scan.tif")?;
//! image.encode_file("scan.jpg", Quality::new(80), "")?;
//! println!("{}x{} at {}x{} dpi", image.width(), image.height(), image.xres(), image.yres());
//! image.set_xres(144);
//! image.set_yres(144);
//! # Ok::<(), exact_image::ImageError>(())
//! ```

use super::calculations::{self, clamp_crop};
use super::codecs::{self, Codec, EncodeSource};
use super::colorspace::{Colorspace, DEFAULT_THRESHOLD};
use super::density::Density;
use super::operations;
use super::params::{Color, Fill, Optimize2Bw, Quality, ScaleFilter};
use crate::error::{ImageError, Result};
use image::{DynamicImage, GenericImageView, Luma, LumaA, Rgb, Rgba, Rgba32FImage};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Image {
    pixels: DynamicImage,
    colorspace: Colorspace,
    xres: u32,
    yres: u32,
    background: Color,
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DynamicImage> for Image {
    fn from(pixels: DynamicImage) -> Self {
        Self {
            colorspace: Colorspace::of(&pixels),
            pixels,
            xres: 0,
            yres: 0,
            background: Color::WHITE,
        }
    }
}

impl Image {
    /// An empty handle: no pixels, `rgb8`, unknown resolution.
    pub fn new() -> Self {
        Self::from(DynamicImage::new_rgb8(0, 0))
    }

    /// A blank image with `spp` samples per pixel of `bps` bits each.
    ///
    /// Sub-byte depths (1, 2, 4) are only valid for single-channel gray.
    pub fn with_type_and_size(spp: u32, bps: u32, width: u32, height: u32, fill: Fill) -> Result<Self> {
        let colorspace = Colorspace::from_layout(spp, bps)?;
        check_allocation(width, height)?;
        let mut image = Self::from(DynamicImage::new_rgb8(0, 0));
        let color = match fill {
            Fill::Transparent => Color::TRANSPARENT,
            Fill::Background => image.background,
        };
        let blank = Rgba32FImage::from_pixel(width, height, Rgba(color.to_f32()));
        image.pixels = colorspace.convert(&DynamicImage::ImageRgba32F(blank), DEFAULT_THRESHOLD);
        image.colorspace = colorspace;
        Ok(image)
    }

    // -----------------------------------------------------------------------
    // Decode / encode
    // -----------------------------------------------------------------------

    /// Decode an encoded image held in memory, replacing pixels, colour
    /// space and resolution. On error the handle is left unchanged.
    pub fn decode(&mut self, data: &[u8]) -> Result<()> {
        let decoded = codecs::decode(data)?;
        self.colorspace = decoded.colorspace;
        self.pixels = decoded.pixels;
        self.xres = decoded.density.x;
        self.yres = decoded.density.y;
        Ok(())
    }

    pub fn decode_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "read image file");
        self.decode(&data)
    }

    /// Encode to memory with the given codec.
    pub fn encode(&self, codec: Codec, quality: Quality, compression: &str) -> Result<Vec<u8>> {
        codecs::encode(
            EncodeSource {
                pixels: &self.pixels,
                colorspace: self.colorspace,
                density: self.resolution(),
            },
            codec,
            quality,
            compression,
        )
    }

    /// Encode into `path`, choosing the codec from its extension.
    ///
    /// Nothing is written if encoding fails.
    pub fn encode_file(&self, path: impl AsRef<Path>, quality: Quality, compression: &str) -> Result<()> {
        let path = path.as_ref();
        let codec = Codec::from_path(path)?;
        let data = self.encode(codec, quality, compression)?;
        std::fs::write(path, &data)?;
        debug!(path = %path.display(), bytes = data.len(), "wrote image file");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_blank(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Samples per pixel.
    pub fn channels(&self) -> u32 {
        self.colorspace.channels()
    }

    /// Bits per sample.
    pub fn channel_depth(&self) -> u32 {
        self.colorspace.bits_per_sample()
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    /// Horizontal resolution in DPI, 0 when unknown.
    pub fn xres(&self) -> u32 {
        self.xres
    }

    /// Vertical resolution in DPI, 0 when unknown.
    pub fn yres(&self) -> u32 {
        self.yres
    }

    pub fn set_xres(&mut self, xres: u32) {
        self.xres = xres;
    }

    pub fn set_yres(&mut self, yres: u32) {
        self.yres = yres;
    }

    pub fn resolution(&self) -> Density {
        Density::new(self.xres, self.yres)
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Read-only access to the decoded buffer.
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    // -----------------------------------------------------------------------
    // Pixel access (slow; meant for tests and drafting)
    // -----------------------------------------------------------------------

    fn check_bounds(&self, x: u32, y: u32) -> Result<()> {
        if x >= self.width() || y >= self.height() {
            return Err(ImageError::InvalidArgument(format!(
                "pixel ({x}, {y}) outside {}x{} image",
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Result<Color> {
        self.check_bounds(x, y)?;
        let one = self.pixels.crop_imm(x, y, 1, 1).to_rgba32f();
        Ok(Color::from_f32(one.get_pixel(0, 0).0))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) -> Result<()> {
        self.check_bounds(x, y)?;
        let [r, g, b, a] = color.to_f32();
        let l = color.luma().clamp(0.0, 1.0) as f32;
        let u8s = |v: f32| (v * 255.0).round() as u8;
        let u16s = |v: f32| (v * 65535.0).round() as u16;

        match &mut self.pixels {
            DynamicImage::ImageLuma8(buf) => buf.put_pixel(x, y, Luma([u8s(l)])),
            DynamicImage::ImageLumaA8(buf) => buf.put_pixel(x, y, LumaA([u8s(l), u8s(a)])),
            DynamicImage::ImageRgb8(buf) => buf.put_pixel(x, y, Rgb([u8s(r), u8s(g), u8s(b)])),
            DynamicImage::ImageRgba8(buf) => {
                buf.put_pixel(x, y, Rgba([u8s(r), u8s(g), u8s(b), u8s(a)]))
            }
            DynamicImage::ImageLuma16(buf) => buf.put_pixel(x, y, Luma([u16s(l)])),
            DynamicImage::ImageLumaA16(buf) => buf.put_pixel(x, y, LumaA([u16s(l), u16s(a)])),
            DynamicImage::ImageRgb16(buf) => buf.put_pixel(x, y, Rgb([u16s(r), u16s(g), u16s(b)])),
            DynamicImage::ImageRgba16(buf) => {
                buf.put_pixel(x, y, Rgba([u16s(r), u16s(g), u16s(b), u16s(a)]))
            }
            DynamicImage::ImageRgb32F(buf) => buf.put_pixel(x, y, Rgb([r, g, b])),
            DynamicImage::ImageRgba32F(buf) => buf.put_pixel(x, y, Rgba([r, g, b, a])),
            other => {
                return Err(ImageError::UnsupportedColorspace(format!("{:?}", other.color())));
            }
        }

        if self.colorspace.is_sub_byte() {
            self.pixels = self.colorspace.convert(&self.pixels, DEFAULT_THRESHOLD);
        }
        Ok(())
    }

    /// Paint every pixel with `color`.
    pub fn fill(&mut self, color: Color) {
        let solid = Rgba32FImage::from_pixel(self.width(), self.height(), Rgba(color.to_f32()));
        self.pixels = self
            .colorspace
            .convert(&DynamicImage::ImageRgba32F(solid), DEFAULT_THRESHOLD);
    }

    /// Convert to the named colour space (`gray1`, `rgb8`, `bilevel`, ...);
    /// `threshold` applies to `gray1`.
    pub fn convert_colorspace(&mut self, name: &str, threshold: u8) -> Result<()> {
        let target = Colorspace::from_name(name)?;
        self.convert_to(target, threshold);
        Ok(())
    }

    pub fn convert_to(&mut self, target: Colorspace, threshold: u8) {
        if target != self.colorspace || target.is_sub_byte() {
            debug!(from = %self.colorspace, to = %target, "converting colorspace");
            self.pixels = target.convert(&self.pixels, threshold);
            self.colorspace = target;
        }
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Install new pixels, keeping sub-byte gray images quantised.
    fn replace_pixels(&mut self, pixels: DynamicImage) {
        if self.colorspace.is_sub_byte() {
            self.pixels = self.colorspace.convert(&pixels, DEFAULT_THRESHOLD);
        } else {
            self.colorspace = Colorspace::of(&pixels);
            self.pixels = pixels;
        }
    }

    fn require_pixels(&self) -> Result<()> {
        if self.is_blank() {
            return Err(ImageError::EmptyImage);
        }
        Ok(())
    }

    /// Resample to exactly `width` × `height`.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.require_pixels()?;
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidArgument(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        check_allocation(width, height)?;
        let fx = width as f64 / self.width() as f64;
        let fy = height as f64 / self.height() as f64;
        self.resample(width, height, fx, fy, ScaleFilter::Best);
        Ok(())
    }

    fn resample(&mut self, width: u32, height: u32, fx: f64, fy: f64, filter: ScaleFilter) {
        debug!(
            from_width = self.width(),
            from_height = self.height(),
            width,
            height,
            ?filter,
            "resampling"
        );
        let scaled = operations::resample(&self.pixels, width, height, filter);
        self.replace_pixels(scaled);
        self.xres = calculations::scaled_resolution(self.xres, fx);
        self.yres = calculations::scaled_resolution(self.yres, fy);
    }

    /// Scale by `x_factor` / `y_factor` with the given filter; a zero
    /// `y_factor` reuses `x_factor`. Stored resolution scales along.
    pub fn scale_with(&mut self, filter: ScaleFilter, x_factor: f64, y_factor: f64) -> Result<()> {
        self.require_pixels()?;
        let valid = |f: f64| f.is_finite() && f > 0.0;
        let y_factor = if y_factor == 0.0 { x_factor } else { y_factor };
        if !valid(x_factor) || !valid(y_factor) {
            return Err(ImageError::InvalidArgument(format!(
                "invalid scale factors {x_factor} x {y_factor}"
            )));
        }
        let (w, h) = calculations::scaled_dimensions(self.pixels.dimensions(), x_factor, y_factor);
        check_allocation(w, h)?;
        self.resample(w, h, x_factor, y_factor, filter);
        Ok(())
    }

    pub fn scale(&mut self, x_factor: f64, y_factor: f64) -> Result<()> {
        self.scale_with(ScaleFilter::Best, x_factor, y_factor)
    }

    pub fn nearest_scale(&mut self, x_factor: f64, y_factor: f64) -> Result<()> {
        self.scale_with(ScaleFilter::Nearest, x_factor, y_factor)
    }

    pub fn box_scale(&mut self, x_factor: f64, y_factor: f64) -> Result<()> {
        self.scale_with(ScaleFilter::Box, x_factor, y_factor)
    }

    pub fn bilinear_scale(&mut self, x_factor: f64, y_factor: f64) -> Result<()> {
        self.scale_with(ScaleFilter::Bilinear, x_factor, y_factor)
    }

    pub fn thumbnail_scale(&mut self, x_factor: f64, y_factor: f64) -> Result<()> {
        self.scale_with(ScaleFilter::Thumbnail, x_factor, y_factor)
    }

    /// Rotate clockwise by `angle` degrees; see [`operations::rotate`].
    pub fn rotate(&mut self, angle: f64) {
        let rotated = operations::rotate(&self.pixels, angle, self.background);
        if matches!(
            calculations::rotation_for(angle),
            calculations::Rotation::Clockwise90 | calculations::Rotation::Clockwise270
        ) {
            std::mem::swap(&mut self.xres, &mut self.yres);
        }
        self.replace_pixels(rotated);
    }

    /// Mirror left to right.
    pub fn flip_x(&mut self) {
        self.pixels = self.pixels.fliph();
    }

    /// Mirror top to bottom.
    pub fn flip_y(&mut self) {
        self.pixels = self.pixels.flipv();
    }

    /// Keep only the given rectangle, clamped to the image.
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        let rect = clamp_crop(self.pixels.dimensions(), x, y, width, height).ok_or_else(|| {
            ImageError::InvalidArgument(format!(
                "crop {width}x{height}+{x}+{y} is outside the {}x{} image",
                self.width(),
                self.height()
            ))
        })?;
        self.pixels = operations::crop(&self.pixels, rect);
        Ok(())
    }

    /// A new `width` × `height` image cut from this one at `(x, y)` with
    /// its axes rotated clockwise by `angle` degrees.
    pub fn copy_crop_rotate(&self, x: i64, y: i64, width: u32, height: u32, angle: f64) -> Result<Image> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidArgument(format!(
                "cannot cut a {width}x{height} region"
            )));
        }
        check_allocation(width, height)?;
        let pixels = operations::copy_crop_rotate(&self.pixels, x, y, width, height, angle, self.background);
        let mut copy = Image {
            pixels: DynamicImage::new_rgb8(0, 0),
            colorspace: self.colorspace,
            xres: self.xres,
            yres: self.yres,
            background: self.background,
        };
        copy.replace_pixels(pixels);
        Ok(copy)
    }

    /// Trim rows matching the bottom-left pixel colour off the bottom.
    pub fn fast_auto_crop(&mut self) {
        let rows = operations::fast_auto_crop_height(&self.pixels);
        if rows < self.height() {
            debug!(from = self.height(), to = rows, "auto-cropped bottom rows");
            self.pixels = self.pixels.crop_imm(0, 0, self.width(), rows);
        }
    }

    // -----------------------------------------------------------------------
    // Colour
    // -----------------------------------------------------------------------

    pub fn invert(&mut self) {
        let inverted = operations::invert(&self.pixels);
        self.replace_pixels(inverted);
    }

    pub fn normalize(&mut self) {
        let normalized = operations::normalize(&self.pixels);
        self.replace_pixels(normalized);
    }

    pub fn brightness_contrast_gamma(&mut self, brightness: f64, contrast: f64, gamma: f64) {
        let adjusted = operations::brightness_contrast_gamma(&self.pixels, brightness, contrast, gamma);
        self.replace_pixels(adjusted);
    }

    pub fn hue_saturation_lightness(&mut self, hue: f64, saturation: f64, lightness: f64) {
        let adjusted = operations::hue_saturation_lightness(&self.pixels, hue, saturation, lightness);
        self.replace_pixels(adjusted);
    }

    /// Turn a scan into clean `gray1`: stretch ink and paper to full
    /// range, sharpen, optionally rescale to `target_dpi`, then threshold.
    /// Images that are already `gray1` are left alone.
    pub fn optimize_2bw(&mut self, params: Optimize2Bw) -> Result<()> {
        self.require_pixels()?;
        if self.colorspace == Colorspace::Gray1 {
            return Ok(());
        }
        if params.radius > 0 && !(params.sd.is_finite() && params.sd > 0.0) {
            return Err(ImageError::InvalidArgument(format!(
                "standard deviation must be positive, got {}",
                params.sd
            )));
        }

        let gray = operations::optimize_2bw(&self.pixels, params.low, params.high, params.radius, params.sd);
        self.pixels = DynamicImage::ImageLuma8(gray);
        self.colorspace = Colorspace::Gray8;

        if params.target_dpi > 0 && self.xres > 0 {
            let factor = params.target_dpi as f64 / self.xres as f64;
            let filter = if factor < 1.0 { ScaleFilter::Box } else { ScaleFilter::Bilinear };
            self.scale_with(filter, factor, factor)?;
        }

        let threshold = if params.threshold == 0 { 200 } else { params.threshold };
        self.convert_to(Colorspace::Gray1, threshold);
        debug!(threshold, width = self.width(), height = self.height(), "optimized to bi-level");
        Ok(())
    }

    /// Whether the page is blank: fewer than `percent` % dark pixels
    /// inside `margin` (rounded down to a multiple of 8).
    pub fn is_empty(&self, percent: f64, margin: u32) -> bool {
        self.detect_empty(percent, margin).0
    }

    /// [`is_empty`](Self::is_empty) plus the number of dark pixels counted.
    pub fn detect_empty(&self, percent: f64, margin: u32) -> (bool, u64) {
        let (empty, dark) = operations::detect_empty(&self.pixels, percent, margin);
        debug!(dark_pixels = dark, percent, margin, empty, "empty page check");
        (empty, dark)
    }
}

/// Refuse results whose working buffer would exceed
/// [`calculations::MAX_WORKING_BYTES`].
fn check_allocation(width: u32, height: u32) -> Result<()> {
    let bytes = calculations::working_bytes(width, height);
    if bytes > calculations::MAX_WORKING_BYTES {
        return Err(ImageError::InvalidArgument(format!(
            "{width}x{height} image needs {bytes} bytes of working memory (limit {})",
            calculations::MAX_WORKING_BYTES
        )));
    }
    Ok(())
}
