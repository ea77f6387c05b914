//! The `convert` pipeline: a fixed-order list of edits applied to one image.
//!
//! A [`ConvertPlan`] is plain data built from command-line flags (or by
//! hand in tests). [`apply`] runs every requested step on an [`Image`] in
//! this order:
//!
//! ```text
//! colorspace → crop → fast auto-crop → size / scale → rotate → flip / flop
//!   → invert → normalize → brightness/contrast/gamma → hue/saturation/lightness
//!   → optimize2bw → resolution
//! ```
//!
//! [`run`] wraps it with decode and encode.

use crate::imaging::{Color, DEFAULT_THRESHOLD, Image, Optimize2Bw, Quality, ScaleFilter};
use crate::error::{ImageError, Result};
use std::path::Path;
use tracing::info;

/// Edits requested for one conversion. `None` / `false` means "skip".
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertPlan {
    pub colorspace: Option<String>,
    pub threshold: u8,
    pub crop: Option<CropArea>,
    pub fast_auto_crop: bool,
    pub size: Option<(u32, u32)>,
    pub scale: Option<(ScaleFilter, f64)>,
    pub rotate: Option<f64>,
    /// Mirror top to bottom.
    pub flip: bool,
    /// Mirror left to right.
    pub flop: bool,
    pub invert: bool,
    pub normalize: bool,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    pub gamma: Option<f64>,
    pub hue: Option<f64>,
    pub saturation: Option<f64>,
    pub lightness: Option<f64>,
    pub optimize_2bw: Option<Optimize2Bw>,
    pub resolution: Option<(u32, u32)>,
    pub background: Option<Color>,
}

impl Default for ConvertPlan {
    fn default() -> Self {
        Self {
            colorspace: None,
            threshold: DEFAULT_THRESHOLD,
            crop: None,
            fast_auto_crop: false,
            size: None,
            scale: None,
            rotate: None,
            flip: false,
            flop: false,
            invert: false,
            normalize: false,
            brightness: None,
            contrast: None,
            gamma: None,
            hue: None,
            saturation: None,
            lightness: None,
            optimize_2bw: None,
            resolution: None,
            background: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Parse `x,y,w,h`.
pub fn parse_crop(s: &str) -> std::result::Result<CropArea, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, width, height] = parts.as_slice() else {
        return Err(format!("crop '{s}' must be x,y,width,height"));
    };
    let num = |v: &str| v.parse::<u32>().map_err(|_| format!("crop '{s}': '{v}' is not a number"));
    Ok(CropArea {
        x: num(*x)?,
        y: num(*y)?,
        width: num(*width)?,
        height: num(*height)?,
    })
}

/// Parse `WxH`; both parts required.
pub fn parse_size(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("size '{s}' must be WIDTHxHEIGHT"))?;
    let num = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("size '{s}': '{v}' is not a number"))
    };
    Ok((num(w)?, num(h)?))
}

/// Parse `XxY` or a single `X` used for both axes.
pub fn parse_resolution(s: &str) -> std::result::Result<(u32, u32), String> {
    match s.split_once(['x', 'X']) {
        Some(_) => parse_size(s),
        None => {
            let v = s
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("resolution '{s}' is not a number"))?;
            Ok((v, v))
        }
    }
}

/// Run every requested step of `plan` on `image`.
pub fn apply(image: &mut Image, plan: &ConvertPlan) -> Result<()> {
    if let Some(color) = plan.background {
        image.set_background(color);
    }
    if let Some(name) = &plan.colorspace {
        image.convert_colorspace(name, plan.threshold)?;
    }
    if let Some(c) = plan.crop {
        image.crop(c.x, c.y, c.width, c.height)?;
    }
    if plan.fast_auto_crop {
        image.fast_auto_crop();
    }
    if let Some((w, h)) = plan.size {
        image.resize(w, h)?;
    }
    if let Some((filter, factor)) = plan.scale {
        image.scale_with(filter, factor, 0.0)?;
    }
    if let Some(angle) = plan.rotate {
        image.rotate(angle);
    }
    if plan.flip {
        image.flip_y();
    }
    if plan.flop {
        image.flip_x();
    }
    if plan.invert {
        image.invert();
    }
    if plan.normalize {
        image.normalize();
    }
    if plan.brightness.is_some() || plan.contrast.is_some() || plan.gamma.is_some() {
        let gamma = plan.gamma.unwrap_or(1.0);
        if gamma <= 0.0 {
            return Err(ImageError::InvalidArgument(format!(
                "gamma must be positive, got {gamma}"
            )));
        }
        image.brightness_contrast_gamma(
            plan.brightness.unwrap_or(0.0),
            plan.contrast.unwrap_or(0.0),
            gamma,
        );
    }
    if plan.hue.is_some() || plan.saturation.is_some() || plan.lightness.is_some() {
        image.hue_saturation_lightness(
            plan.hue.unwrap_or(0.0),
            plan.saturation.unwrap_or(0.0),
            plan.lightness.unwrap_or(0.0),
        );
    }
    if let Some(params) = plan.optimize_2bw {
        image.optimize_2bw(params)?;
    }
    if let Some((x, y)) = plan.resolution {
        image.set_xres(x);
        image.set_yres(y);
    }
    Ok(())
}

/// Decode `input`, apply `plan`, encode to `output` (codec from its extension).
pub fn run(
    input: &Path,
    output: &Path,
    plan: &ConvertPlan,
    quality: Quality,
    compression: &str,
) -> Result<Image> {
    let mut image = Image::new();
    image.decode_file(input)?;
    apply(&mut image, plan)?;
    image.encode_file(output, quality, compression)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        width = image.width(),
        height = image.height(),
        colorspace = %image.colorspace(),
        "converted"
    );
    Ok(image)
}
