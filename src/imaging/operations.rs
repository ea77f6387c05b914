//! Pixel operations on decoded buffers.
//!
//! Functions take a `DynamicImage` and return a new one in the same
//! colour layout. Operations the `image` crate already provides (flips,
//! quarter turns, filtered resizes, inversion) delegate to it; the rest
//! work on an `Rgba32F` copy and convert back.

use super::calculations::{self, CropRect, Rotation};
use super::colorspace::{Colorspace, DEFAULT_THRESHOLD};
use super::params::{Color, ScaleFilter};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgba, Rgba32FImage};

/// Return `converted` in the layout of `original`.
fn restore_layout(original: &DynamicImage, converted: Rgba32FImage) -> DynamicImage {
    Colorspace::of(original).convert(&DynamicImage::ImageRgba32F(converted), DEFAULT_THRESHOLD)
}

/// Apply `f` to every pixel as normalised RGBA.
fn map_rgba(img: &DynamicImage, f: impl Fn([f32; 4]) -> [f32; 4]) -> DynamicImage {
    let mut buf = img.to_rgba32f();
    for p in buf.pixels_mut() {
        p.0 = f(p.0).map(|c| c.clamp(0.0, 1.0));
    }
    restore_layout(img, buf)
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Resample to exactly `width` × `height`.
pub fn resample(img: &DynamicImage, width: u32, height: u32, filter: ScaleFilter) -> DynamicImage {
    let shrinking = width <= img.width() && height <= img.height();
    match filter {
        ScaleFilter::Nearest => img.resize_exact(width, height, FilterType::Nearest),
        ScaleFilter::Bilinear => img.resize_exact(width, height, FilterType::Triangle),
        ScaleFilter::Box => box_scale(img, width, height),
        ScaleFilter::Thumbnail if shrinking => img.thumbnail_exact(width, height),
        ScaleFilter::Thumbnail => img.resize_exact(width, height, FilterType::Triangle),
        ScaleFilter::Best if shrinking => box_scale(img, width, height),
        ScaleFilter::Best => img.resize_exact(width, height, FilterType::Triangle),
    }
}

/// Area-averaging resample: each target pixel is the mean of the source
/// pixels it covers (at least one).
pub fn box_scale(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let src = img.to_rgba32f();
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 {
        return DynamicImage::new(width, height, img.color());
    }
    let span = |d: u32, dst: u32, src: u32| -> (u32, u32) {
        let start = (d as u64 * src as u64 / dst as u64) as u32;
        let end = (((d as u64 + 1) * src as u64 / dst as u64) as u32)
            .max(start + 1)
            .min(src);
        (start.min(src - 1), end)
    };

    let out = Rgba32FImage::from_fn(width, height, |x, y| {
        let (x0, x1) = span(x, width, sw);
        let (y0, y1) = span(y, height, sh);
        let mut acc = [0f32; 4];
        for sy in y0..y1 {
            for sx in x0..x1 {
                let p = src.get_pixel(sx, sy).0;
                for c in 0..4 {
                    acc[c] += p[c];
                }
            }
        }
        let n = ((x1 - x0) * (y1 - y0)) as f32;
        Rgba(acc.map(|v| v / n))
    });
    restore_layout(img, out)
}

/// Rotate clockwise by `angle` degrees.
///
/// Quarter turns are lossless and swap dimensions for 90/270. Other angles
/// keep the canvas size, rotate about the centre and fill uncovered
/// pixels with `background`.
pub fn rotate(img: &DynamicImage, angle: f64, background: Color) -> DynamicImage {
    match calculations::rotation_for(angle) {
        Rotation::None => img.clone(),
        Rotation::Clockwise90 => img.rotate90(),
        Rotation::Clockwise180 => img.rotate180(),
        Rotation::Clockwise270 => img.rotate270(),
        Rotation::Arbitrary(degrees) => rotate_arbitrary(img, degrees, background),
    }
}

fn rotate_arbitrary(img: &DynamicImage, degrees: f64, background: Color) -> DynamicImage {
    let src = img.to_rgba32f();
    let (w, h) = src.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    let bg = Rgba(background.to_f32());

    // Inverse mapping: rotate each target pixel back into the source
    let out = Rgba32FImage::from_fn(w, h, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = (cos * dx + sin * dy + cx).round();
        let sy = (-sin * dx + cos * dy + cy).round();
        sample(&src, sx, sy).unwrap_or(bg)
    });
    restore_layout(img, out)
}

fn sample(src: &Rgba32FImage, x: f64, y: f64) -> Option<Rgba<f32>> {
    if x < 0.0 || y < 0.0 || x >= src.width() as f64 || y >= src.height() as f64 {
        return None;
    }
    Some(*src.get_pixel(x as u32, y as u32))
}

/// Cut a `width` × `height` window whose origin is `(x, y)` in the source
/// and whose axes are rotated clockwise by `angle` degrees.
pub fn copy_crop_rotate(
    img: &DynamicImage,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    angle: f64,
    background: Color,
) -> DynamicImage {
    let src = img.to_rgba32f();
    let (sin, cos) = angle.to_radians().sin_cos();
    let bg = Rgba(background.to_f32());
    let out = Rgba32FImage::from_fn(width, height, |i, j| {
        let (i, j) = (i as f64, j as f64);
        let sx = (x as f64 + i * cos - j * sin).round();
        let sy = (y as f64 + i * sin + j * cos).round();
        sample(&src, sx, sy).unwrap_or(bg)
    });
    restore_layout(img, out)
}

pub fn crop(img: &DynamicImage, rect: CropRect) -> DynamicImage {
    img.crop_imm(rect.x, rect.y, rect.width, rect.height)
}

/// Number of rows left after trimming uniformly coloured rows off the
/// bottom; the reference colour is the bottom-left pixel. At least one
/// row always remains.
pub fn fast_auto_crop_height(img: &DynamicImage) -> u32 {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h <= 1 {
        return h;
    }
    let buf = img.to_rgba32f();
    let reference = *buf.get_pixel(0, h - 1);
    let mut rows = h;
    while rows > 1 && (0..w).all(|x| *buf.get_pixel(x, rows - 1) == reference) {
        rows -= 1;
    }
    rows
}

// ---------------------------------------------------------------------------
// Colour
// ---------------------------------------------------------------------------

pub fn invert(img: &DynamicImage) -> DynamicImage {
    let mut out = img.clone();
    out.invert();
    out
}

/// Stretch the colour range so the darkest sample becomes 0 and the
/// brightest 1. Alpha is left alone; flat images are returned unchanged.
pub fn normalize(img: &DynamicImage) -> DynamicImage {
    let buf = img.to_rgba32f();
    let (mut lo, mut hi) = (f32::MAX, f32::MIN);
    for p in buf.pixels() {
        for &c in &p.0[..3] {
            lo = lo.min(c);
            hi = hi.max(c);
        }
    }
    if hi - lo <= f32::EPSILON {
        return img.clone();
    }
    let range = hi - lo;
    map_rgba(img, |[r, g, b, a]| {
        [(r - lo) / range, (g - lo) / range, (b - lo) / range, a]
    })
}

pub fn brightness_contrast_gamma(
    img: &DynamicImage,
    brightness: f64,
    contrast: f64,
    gamma: f64,
) -> DynamicImage {
    let (b, c, g) = (brightness as f32, contrast as f32, gamma as f32);
    map_rgba(img, |[r, gr, bl, a]| {
        [
            calculations::brightness_contrast_gamma(r, b, c, g),
            calculations::brightness_contrast_gamma(gr, b, c, g),
            calculations::brightness_contrast_gamma(bl, b, c, g),
            a,
        ]
    })
}

/// Shift hue by `hue` degrees and add `saturation` / `lightness`
/// (each `-1..=1`) in HSL space.
pub fn hue_saturation_lightness(
    img: &DynamicImage,
    hue: f64,
    saturation: f64,
    lightness: f64,
) -> DynamicImage {
    let (dh, ds, dl) = (hue as f32, saturation as f32, lightness as f32);
    map_rgba(img, |[r, g, b, a]| {
        let (h, s, l) = calculations::rgb_to_hsl(r, g, b);
        let (r, g, b) = calculations::hsl_to_rgb(
            h + dh,
            (s + ds).clamp(0.0, 1.0),
            (l + dl).clamp(0.0, 1.0),
        );
        [r, g, b, a]
    })
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Count dark pixels (luma below 128) inside `margin` and compare their
/// share of the whole image area against `percent`.
///
/// Returns `(is_empty, dark_pixels)`.
pub fn detect_empty(img: &DynamicImage, percent: f64, margin: u32) -> (bool, u64) {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return (true, 0);
    }
    let margin = calculations::effective_margin(margin);
    let mut dark = 0u64;
    if w > 2 * margin && h > 2 * margin {
        for y in margin..h - margin {
            for x in margin..w - margin {
                if gray.get_pixel(x, y).0[0] < 128 {
                    dark += 1;
                }
            }
        }
    }
    let share = dark as f64 / (w as f64 * h as f64) * 100.0;
    (share < percent, dark)
}

/// Gray version of a scan prepared for thresholding.
///
/// The range between ink and paper (see [`calculations::stretch_range`])
/// is stretched to full scale, converted to gray and, when `radius` is
/// non-zero, sharpened with an unsharp mask of that radius and standard
/// deviation `sd`. The result is still 8-bit.
pub fn optimize_2bw(img: &DynamicImage, low: u8, high: u8, radius: u32, sd: f64) -> GrayImage {
    let rgb = img.to_rgb8();
    let mut histograms = [[0u32; 256]; 3];
    for p in rgb.pixels() {
        for (channel, &v) in histograms.iter_mut().zip(p.0.iter()) {
            channel[v as usize] += 1;
        }
    }
    let (lowest, highest) = calculations::stretch_range(&histograms, low, high);

    // 8.8 fixed point, truncating like the integer luma weights below
    let a = 255 * 256 / (highest - lowest).max(1);
    let b = -a * lowest;
    let level = |v: u8| ((v as i32 * a + b) / 256).clamp(0, 255);
    let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, bl] = rgb.get_pixel(x, y).0;
        Luma([((level(r) * 28 + level(g) * 59 + level(bl) * 11) / 100) as u8])
    });

    if radius == 0 {
        gray
    } else {
        unsharp_mask(&gray, radius, sd)
    }
}

/// `2 * src - blur(src)` with a separable Gaussian; edges repeat.
fn unsharp_mask(gray: &GrayImage, radius: u32, sd: f64) -> GrayImage {
    let kernel = calculations::gaussian_kernel(radius, sd);
    let (w, h) = gray.dimensions();
    let (wu, r) = (w as usize, radius as i64);
    let src: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32).collect();
    let tap = |centre: u32, k: usize, len: u32| (centre as i64 + k as i64 - r).clamp(0, len as i64 - 1) as usize;

    let mut rows = vec![0f32; src.len()];
    for y in 0..h as usize {
        for x in 0..w {
            rows[y * wu + x as usize] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * src[y * wu + tap(x, k, w)])
                .sum();
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let blurred: f32 = kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| weight * rows[tap(y, k, h) * wu + x as usize])
            .sum();
        let v = 2.0 * src[y as usize * wu + x as usize] - blurred;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}
