//! Pure calculation functions for image geometry and colour math.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions of a scaled image.
///
/// A `y_factor` of zero means "same as `x_factor`". Each dimension is
/// rounded and never drops below one pixel.
///
/// # Examples
/// ```
/// # use exact_image::imaging::calculations::scaled_dimensions;
/// assert_eq!(scaled_dimensions((400, 300), 0.5, 0.0), (200, 150));
/// assert_eq!(scaled_dimensions((400, 300), 2.0, 1.0), (800, 300));
/// assert_eq!(scaled_dimensions((3, 3), 0.01, 0.0), (1, 1));
/// ```
pub fn scaled_dimensions(size: (u32, u32), x_factor: f64, y_factor: f64) -> (u32, u32) {
    let y_factor = if y_factor == 0.0 { x_factor } else { y_factor };
    let scale = |v: u32, f: f64| -> u32 { ((v as f64 * f).round() as u32).max(1) };
    (scale(size.0, x_factor), scale(size.1, y_factor))
}

/// Scale a stored resolution by a pixel scale factor; unknown stays unknown.
///
/// Doubling the pixel count of a fixed physical size doubles its DPI.
pub fn scaled_resolution(resolution: u32, factor: f64) -> u32 {
    if resolution == 0 {
        return 0;
    }
    ((resolution as f64 * factor).round() as u32).max(1)
}

/// Largest working buffer a single operation may allocate.
pub const MAX_WORKING_BYTES: u64 = 4 << 30;

/// Bytes of the `Rgba32F` working copy built for a `width` × `height` result.
///
/// ```
/// # use exact_image::imaging::calculations::{MAX_WORKING_BYTES, working_bytes};
/// assert_eq!(working_bytes(10, 10), 1600);
/// assert!(working_bytes(u32::MAX, u32::MAX) > MAX_WORKING_BYTES);
/// ```
pub fn working_bytes(width: u32, height: u32) -> u64 {
    (width as u64).saturating_mul(height as u64).saturating_mul(16)
}

/// A crop rectangle that lies fully inside its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clamp a requested crop to the image bounds.
///
/// Returns `None` when nothing of the request overlaps the image.
pub fn clamp_crop(size: (u32, u32), x: u32, y: u32, width: u32, height: u32) -> Option<CropRect> {
    let (img_w, img_h) = size;
    if x >= img_w || y >= img_h {
        return None;
    }
    let width = width.min(img_w - x);
    let height = height.min(img_h - y);
    if width == 0 || height == 0 {
        return None;
    }
    Some(CropRect {
        x,
        y,
        width,
        height,
    })
}

/// Round an empty-page margin down to a multiple of 8.
pub fn effective_margin(margin: u32) -> u32 {
    margin - margin % 8
}

/// How a rotation by an arbitrary number of degrees is carried out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rotation {
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
    /// Any other angle, normalised to `(0, 360)` degrees clockwise.
    Arbitrary(f64),
}

/// Classify a clockwise rotation angle in degrees.
///
/// ```
/// # use exact_image::imaging::calculations::{Rotation, rotation_for};
/// assert_eq!(rotation_for(-90.0), Rotation::Clockwise270);
/// assert_eq!(rotation_for(720.0), Rotation::None);
/// assert_eq!(rotation_for(45.0), Rotation::Arbitrary(45.0));
/// ```
pub fn rotation_for(angle: f64) -> Rotation {
    let normalized = angle.rem_euclid(360.0);
    const EPS: f64 = 1e-9;
    let near = |target: f64| (normalized - target).abs() < EPS;
    if near(0.0) || near(360.0) {
        Rotation::None
    } else if near(90.0) {
        Rotation::Clockwise90
    } else if near(180.0) {
        Rotation::Clockwise180
    } else if near(270.0) {
        Rotation::Clockwise270
    } else {
        Rotation::Arbitrary(normalized)
    }
}

/// Levels mapped to black and white before a bi-level conversion.
///
/// Without overrides, black is the darkest level any channel uses at least
/// twice and white is the luma of the most frequent level per channel (the
/// paper colour). The two are kept at least 128 apart. Non-zero `low` /
/// `high` replace the detected values.
pub fn stretch_range(histograms: &[[u32; 256]; 3], low: u8, high: u8) -> (i32, i32) {
    const MIN_COUNT: u32 = 2;
    const MIN_DELTA: i32 = 128;

    let lowest = (0..256)
        .find(|&i| histograms.iter().any(|h| h[i] >= MIN_COUNT))
        .unwrap_or(255) as i32;
    // First level with the highest count
    let peak = |h: &[u32; 256]| {
        (0..256).fold(0usize, |best, i| if h[i] > h[best] { i } else { best }) as f64
    };
    let background = 0.21267 * peak(&histograms[0])
        + 0.71516 * peak(&histograms[1])
        + 0.07217 * peak(&histograms[2]);
    let highest = background as i32;

    let lowest = lowest.min(highest - MIN_DELTA).max(0);
    let highest = highest.max(lowest + MIN_DELTA).min(255);
    (
        if low != 0 { low as i32 } else { lowest },
        if high != 0 { high as i32 } else { highest },
    )
}

/// Normalised 1-D Gaussian of `2 * radius + 1` taps.
///
/// ```
/// # use exact_image::imaging::calculations::gaussian_kernel;
/// let k = gaussian_kernel(2, 1.0);
/// assert_eq!(k.len(), 5);
/// assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
/// assert!(k[2] > k[1] && k[1] > k[0]);
/// ```
pub fn gaussian_kernel(radius: u32, sd: f64) -> Vec<f32> {
    let r = radius as i64;
    let weights: Vec<f64> = (-r..=r)
        .map(|d| (-((d * d) as f64) / (2.0 * sd * sd)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Convert RGB in `0..=1` to HSL with hue in degrees `[0, 360)`.
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;
    if delta <= f32::EPSILON {
        return (0.0, 0.0, l);
    }
    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };
    let h = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    (h * 60.0, s, l)
}

/// Inverse of [`rgb_to_hsl`].
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s <= f32::EPSILON {
        return (l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let h = h.rem_euclid(360.0) / 360.0;
    let channel = |t: f32| -> f32 {
        let t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

/// Apply brightness, contrast and gamma to one normalised sample.
///
/// Brightness and contrast are in `-1..=1` (0 = unchanged); gamma is a
/// positive exponent divisor (1 = unchanged).
pub fn brightness_contrast_gamma(v: f32, brightness: f32, contrast: f32, gamma: f32) -> f32 {
    let v = (v - 0.5) * (1.0 + contrast) + 0.5 + brightness;
    let v = v.clamp(0.0, 1.0);
    if gamma > 0.0 && (gamma - 1.0).abs() > f32::EPSILON {
        v.powf(1.0 / gamma)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ink at `ink` in every channel plus paper at `paper` per channel.
    fn histograms(ink: (u8, u32), paper: [u8; 3]) -> [[u32; 256]; 3] {
        let mut h = [[0u32; 256]; 3];
        for (channel, &level) in h.iter_mut().zip(paper.iter()) {
            channel[ink.0 as usize] += ink.1;
            channel[level as usize] += 500;
        }
        h
    }

    #[test]
    fn stretch_range_finds_ink_and_paper() {
        let mut h = histograms((40, 10), [200, 220, 180]);
        // A single stray pixel is noise
        h[0][5] = 1;
        // 0.21267 * 200 + 0.71516 * 220 + 0.07217 * 180 = 212.86
        assert_eq!(stretch_range(&h, 0, 0), (40, 212));
    }

    #[test]
    fn stretch_range_keeps_minimum_spread() {
        // Paper luma 201.4; ink at 150 is pulled down to 201 - 128
        let h = histograms((150, 10), [210, 200, 190]);
        assert_eq!(stretch_range(&h, 0, 0), (73, 201));
    }

    #[test]
    fn stretch_range_overrides() {
        let h = histograms((40, 10), [200, 220, 180]);
        assert_eq!(stretch_range(&h, 10, 250), (10, 250));
        assert_eq!(stretch_range(&h, 0, 250), (40, 250));
    }

    #[test]
    fn working_bytes_saturates() {
        assert_eq!(working_bytes(0, 100), 0);
        assert_eq!(working_bytes(u32::MAX, u32::MAX), u64::MAX);
    }

    #[test]
    fn scale_uses_x_factor_when_y_is_zero() {
        assert_eq!(scaled_dimensions((100, 50), 1.5, 0.0), (150, 75));
    }

    #[test]
    fn scale_never_reaches_zero() {
        assert_eq!(scaled_dimensions((10, 10), 0.0001, 0.0001), (1, 1));
    }

    #[test]
    fn resolution_scaling() {
        assert_eq!(scaled_resolution(0, 2.0), 0);
        assert_eq!(scaled_resolution(72, 2.0), 144);
        assert_eq!(scaled_resolution(300, 0.5), 150);
    }

    #[test]
    fn crop_is_clamped() {
        assert_eq!(
            clamp_crop((100, 80), 90, 70, 50, 50),
            Some(CropRect {
                x: 90,
                y: 70,
                width: 10,
                height: 10
            })
        );
    }

    #[test]
    fn crop_outside_is_none() {
        assert_eq!(clamp_crop((100, 80), 100, 0, 10, 10), None);
        assert_eq!(clamp_crop((100, 80), 0, 0, 0, 10), None);
    }

    #[test]
    fn margin_rounds_down_to_eight() {
        assert_eq!(effective_margin(0), 0);
        assert_eq!(effective_margin(7), 0);
        assert_eq!(effective_margin(16), 16);
        assert_eq!(effective_margin(23), 16);
    }

    #[test]
    fn rotation_classification() {
        assert_eq!(rotation_for(0.0), Rotation::None);
        assert_eq!(rotation_for(90.0), Rotation::Clockwise90);
        assert_eq!(rotation_for(-180.0), Rotation::Clockwise180);
        assert_eq!(rotation_for(450.0), Rotation::Clockwise90);
        assert_eq!(rotation_for(-30.0), Rotation::Arbitrary(330.0));
    }

    #[test]
    fn hsl_roundtrip_primaries() {
        for (r, g, b) in [(1.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.2, 0.4, 0.6), (0.5, 0.5, 0.5)] {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            let (r2, g2, b2) = hsl_to_rgb(h, s, l);
            assert!((r - r2).abs() < 1e-5 && (g - g2).abs() < 1e-5 && (b - b2).abs() < 1e-5);
        }
    }

    #[test]
    fn red_has_hue_zero() {
        let (h, s, l) = rgb_to_hsl(1.0, 0.0, 0.0);
        assert_eq!((h, s, l), (0.0, 1.0, 0.5));
    }

    #[test]
    fn bcg_identity() {
        for v in [0.0, 0.25, 0.5, 1.0] {
            assert!((brightness_contrast_gamma(v, 0.0, 0.0, 1.0) - v).abs() < 1e-6);
        }
    }

    #[test]
    fn bcg_brightness_and_clamp() {
        assert!((brightness_contrast_gamma(0.5, 0.25, 0.0, 1.0) - 0.75).abs() < 1e-6);
        assert_eq!(brightness_contrast_gamma(0.9, 0.5, 0.0, 1.0), 1.0);
        assert_eq!(brightness_contrast_gamma(0.5, 0.0, -1.0, 1.0), 0.5);
    }

    #[test]
    fn bcg_gamma_brightens_midtones() {
        assert!(brightness_contrast_gamma(0.25, 0.0, 0.0, 2.0) > 0.25);
    }
}
