//! Resolution (pixel density) of encoded images.
//!
//! The `image` decoders drop physical resolution, so it is read here from
//! the container, through the format crates where they expose it:
//!
//! | Format | Source |
//! |---|---|
//! | JPEG | JFIF APP0 density, else EXIF IFD0 via `exif::Reader` |
//! | TIFF | X/YResolution + ResolutionUnit via `tiff::decoder::Decoder::find_tag` |
//! | PNG | `pHYs` via `png::Decoder`, `Info::pixel_dims` |
//! | BMP | `biXPelsPerMeter` / `biYPelsPerMeter` |
//!
//! Everything is reported in dots per inch. Anything malformed or missing
//! yields [`Density::UNKNOWN`]; this module never fails.

use exif::{In, Reader as ExifReader, Tag as ExifTag};
use std::io::Cursor;
use tiff::decoder::Decoder as TiffDecoder;
use tiff::decoder::ifd::Value as TiffValue;
use tiff::tags::Tag as TiffTag;

/// Horizontal and vertical resolution in DPI; 0 means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Density {
    pub x: u32,
    pub y: u32,
}

impl Density {
    pub const UNKNOWN: Density = Density { x: 0, y: 0 };

    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn is_known(self) -> bool {
        self.x != 0 || self.y != 0
    }
}

const CM_PER_INCH: f64 = 2.54;
const METERS_PER_INCH: f64 = 0.0254;

// ResolutionUnit codes, shared by TIFF and EXIF
const UNIT_INCH: u32 = 2;
const UNIT_CENTIMETER: u32 = 3;

pub(crate) const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn dpi_from_f64(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Combine per-axis values in `unit` into DPI. Unit 1 (no absolute unit)
/// and anything unknown give [`Density::UNKNOWN`].
fn density_in_unit(x: Option<f64>, y: Option<f64>, unit: u32) -> Density {
    let scale = match unit {
        UNIT_INCH => 1.0,
        UNIT_CENTIMETER => CM_PER_INCH,
        _ => return Density::UNKNOWN,
    };
    let dpi = |v: Option<f64>| v.map_or(0, |v| dpi_from_f64(v * scale));
    Density::new(dpi(x), dpi(y))
}

/// Read the resolution of an encoded image, dispatching on its magic bytes.
pub fn read_density(data: &[u8]) -> Density {
    if data.starts_with(&[0xFF, 0xD8]) {
        read_density_from_jpeg(data)
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        read_density_from_tiff(data)
    } else if data.starts_with(PNG_SIGNATURE) {
        read_density_from_png(data)
    } else if data.starts_with(b"BM") {
        read_density_from_bmp(data)
    } else {
        Density::UNKNOWN
    }
}

// ---------------------------------------------------------------------------
// JPEG: JFIF APP0, falling back to EXIF
// ---------------------------------------------------------------------------

const JFIF_HEADER: &[u8] = b"JFIF\0";

fn read_density_from_jpeg(data: &[u8]) -> Density {
    find_jfif_density(data).unwrap_or_else(|| read_density_from_exif(data))
}

/// Walk the marker segments up to the first scan looking for a JFIF APP0
/// segment with an absolute unit.
fn find_jfif_density(data: &[u8]) -> Option<Density> {
    let mut pos = 2;

    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // Fill bytes and markers without a length field
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0xD8 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        // SOS or EOI: no more metadata segments
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 {
            return None;
        }
        let seg_end = (pos + 2 + seg_len).min(data.len());
        let segment = &data[pos + 4..seg_end];

        if marker == 0xE0 && segment.starts_with(JFIF_HEADER) {
            return parse_jfif(segment);
        }
        pos += 2 + seg_len;
    }
    None
}

/// JFIF APP0 layout after the identifier:
///   version (2), units (1), Xdensity (2, BE), Ydensity (2, BE)
///
/// Units: 0 = aspect ratio only, 1 = dots per inch, 2 = dots per cm.
fn parse_jfif(segment: &[u8]) -> Option<Density> {
    let body = segment.get(JFIF_HEADER.len()..)?;
    if body.len() < 7 {
        return None;
    }
    let units = body[2];
    let x = u16::from_be_bytes([body[3], body[4]]) as f64;
    let y = u16::from_be_bytes([body[5], body[6]]) as f64;
    match units {
        1 => Some(Density::new(dpi_from_f64(x), dpi_from_f64(y))),
        2 => Some(Density::new(
            dpi_from_f64(x * CM_PER_INCH),
            dpi_from_f64(y * CM_PER_INCH),
        )),
        _ => None,
    }
}

fn read_density_from_exif(data: &[u8]) -> Density {
    let Ok(exif) = ExifReader::new().read_from_container(&mut Cursor::new(data)) else {
        return Density::UNKNOWN;
    };
    let rational = |tag: ExifTag| {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|field| match &field.value {
                exif::Value::Rational(values) => values.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
                _ => None,
            })
    };
    let unit = exif
        .get_field(ExifTag::ResolutionUnit, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(UNIT_INCH);
    density_in_unit(
        rational(ExifTag::XResolution),
        rational(ExifTag::YResolution),
        unit,
    )
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

fn read_density_from_tiff(data: &[u8]) -> Density {
    let Ok(mut decoder) = TiffDecoder::new(Cursor::new(data)) else {
        return Density::UNKNOWN;
    };
    // Baseline TIFF default is inches
    let unit = decoder
        .find_tag_unsigned::<u32>(TiffTag::ResolutionUnit)
        .ok()
        .flatten()
        .unwrap_or(UNIT_INCH);
    let x = find_tiff_number(&mut decoder, TiffTag::XResolution);
    let y = find_tiff_number(&mut decoder, TiffTag::YResolution);
    density_in_unit(x, y, unit)
}

fn find_tiff_number(decoder: &mut TiffDecoder<Cursor<&[u8]>>, tag: TiffTag) -> Option<f64> {
    decoder.find_tag(tag).ok().flatten().and_then(tiff_number)
}

fn tiff_number(value: TiffValue) -> Option<f64> {
    match value {
        TiffValue::Rational(n, d) if d != 0 => Some(n as f64 / d as f64),
        TiffValue::RationalBig(n, d) if d != 0 => Some(n as f64 / d as f64),
        TiffValue::Short(v) => Some(v.into()),
        TiffValue::Unsigned(v) => Some(v.into()),
        TiffValue::Float(v) => Some(v.into()),
        TiffValue::Double(v) => Some(v),
        TiffValue::List(values) => values.into_iter().next().and_then(tiff_number),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

fn read_density_from_png(data: &[u8]) -> Density {
    let Ok(reader) = png::Decoder::new(Cursor::new(data)).read_info() else {
        return Density::UNKNOWN;
    };
    match reader.info().pixel_dims {
        Some(png::PixelDimensions {
            xppu,
            yppu,
            unit: png::Unit::Meter,
        }) => Density::new(
            dpi_from_f64(xppu as f64 * METERS_PER_INCH),
            dpi_from_f64(yppu as f64 * METERS_PER_INCH),
        ),
        _ => Density::UNKNOWN,
    }
}

// ---------------------------------------------------------------------------
// BMP: BITMAPINFOHEADER pels per metre
// ---------------------------------------------------------------------------

const BMP_FILE_HEADER_LEN: usize = 14;

fn read_density_from_bmp(data: &[u8]) -> Density {
    let info = BMP_FILE_HEADER_LEN;
    let Some(header_size) = data
        .get(info..info + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    else {
        return Density::UNKNOWN;
    };
    // The 12-byte OS/2 core header has no resolution fields
    if header_size < 40 {
        return Density::UNKNOWN;
    }
    let read_i32 = |offset: usize| -> Option<i32> {
        let b = data.get(offset..offset + 4)?;
        Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    };
    let (Some(x), Some(y)) = (read_i32(info + 24), read_i32(info + 28)) else {
        return Density::UNKNOWN;
    };
    Density::new(
        dpi_from_f64(x as f64 * METERS_PER_INCH),
        dpi_from_f64(y as f64 * METERS_PER_INCH),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{Rational, TiffEncoder, colortype};
    use tiff::tags::ResolutionUnit;

    fn jfif_segment(units: u8, x: u16, y: u16) -> Vec<u8> {
        let mut seg = vec![0xFF, 0xE0, 0x00, 0x10];
        seg.extend_from_slice(JFIF_HEADER);
        seg.extend_from_slice(&[1, 2, units]);
        seg.extend_from_slice(&x.to_be_bytes());
        seg.extend_from_slice(&y.to_be_bytes());
        seg.extend_from_slice(&[0, 0]);
        seg
    }

    /// Bare little-endian EXIF TIFF block: IFD0 with X/YResolution
    /// rationals and a ResolutionUnit short.
    fn exif_block(x: (u32, u32), y: (u32, u32), unit: u16) -> Vec<u8> {
        let mut t = Vec::new();
        t.extend_from_slice(b"II*\0");
        t.extend_from_slice(&8u32.to_le_bytes());
        // IFD at 8: 3 entries, then next-IFD offset; rationals follow at 8+2+36+4 = 50
        t.extend_from_slice(&3u16.to_le_bytes());
        let rational_base = 50u32;
        for (tag, typ, value) in [
            (282u16, 5u16, rational_base),
            (283, 5, rational_base + 8),
            (296, 3, unit as u32),
        ] {
            t.extend_from_slice(&tag.to_le_bytes());
            t.extend_from_slice(&typ.to_le_bytes());
            t.extend_from_slice(&1u32.to_le_bytes());
            t.extend_from_slice(&value.to_le_bytes());
        }
        t.extend_from_slice(&0u32.to_le_bytes());
        for (n, d) in [x, y] {
            t.extend_from_slice(&n.to_le_bytes());
            t.extend_from_slice(&d.to_le_bytes());
        }
        t
    }

    /// A 4x4 gray TIFF carrying the given resolution tags.
    fn tiff_with(x: Rational, y: Rational, unit: ResolutionUnit) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder.new_image::<colortype::Gray8>(4, 4).unwrap();
            image.resolution_unit(unit);
            image.x_resolution(x);
            image.y_resolution(y);
            image.write_data(&[128u8; 16]).unwrap();
        }
        cursor.into_inner()
    }

    fn png_with(dims: Option<png::PixelDimensions>) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, 2, 2);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_pixel_dims(dims);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 255, 255, 0]).unwrap();
        }
        out
    }

    #[test]
    fn empty_and_garbage_are_unknown() {
        assert_eq!(read_density(&[]), Density::UNKNOWN);
        assert_eq!(read_density(b"not an image at all"), Density::UNKNOWN);
        assert_eq!(read_density(&[0xFF, 0xD8, 0xFF]), Density::UNKNOWN);
        assert_eq!(read_density(b"II*\0garbage"), Density::UNKNOWN);
    }

    #[test]
    fn jfif_inches() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(jfif_segment(1, 300, 150));
        data.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(read_density(&data), Density::new(300, 150));
    }

    #[test]
    fn jfif_centimetres_convert_to_dpi() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(jfif_segment(2, 118, 118));
        assert_eq!(read_density(&data), Density::new(300, 300));
    }

    #[test]
    fn jfif_aspect_ratio_falls_back_to_exif() {
        let mut data = vec![0xFF, 0xD8];
        data.extend(jfif_segment(0, 1, 1));
        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend(exif_block((72, 1), (72, 1), 2));
        data.extend_from_slice(&[0xFF, 0xE1]);
        data.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        data.extend(app1);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
        assert_eq!(read_density(&data), Density::new(72, 72));
    }

    #[test]
    fn tiff_rational_inches() {
        let data = tiff_with(Rational { n: 600, d: 1 }, Rational { n: 1200, d: 2 }, ResolutionUnit::Inch);
        assert_eq!(read_density(&data), Density::new(600, 600));
    }

    #[test]
    fn tiff_centimetre_unit() {
        let data = tiff_with(Rational { n: 100, d: 1 }, Rational { n: 100, d: 1 }, ResolutionUnit::Centimeter);
        assert_eq!(read_density(&data), Density::new(254, 254));
    }

    #[test]
    fn tiff_without_unit_is_unknown() {
        let data = tiff_with(Rational { n: 72, d: 1 }, Rational { n: 72, d: 1 }, ResolutionUnit::None);
        assert_eq!(read_density(&data), Density::UNKNOWN);
    }

    #[test]
    fn tiff_zero_denominator_is_ignored() {
        let data = tiff_with(Rational { n: 72, d: 0 }, Rational { n: 72, d: 1 }, ResolutionUnit::Inch);
        assert_eq!(read_density(&data), Density::new(0, 72));
    }

    #[test]
    fn truncated_tiff_does_not_panic() {
        let data = tiff_with(Rational { n: 72, d: 1 }, Rational { n: 72, d: 1 }, ResolutionUnit::Inch);
        for len in 0..data.len() {
            let _ = read_density(&data[..len]);
        }
    }

    #[test]
    fn png_phys_chunk() {
        let data = png_with(Some(png::PixelDimensions {
            xppu: 5669,
            yppu: 2835,
            unit: png::Unit::Meter,
        }));
        assert_eq!(read_density(&data), Density::new(144, 72));
    }

    #[test]
    fn png_without_metric_phys_is_unknown() {
        assert_eq!(read_density(&png_with(None)), Density::UNKNOWN);
        let aspect_only = png_with(Some(png::PixelDimensions {
            xppu: 1,
            yppu: 1,
            unit: png::Unit::Unspecified,
        }));
        assert_eq!(read_density(&aspect_only), Density::UNKNOWN);
    }

    #[test]
    fn bmp_pels_per_meter() {
        let mut data = vec![0u8; 54];
        data[0..2].copy_from_slice(b"BM");
        data[14..18].copy_from_slice(&40u32.to_le_bytes());
        data[38..42].copy_from_slice(&3780i32.to_le_bytes());
        data[42..46].copy_from_slice(&3780i32.to_le_bytes());
        assert_eq!(read_density(&data), Density::new(96, 96));
    }
}
