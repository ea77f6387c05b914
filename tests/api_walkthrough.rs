//! End-to-end use of the public handle API against files on disk.

use exact_image::ImageError;
use exact_image::imaging::{Codec, Color, Fill, Image, Quality};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a `width`×`height` RGB TIFF with a diagonal line at `dpi`.
fn write_tiff(dir: &Path, name: &str, width: u32, height: u32, dpi: u32) -> PathBuf {
    let mut image = Image::with_type_and_size(3, 8, width, height, Fill::Background).unwrap();
    for i in 0..width.min(height) {
        image.set_pixel(i, i, Color::rgb(0.8, 0.1, 0.1)).unwrap();
    }
    image.set_xres(dpi);
    image.set_yres(dpi);
    let path = dir.join(name);
    image.encode_file(&path, Quality::default(), "").unwrap();
    path
}

#[test]
fn decode_encode_redecode_and_retag() {
    let tmp = TempDir::new().unwrap();
    let first = write_tiff(tmp.path(), "first.tif", 256, 256, 72);
    let second = write_tiff(tmp.path(), "second.tif", 120, 80, 300);

    let mut image = Image::new();
    image.decode_file(&first).unwrap();
    assert_eq!((image.width(), image.height()), (256, 256));

    let jpeg = tmp.path().join("test.jpg");
    image.encode_file(&jpeg, Quality::new(80), "").unwrap();
    let written = std::fs::read(&jpeg).unwrap();
    assert_eq!(Codec::detect(&written), Some(Codec::Jpeg));

    let bits = std::fs::read(&second).unwrap();
    image.decode(&bits).unwrap();
    assert_eq!(image.width(), 120);
    assert_eq!(image.height(), 80);
    assert_eq!(image.xres(), 300);
    assert_eq!(image.yres(), 300);
    assert_eq!(image.channels(), 3);
    assert_eq!(image.channel_depth(), 8);

    image.set_xres(144);
    image.set_yres(144);
    assert_eq!((image.xres(), image.yres()), (144, 144));
    assert_eq!((image.width(), image.height()), (120, 80));

    drop(image);
}

#[test]
fn retagged_resolution_survives_every_resolution_codec() {
    let tmp = TempDir::new().unwrap();
    let source = write_tiff(tmp.path(), "src.tif", 40, 30, 72);
    let mut image = Image::new();
    image.decode_file(&source).unwrap();
    image.set_xres(144);
    image.set_yres(144);

    for name in ["out.jpg", "out.png", "out.tif"] {
        let path = tmp.path().join(name);
        image.encode_file(&path, Quality::new(80), "").unwrap();
        let mut back = Image::new();
        back.decode_file(&path).unwrap();
        assert_eq!((back.xres(), back.yres()), (144, 144), "{name}");
    }
}

#[test]
fn failures_are_reported_and_harmless() {
    let tmp = TempDir::new().unwrap();
    let source = write_tiff(tmp.path(), "ok.tif", 16, 16, 96);
    let mut image = Image::new();
    image.decode_file(&source).unwrap();

    assert!(matches!(
        image.decode_file(tmp.path().join("absent.tif")),
        Err(ImageError::Io(_))
    ));
    assert!(matches!(
        image.decode(b"not an image at all"),
        Err(ImageError::Decode(_))
    ));
    assert_eq!((image.width(), image.xres()), (16, 96));

    let bad_codec = tmp.path().join("out.unknown");
    assert!(matches!(
        image.encode_file(&bad_codec, Quality::default(), ""),
        Err(ImageError::UnsupportedCodec(_))
    ));
    assert!(!bad_codec.exists());

    let bad_option = tmp.path().join("out.tif");
    assert!(matches!(
        image.encode_file(&bad_option, Quality::default(), "brotli"),
        Err(ImageError::InvalidArgument(_))
    ));
    assert!(!bad_option.exists());
}

#[test]
fn geometry_through_the_handle() {
    let tmp = TempDir::new().unwrap();
    let source = write_tiff(tmp.path(), "geo.tif", 200, 100, 200);
    let mut image = Image::new();
    image.decode_file(&source).unwrap();

    image.scale(0.5, 0.0).unwrap();
    assert_eq!((image.width(), image.height()), (100, 50));
    assert_eq!(image.xres(), 100);

    image.rotate(270.0);
    assert_eq!((image.width(), image.height()), (50, 100));

    image.crop(10, 10, 20, 30).unwrap();
    assert_eq!((image.width(), image.height()), (20, 30));

    image.convert_colorspace("gray1", 127).unwrap();
    let bilevel = tmp.path().join("bw.png");
    image.encode_file(&bilevel, Quality::default(), "best").unwrap();
    let mut back = Image::new();
    back.decode_file(&bilevel).unwrap();
    assert_eq!((back.width(), back.height()), (20, 30));
    assert_eq!(back.channels(), 1);
    assert_eq!(back.channel_depth(), 1);
}
