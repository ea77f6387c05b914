//! CLI output formatting.
//!
//! # Identify
//!
//! The default line names the file, codec and size, and adds physical
//! size when the resolution is known:
//!
//! ```text
//! scan.tif: tiff 2480x3508 @ 300x300dpi (209x297mm) 8 bits, 1 channel
//! photo.jpg: jpeg 640x480 24 bits, 3 channels
//! ```
//!
//! `--format` expands `%` fields and `\` escapes:
//!
//! | Field | Value |
//! |---|---|
//! | `%w` `%h` | width, height |
//! | `%P` | `WxH` |
//! | `%x` `%y` | resolution, `N PixelsPerInch` |
//! | `%z` `%q` | bits per sample |
//! | `%i` | path as given |
//! | `%d` `%f` `%e` `%t` | directory, file name, extension, file name without extension |
//! | `%%` | a literal `%` |
//!
//! Escapes: `\n`, `\t`, `\r`, `\\`. Unknown sequences are printed as-is.
//!
//! # Empty page
//!
//! ```text
//! page-01.tif: empty (12 dark pixels of 8699840, 0.00%)
//! ```
//!
//! Unreadable files get the same "unable to open" line as `identify` and
//! the remaining files are still checked.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `String` / `Vec<String>`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::error::Result;
use crate::imaging::{Codec, Image};
use serde::Serialize;
use std::path::Path;

/// What `identify` reports about one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub path: String,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub xres: u32,
    pub yres: u32,
    pub channels: u32,
    pub channel_depth: u32,
    pub colorspace: String,
}

impl ImageInfo {
    pub fn from_image(path: &str, codec: Option<Codec>, image: &Image) -> Self {
        Self {
            path: path.to_string(),
            codec: codec.map_or_else(|| "NONE".to_string(), |c| c.name().to_string()),
            width: image.width(),
            height: image.height(),
            xres: image.xres(),
            yres: image.yres(),
            channels: image.channels(),
            channel_depth: image.channel_depth(),
            colorspace: image.colorspace().name().to_string(),
        }
    }

    /// Read and decode `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let mut image = Image::new();
        image.decode(&data)?;
        Ok(Self::from_image(
            &path.display().to_string(),
            Codec::detect(&data),
            &image,
        ))
    }
}

fn plural(n: u32, word: &str) -> String {
    if n > 1 {
        format!("{n} {word}s")
    } else {
        format!("{n} {word}")
    }
}

/// The default one-line description.
pub fn format_identify_line(info: &ImageInfo) -> String {
    let mut line = format!("{}: {} {}x{}", info.path, info.codec, info.width, info.height);
    if info.xres > 0 && info.yres > 0 {
        line.push_str(&format!(
            " @ {}x{}dpi ({}x{}mm)",
            info.xres,
            info.yres,
            254 * info.width as u64 / info.xres as u64 / 10,
            254 * info.height as u64 / info.yres as u64 / 10,
        ));
    }
    line.push_str(&format!(
        " {}, {}",
        plural(info.channel_depth * info.channels, "bit"),
        plural(info.channels, "channel")
    ));
    line
}

/// Line printed for a file that could not be read or decoded.
pub fn format_unreadable(path: &str) -> String {
    format!("exact-image: unable to open image '{path}'.")
}

/// Expand a user format string against `info`.
pub fn expand_format(format: &str, info: &ImageInfo) -> String {
    let path = Path::new(&info.path);
    let mut out = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let Some(&field) = chars.peek() else {
                    out.push('%');
                    break;
                };
                let expanded = match field {
                    'w' => Some(info.width.to_string()),
                    'h' => Some(info.height.to_string()),
                    'P' => Some(format!("{}x{}", info.width, info.height)),
                    'x' => Some(format!("{} PixelsPerInch", info.xres)),
                    'y' => Some(format!("{} PixelsPerInch", info.yres)),
                    'z' | 'q' => Some(info.channel_depth.to_string()),
                    'i' => Some(info.path.clone()),
                    'd' => Some(
                        path.parent()
                            .map(|p| p.display().to_string())
                            .filter(|p| !p.is_empty())
                            .unwrap_or_else(|| ".".to_string()),
                    ),
                    'f' => Some(file_part(path.file_name())),
                    'e' => Some(file_part(path.extension())),
                    't' => Some(file_part(path.file_stem())),
                    '%' => Some("%".to_string()),
                    _ => None,
                };
                match expanded {
                    Some(text) => {
                        chars.next();
                        out.push_str(&text);
                    }
                    None => out.push('%'),
                }
            }
            '\\' => {
                let Some(&escape) = chars.peek() else {
                    out.push('\\');
                    break;
                };
                let expanded = match escape {
                    'n' => Some('\n'),
                    't' => Some('\t'),
                    'r' => Some('\r'),
                    '\\' => Some('\\'),
                    _ => None,
                };
                match expanded {
                    Some(ch) => {
                        chars.next();
                        out.push(ch);
                    }
                    None => out.push('\\'),
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn file_part(part: Option<&std::ffi::OsStr>) -> String {
    part.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// All results as a pretty JSON array; unreadable files carry an `error`.
pub fn format_identify_json(results: &[(String, Result<ImageInfo>)]) -> String {
    #[derive(Serialize)]
    #[serde(untagged)]
    enum Entry<'a> {
        Ok(&'a ImageInfo),
        Err { path: &'a str, error: String },
    }

    let entries: Vec<Entry<'_>> = results
        .iter()
        .map(|(path, result)| match result {
            Ok(info) => Entry::Ok(info),
            Err(e) => Entry::Err {
                path,
                error: e.to_string(),
            },
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
}

/// Format identify output for every file, in input order.
pub fn format_identify(results: &[(String, Result<ImageInfo>)], format: Option<&str>) -> Vec<String> {
    results
        .iter()
        .map(|(path, result)| match (result, format) {
            (Ok(info), Some(fmt)) => expand_format(fmt, info),
            (Ok(info), None) => format_identify_line(info),
            // Format strings carry their own line ends; keep error records on their own line
            (Err(_), Some(_)) => format!("{}\n", format_unreadable(path)),
            (Err(_), None) => format_unreadable(path),
        })
        .collect()
}

pub fn print_identify(results: &[(String, Result<ImageInfo>)], format: Option<&str>, json: bool) {
    if json {
        println!("{}", format_identify_json(results));
        return;
    }
    for line in format_identify(results, format) {
        if format.is_some() {
            print!("{line}");
        } else {
            println!("{line}");
        }
    }
}

/// Outcome of the empty-page check for one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmptyPageResult {
    pub empty: bool,
    pub dark_pixels: u64,
    pub total_pixels: u64,
}

impl EmptyPageResult {
    /// Decode `path` and run the blank-page check on it.
    pub fn check(path: &Path, percent: f64, margin: u32) -> Result<Self> {
        let mut image = Image::new();
        image.decode_file(path)?;
        let (empty, dark_pixels) = image.detect_empty(percent, margin);
        Ok(Self {
            empty,
            dark_pixels,
            total_pixels: image.width() as u64 * image.height() as u64,
        })
    }
}

pub fn format_empty_page(path: &str, result: &EmptyPageResult) -> String {
    let share = if result.total_pixels == 0 {
        0.0
    } else {
        result.dark_pixels as f64 / result.total_pixels as f64 * 100.0
    };
    format!(
        "{path}: {} ({} dark pixels of {}, {share:.2}%)",
        if result.empty { "empty" } else { "not empty" },
        result.dark_pixels,
        result.total_pixels
    )
}

/// One line per file, in input order.
pub fn format_empty_pages(results: &[(String, Result<EmptyPageResult>)]) -> Vec<String> {
    results
        .iter()
        .map(|(path, result)| match result {
            Ok(r) => format_empty_page(path, r),
            Err(_) => format_unreadable(path),
        })
        .collect()
}

pub fn print_empty_pages(results: &[(String, Result<EmptyPageResult>)]) {
    for line in format_empty_pages(results) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;
    use crate::test_helpers::{tiff_fixture, write_temp};

    fn info(path: &str, xres: u32) -> ImageInfo {
        ImageInfo {
            path: path.to_string(),
            codec: "tiff".to_string(),
            width: 2480,
            height: 3508,
            xres,
            yres: xres,
            channels: 1,
            channel_depth: 8,
            colorspace: "gray8".to_string(),
        }
    }

    #[test]
    fn identify_line_with_resolution() {
        assert_eq!(
            format_identify_line(&info("scan.tif", 300)),
            "scan.tif: tiff 2480x3508 @ 300x300dpi (209x297mm) 8 bits, 1 channel"
        );
    }

    #[test]
    fn identify_line_without_resolution() {
        let mut i = info("a.jpg", 0);
        i.codec = "jpeg".into();
        i.channels = 3;
        assert_eq!(
            format_identify_line(&i),
            "a.jpg: jpeg 2480x3508 24 bits, 3 channels"
        );
    }

    #[test]
    fn identify_line_single_bit() {
        let mut i = info("bw.png", 0);
        i.channel_depth = 1;
        assert!(format_identify_line(&i).ends_with(" 1 bit, 1 channel"));
    }

    #[test]
    fn expand_all_fields() {
        let i = info("dir/sub/page.tif", 300);
        assert_eq!(expand_format("%wx%h", &i), "2480x3508");
        assert_eq!(expand_format("%P", &i), "2480x3508");
        assert_eq!(expand_format("%x", &i), "300 PixelsPerInch");
        assert_eq!(expand_format("%z/%q", &i), "8/8");
        assert_eq!(expand_format("%i", &i), "dir/sub/page.tif");
        assert_eq!(expand_format("%d|%f|%e|%t", &i), "dir/sub|page.tif|tif|page");
        assert_eq!(expand_format("100%%", &i), "100%");
    }

    #[test]
    fn expand_escapes() {
        let i = info("a.tif", 0);
        assert_eq!(expand_format("%w\\t%h\\n", &i), "2480\t3508\n");
        assert_eq!(expand_format("a\\\\b", &i), "a\\b");
    }

    #[test]
    fn expand_unknown_sequences_verbatim() {
        let i = info("a.tif", 0);
        assert_eq!(expand_format("%k", &i), "%k");
        assert_eq!(expand_format("\\q", &i), "\\q");
        assert_eq!(expand_format("end%", &i), "end%");
        assert_eq!(expand_format("end\\", &i), "end\\");
    }

    #[test]
    fn directory_of_bare_file_is_dot() {
        assert_eq!(expand_format("%d", &info("a.tif", 0)), ".");
    }

    #[test]
    fn identify_keeps_input_order_and_reports_failures() {
        let results = vec![
            ("a.tif".to_string(), Ok(info("a.tif", 300))),
            ("missing.tif".to_string(), Err(ImageError::EmptyImage)),
        ];
        let lines = format_identify(&results, Some("%f\\n"));
        assert_eq!(
            lines,
            vec![
                "a.tif\n".to_string(),
                "exact-image: unable to open image 'missing.tif'.\n".to_string()
            ]
        );
    }

    #[test]
    fn identify_error_lines_end_without_format() {
        let results = vec![("gone.tif".to_string(), Err(ImageError::EmptyImage))];
        assert_eq!(
            format_identify(&results, None),
            vec!["exact-image: unable to open image 'gone.tif'.".to_string()]
        );
    }

    #[test]
    fn identify_json_includes_errors() {
        let results = vec![
            ("a.tif".to_string(), Ok(info("a.tif", 300))),
            ("b.tif".to_string(), Err(ImageError::EmptyImage)),
        ];
        let value: serde_json::Value =
            serde_json::from_str(&format_identify_json(&results)).unwrap();
        assert_eq!(value[0]["width"], 2480);
        assert_eq!(value[0]["colorspace"], "gray8");
        assert_eq!(value[1]["path"], "b.tif");
        assert!(value[1]["error"].is_string());
    }

    #[test]
    fn load_reads_codec_and_properties() {
        let (_tmp, path) = write_temp("fixture.tif", &tiff_fixture(32, 16, 200));
        let loaded = ImageInfo::load(&path).unwrap();
        assert_eq!(loaded.codec, "tiff");
        assert_eq!((loaded.width, loaded.height), (32, 16));
        assert_eq!((loaded.xres, loaded.yres), (200, 200));
        assert_eq!(loaded.colorspace, "rgb8");
    }

    #[test]
    fn empty_page_line() {
        let line = format_empty_page(
            "p.tif",
            &EmptyPageResult {
                empty: false,
                dark_pixels: 50,
                total_pixels: 1000,
            },
        );
        assert_eq!(line, "p.tif: not empty (50 dark pixels of 1000, 5.00%)");
    }

    #[test]
    fn empty_page_check_continues_past_unreadable_files() {
        let (tmp, page) = write_temp("page.tif", &tiff_fixture(16, 16, 300));
        let missing = tmp.path().join("missing.tif");
        let results: Vec<(String, Result<EmptyPageResult>)> = [&missing, &page]
            .iter()
            .map(|p| (p.display().to_string(), EmptyPageResult::check(p, 0.05, 0)))
            .collect();
        assert!(results[0].1.is_err());
        let checked = results[1].1.as_ref().unwrap();
        assert_eq!(checked.total_pixels, 256);

        let lines = format_empty_pages(&results);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format_unreadable(&missing.display().to_string()));
        assert!(lines[1].starts_with(&format!("{}: ", page.display())));
    }
}
