//! # exact-image
//!
//! Raster image handling around one owned value: an [`Image`](imaging::Image)
//! holding decoded pixels, colour space and resolution. Files are decoded
//! into it, inspected and edited through methods, and encoded back out.
//!
//! ```no_run
//! use exact_image::imaging::{Image, Quality};
//!
//! let mut image = Image::new();
//! image.decode_file("testsuite/tif/4.2.04.tif")?;
//! image.encode_file("test.jpg", Quality::new(80), "")?;
//!
//! let data = std::fs::read("testsuite/tif/5.1.13.tif")?;
//! image.decode(&data)?;
//! println!("{}x{} @ {}x{} dpi", image.width(), image.height(), image.xres(), image.yres());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The image handle, codecs, resolution parsing, colour spaces and pixel operations |
//! | [`convert`] | Fixed-order edit pipeline behind the `convert` command |
//! | [`config`] | `exact-image.toml` loading, validation and merging over stock defaults |
//! | [`output`] | CLI output formatting: identify lines, format strings, JSON, empty-page lines |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//!
//! # Design Decisions
//!
//! ## Results, Not Status Flags
//!
//! Decoding and encoding return `Result<_, ImageError>`. A failed decode
//! leaves the handle exactly as it was, so a caller can retry with other
//! input without rebuilding state.
//!
//! ## Resolution Is Metadata
//!
//! X/Y resolution lives next to the pixels and is never inferred from
//! them. `set_xres` / `set_yres` only change what gets written on the
//! next encode. Scaling and quarter-turn rotation keep the physical size
//! stable by adjusting the stored values.
//!
//! ## Pure-Rust Codecs
//!
//! Pixel decoding uses the `image` crate. PNG and TIFF are written with the
//! `png` and `tiff` crates directly so resolution tags and packed 1/2/4-bit
//! gray survive; resolution is read back with a small header parser since
//! the `image` decoders do not expose it.

pub mod config;
pub mod convert;
pub mod error;
pub mod imaging;
pub mod logging;
pub mod output;

pub use error::{ImageError, Result};

#[cfg(test)]
pub(crate) mod test_helpers;
