//! Image handle and the pieces behind it.
//!
//! | Concern | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` + format sniffing |
//! | **Resolution read** | `tiff` / `png` decoders, `kamadak-exif`, JFIF and BMP headers |
//! | **Encode JPEG/WebP/BMP/GIF/PNM** | `image` encoders |
//! | **Encode PNG** | `png` (pHYs, 1/2/4-bit gray) |
//! | **Encode TIFF** | `tiff` (resolution tags, compression) |
//! | **Scale / rotate / colour** | `image::imageops` + pure math |
//! | **Bi-level optimisation** | range stretch + separable unsharp mask |
//!
//! The module is split into:
//! - **Handle**: [`Image`], the opaque value callers hold
//! - **Calculations**: Pure functions for dimension and colour math (unit testable)
//! - **Parameters**: [`Quality`], [`Color`], [`Fill`], [`ScaleFilter`], [`Optimize2Bw`]
//! - **Codecs / density / colour spaces**: format plumbing
//! - **Operations**: Pixel transforms working on `DynamicImage`

pub mod calculations;
pub mod codecs;
pub mod colorspace;
pub mod density;
mod handle;
pub mod operations;
mod params;

pub use codecs::Codec;
pub use colorspace::{Colorspace, DEFAULT_THRESHOLD};
pub use density::Density;
pub use handle::Image;
pub use params::{Color, Fill, Optimize2Bw, Quality, ScaleFilter};
