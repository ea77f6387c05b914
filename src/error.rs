//! Error type shared by every image-handle operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {codec}: {message}")]
    Encode { codec: &'static str, message: String },
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("Unsupported colorspace: {0}")]
    UnsupportedColorspace(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Image has no pixel data")]
    EmptyImage,
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;
