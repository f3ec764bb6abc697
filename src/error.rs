//! Error types for the unwarp core
//!
//! Only caller-input problems are errors. Sampling outside the source image is
//! not an error: it produces the fill value.

use thiserror::Error;

/// Errors reported at the boundary of the map builder and resampler
#[derive(Debug, Error)]
pub enum UnwarpError {
    /// Destination width is zero or the derived height is below one row
    #[error("invalid panorama dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Radii must satisfy 0 <= inner < outer
    #[error("invalid radii: inner {inner}, outer {outer} (need 0 <= inner < outer)")]
    InvalidRadii { inner: f64, outer: f64 },

    /// Source raster has no pixels
    #[error("empty source raster {width}x{height} with {channels} channel(s)")]
    EmptySource {
        width: u32,
        height: u32,
        channels: usize,
    },

    /// Pixel buffer length does not match width * height * channels
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// Channel count with no matching image buffer type
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, UnwarpError>;
