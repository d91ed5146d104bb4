//! The recoverable failures of bitmap operations.
use crate::format::PixelFormat;
use thiserror::Error;

/// A recoverable failure of a bitmap operation.
///
/// No operation returning this error leaves a partially modified bitmap behind. Configuration
/// errors reset the descriptor to the empty state, all others leave their target untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BitmapError {
    #[error("Bitmap dimensions {width}x{height} must not be negative")]
    NegativeDimensions { width: i32, height: i32 },
    /// The byte size of the bitmap does not fit into the address space.
    #[error("The pixels of the bitmap are not representable in memory")]
    Unrepresentable,
    #[error("Row stride of {row_bytes} bytes is not supported for {width} pixels of format {format}")]
    UnsupportedStride {
        format: PixelFormat,
        width: i32,
        row_bytes: usize,
    },
    #[error("Can not convert pixels of format {from} into {to}")]
    UnsupportedConversion { from: PixelFormat, to: PixelFormat },
    /// The operation needs addressable pixels which the format does not provide.
    #[error("Operation not supported for pixels of format {0}")]
    UnsupportedFormat(PixelFormat),
    #[error("The requested area does not intersect the bitmap")]
    EmptySubset,
    #[error("The bitmap has no pixel store")]
    NoPixelStore,
    /// The store did not provide pixel memory when locked, or the memory is too small.
    #[error("The pixels of the bitmap are not ready to be accessed")]
    NotReady,
    #[error("Failed to allocate {bytes} bytes of pixel memory")]
    AllocationFailed { bytes: usize },
    #[error("Buffer of {available} bytes is too small, {needed} bytes are required")]
    BufferTooSmall { needed: usize, available: usize },
    #[cfg(feature = "serialize")]
    #[error("Invalid serialized bitmap: {0}")]
    Decode(#[from] DecodeError),
}

/// A malformed serialized bitmap or pixel store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of data, {needed} more bytes required")]
    UnexpectedEnd { needed: usize },
    #[error("Unknown pixel data tag {0}")]
    UnknownPixelTag(u32),
    #[error("Unknown pixel format {0}")]
    UnknownFormat(i32),
    #[error("No pixel store factory registered under the name {0:?}")]
    UnknownFactory(String),
    #[error("Palette with {0} colors exceeds 256 entries")]
    InvalidPalette(u32),
    #[error("Invalid length {0}")]
    InvalidLength(u64),
    #[error("Store offset {offset} is not aligned to pixels of format {format}")]
    MisalignedOffset { offset: u32, format: PixelFormat },
    #[error("Factory name is not valid UTF-8")]
    InvalidUtf8,
}
