// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! # Bitmap
//!
//! A value-type bitmap descriptor over shared, reference-counted pixel memory.
//!
//! A [`Bitmap`] is cheap to clone: it describes dimensions, row stride and a [`PixelFormat`] and
//! refers to a shared [`PixelStore`] which owns the bytes. Many descriptors may view the same
//! store, for example a sub-rectangle produced by [`Bitmap::extract_subset`], while each of them
//! keeps its own lock count. Pixels are only reachable while a descriptor is locked.
//!
//! On top of the descriptor the crate offers:
//!
//! - overflow-safe stride and size arithmetic, see [`compute_row_bytes`] and [`compute_size`],
//! - erasing, per-pixel reads and opacity scans for every format,
//! - conversion between formats with ordered dithering ([`Bitmap::copy_to`]),
//! - a cached chain of half-size images for minification ([`Bitmap::build_mip_chain`]),
//! - alpha mask extraction with an optional [`MaskFilter`].
//!
//! ## Usage
//!
//! ```
//! use image_bitmap::{Bitmap, Color, PixelFormat};
//!
//! let mut bitmap = Bitmap::with_config(PixelFormat::Argb8888, 4, 4, 0)?;
//! // Allocation leaves the fresh pixels locked.
//! bitmap.alloc_pixels(None, None)?;
//! bitmap.erase_color(Color::from_argb(0xFF, 0xFF, 0x00, 0x00));
//!
//! assert!(bitmap.compute_is_opaque());
//! assert_eq!(bitmap.get_color(1, 1), Some(Color::from_argb(0xFF, 0xFF, 0x00, 0x00)));
//!
//! // A subset shares the same pixel store.
//! let corner = bitmap.extract_subset(image_bitmap::IRect::from_xywh(2, 2, 2, 2))?;
//! assert_eq!(corner.generation_id(), bitmap.generation_id());
//! # Ok::<(), image_bitmap::BitmapError>(())
//! ```
#![deny(unsafe_code)]

mod allocator;
mod alpha;
mod bitmap;
mod buf;
mod color;
mod convert;
mod diagnostics;
mod downsample;
mod error;
mod format;
mod geom;
mod mip;
mod palette;
mod pixels;
#[cfg(feature = "serialize")]
mod serial;
mod store;
mod stride;

#[cfg(test)]
mod tests;

pub use self::allocator::{Allocator, HeapAllocator};
pub use self::alpha::{Mask, MaskFilter, Transform};
pub use self::bitmap::{Bitmap, BitmapFlags, PixelLockGuard};
pub use self::buf::Buffer;
pub use self::color::{Color, PremulColor};
pub use self::diagnostics::{DiagnosticSink, TracingSink};
pub use self::error::{BitmapError, DecodeError};
pub use self::format::PixelFormat;
pub use self::geom::{IPoint, IRect};
pub use self::mip::{compute_mip_level, Fixed, MipChain, MipLevel, MipLevelView, FIXED_ONE};
pub use self::palette::Palette;
pub use self::pixels::{Pixels, PixelsRead, PixelsWrite};
#[cfg(feature = "serialize")]
pub use self::serial::{ReadBuffer, StoreFactory, StoreRegistry, WriteBuffer};
pub use self::store::{LockedPixels, MemoryBackend, PixelMemory, PixelStore, StoreBackend};
pub use self::stride::{
    checked_row_bytes, checked_safe_size, checked_size, compute_row_bytes, compute_safe_size,
    compute_size, ByteRows, ByteRowsMut, RowLayout,
};

/// Packing, dithering and premultiplication helpers for the supported pixel encodings.
///
/// These are the exact routines used by erasing, conversion and mip building, exposed so that
/// callers can prepare or verify pixel values.
pub mod colors {
    pub use crate::color::{
        alpha_mul, dither_argb32_to_4444, dither_rgb32_to_565, dither_value, expand_565,
        expand_4444, get_a32, get_b32, get_g32, get_r32, mul_div_255_round, pack_565,
        pack_8888_to_4444, pack_argb32, pack_argb4444, DITHER_MATRIX_3BIT_16,
        DITHER_MATRIX_4BIT_16,
    };
}
