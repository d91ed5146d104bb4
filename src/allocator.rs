//! Populating bitmaps with pixel stores.
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::buf::Buffer;
use crate::error::BitmapError;
use crate::format::PixelFormat;
use crate::palette::Palette;
use crate::store::{MemoryBackend, PixelStore};

/// Creates and attaches a pixel store that fits a configured bitmap.
///
/// On success the bitmap holds the new store and is locked once, so its pixels are ready. On
/// failure the bitmap must be left exactly as it was.
pub trait Allocator: Send + Sync {
    fn allocate(&self, bitmap: &mut Bitmap, palette: Option<Arc<Palette>>)
        -> Result<(), BitmapError>;
}

/// The default allocator, placing zeroed pixels in a private CPU buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate(
        &self,
        bitmap: &mut Bitmap,
        palette: Option<Arc<Palette>>,
    ) -> Result<(), BitmapError> {
        if bitmap.format() == PixelFormat::None {
            return Err(BitmapError::UnsupportedFormat(PixelFormat::None));
        }

        let bytes = bitmap.layout().byte_size();
        if bytes == 0 && bitmap.height() > 0 {
            return Err(BitmapError::Unrepresentable);
        }

        let buffer = Buffer::try_new(bytes).map_err(|err| {
            tracing::warn!(bytes, %err, "Failed to allocate bitmap pixels");
            BitmapError::AllocationFailed { bytes }
        })?;

        let store = PixelStore::new(MemoryBackend::new(buffer, palette));
        bitmap.attach_store(Some(Arc::new(store)), 0);
        bitmap.lock_pixels();
        Ok(())
    }
}
