//! Access to the pixels of a locked bitmap.
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buf::Buffer;
use crate::palette::Palette;
use crate::store::{LockedPixels, PixelMemory};
use crate::stride::{ByteRows, ByteRowsMut, RowLayout};

/// The validated pixels of a locked bitmap.
///
/// This is a handle on the shared memory of the store together with the geometry of the bitmap
/// that produced it. On construction it is checked that the rows of the bitmap, starting at its
/// offset, lie within the memory and are aligned for the format. Taking a guard is then
/// infallible.
///
/// The handle keeps the memory alive but not the lock of the bitmap. Content written through a
/// handle after the bitmap was unlocked is still visible to other users of the store.
#[derive(Clone)]
pub struct Pixels {
    memory: PixelMemory,
    palette: Option<Arc<Palette>>,
    layout: RowLayout,
    offset: usize,
}

/// Shared access to pixel rows, blocking writers for its lifetime.
pub struct PixelsRead<'lt> {
    guard: RwLockReadGuard<'lt, Buffer>,
    layout: RowLayout,
    offset: usize,
}

/// Exclusive access to pixel rows.
pub struct PixelsWrite<'lt> {
    guard: RwLockWriteGuard<'lt, Buffer>,
    layout: RowLayout,
    offset: usize,
}

impl Pixels {
    pub(crate) fn new(locked: &LockedPixels, layout: RowLayout, offset: usize) -> Option<Self> {
        let end = offset.checked_add(layout.checked_safe_size()?)?;
        if end > locked.len() {
            tracing::warn!(
                offset,
                end,
                len = locked.len(),
                "Bitmap rows exceed the memory of their store"
            );
            return None;
        }

        let align = layout.format.alignment();
        if offset % align != 0 || layout.row_bytes % align != 0 {
            tracing::warn!(offset, row_bytes = layout.row_bytes, "Misaligned bitmap rows");
            return None;
        }

        Some(Pixels {
            memory: locked.memory().clone(),
            palette: locked.palette().cloned(),
            layout,
            offset,
        })
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    /// The byte offset of the first pixel within the memory.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.palette.as_ref()
    }

    pub fn memory(&self) -> &PixelMemory {
        &self.memory
    }

    /// If both handles refer to the same memory.
    pub fn shares_memory(&self, other: &Pixels) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }

    /// Read the rows.
    ///
    /// Blocks while the memory is written by any bitmap sharing it.
    pub fn read(&self) -> PixelsRead<'_> {
        PixelsRead {
            guard: self.memory.read(),
            layout: self.layout,
            offset: self.offset,
        }
    }

    /// Write the rows.
    ///
    /// Blocks while the memory is read or written by any bitmap sharing it. Writers are expected
    /// to notify the store of the change, see [`Bitmap::notify_pixels_changed`].
    ///
    /// [`Bitmap::notify_pixels_changed`]: crate::Bitmap::notify_pixels_changed
    pub fn write(&self) -> PixelsWrite<'_> {
        PixelsWrite {
            guard: self.memory.write(),
            layout: self.layout,
            offset: self.offset,
        }
    }
}

impl PixelsRead<'_> {
    pub fn rows(&self) -> ByteRows<'_> {
        ByteRows::validated(self.layout, &self.guard.as_bytes()[self.offset..])
    }
}

impl PixelsWrite<'_> {
    pub fn rows(&self) -> ByteRows<'_> {
        ByteRows::validated(self.layout, &self.guard.as_bytes()[self.offset..])
    }

    pub fn rows_mut(&mut self) -> ByteRowsMut<'_> {
        let offset = self.offset;
        ByteRowsMut::validated(self.layout, &mut self.guard.as_bytes_mut()[offset..])
    }
}
