// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! The shared owner of pixel memory.
//!
//! A [`PixelStore`] is always handled through an `Arc`. Any number of bitmaps may refer to the
//! same store, each with their own offset, dimensions and lock count. The store itself only tracks
//! whether at least one of them holds a lock and keeps the materialized pixels alive while that is
//! the case.
//!
//! What the pixels are is decided by a [`StoreBackend`]. The [`MemoryBackend`] owns a plain
//! buffer in CPU memory. Other backends can wrap an external resource, such as a texture, that is
//! not addressable until it is read back.
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::bitmap::Bitmap;
use crate::buf::Buffer;
use crate::format::PixelFormat;
use crate::geom::IRect;
use crate::palette::Palette;

#[cfg(feature = "serialize")]
use crate::error::DecodeError;
#[cfg(feature = "serialize")]
use crate::serial::{ReadBuffer, WriteBuffer};

/// Pixel bytes that can be shared between stores, bitmaps and threads.
///
/// The length of the buffer never changes while it is shared.
pub type PixelMemory = Arc<RwLock<Buffer>>;

/// Source of unique generation ids, `0` is never handed out.
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_generation_id() -> u32 {
    loop {
        let id = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
    }
}

/// The pixels of a store while it is locked.
#[derive(Clone)]
pub struct LockedPixels {
    memory: PixelMemory,
    len: usize,
    palette: Option<Arc<Palette>>,
}

/// The pluggable part of a [`PixelStore`].
pub trait StoreBackend: Send + Sync {
    /// Materialize the pixels when the first lock is taken.
    ///
    /// Returning `None` means the pixels are not addressable, for example because they live in an
    /// external resource. Users of the store then fall back to [`StoreBackend::read_pixels`].
    fn on_lock(&self) -> Option<LockedPixels>;

    /// Called when the last lock is released.
    fn on_unlock(&self) {}

    /// If the pixels are an external resource instead of CPU memory.
    fn is_external(&self) -> bool {
        false
    }

    /// If writes to the locked pixels reach the content of the store.
    fn pixels_are_writable(&self) -> bool {
        true
    }

    /// Duplicate the pixels into an independent store of `format`, optionally only a region.
    fn deep_copy(&self, _format: PixelFormat, _subset: Option<&IRect>) -> Option<PixelStore> {
        None
    }

    /// Read the pixels, or a region of them, back into a new CPU bitmap.
    fn read_pixels(&self, _subset: Option<&IRect>) -> Option<Bitmap> {
        None
    }

    /// The name under which a factory for this backend is registered.
    ///
    /// A backend without a factory can not be serialized.
    fn factory(&self) -> Option<&'static str> {
        None
    }

    /// Write the content such that the registered factory can recreate it.
    ///
    /// Returns `false` if the content can not be encoded, the buffer is discarded in that case.
    #[cfg(feature = "serialize")]
    fn flatten(&self, _buffer: &mut WriteBuffer) -> bool {
        false
    }
}

/// Reference-counted owner of pixel memory or of an external resource.
pub struct PixelStore {
    backend: Box<dyn StoreBackend>,
    generation: AtomicU32,
    immutable: AtomicBool,
    lock: Mutex<StoreLock>,
}

#[derive(Default)]
struct StoreLock {
    count: usize,
    pixels: Option<LockedPixels>,
}

/// A store backend owning a buffer in CPU memory.
pub struct MemoryBackend {
    memory: PixelMemory,
    len: usize,
    palette: Option<Arc<Palette>>,
}

impl LockedPixels {
    pub fn new(memory: PixelMemory, palette: Option<Arc<Palette>>) -> Self {
        let len = memory.read().len();
        LockedPixels {
            memory,
            len,
            palette,
        }
    }

    pub fn memory(&self) -> &PixelMemory {
        &self.memory
    }

    pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.palette.as_ref()
    }

    /// The number of bytes of the memory.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PixelStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        PixelStore {
            backend: Box::new(backend),
            generation: AtomicU32::new(next_generation_id()),
            immutable: AtomicBool::new(false),
            lock: Mutex::new(StoreLock::default()),
        }
    }

    /// Take a lock, materializing the pixels if this is the first one.
    ///
    /// The count is increased even if the backend provides no pixels, every call must be balanced
    /// by [`PixelStore::unlock_pixels`].
    pub fn lock_pixels(&self) -> Option<LockedPixels> {
        let mut lock = self.lock.lock();
        lock.count += 1;

        if lock.count == 1 {
            lock.pixels = self.backend.on_lock();
            if lock.pixels.is_none() {
                tracing::trace!(external = self.is_external(), "Pixel store provided no pixels");
            }
        }

        lock.pixels.clone()
    }

    /// Release a lock, dropping the materialized pixels with the last one.
    pub fn unlock_pixels(&self) {
        let mut lock = self.lock.lock();
        match lock.count {
            0 => tracing::warn!("Unbalanced unlock of a pixel store"),
            1 => {
                lock.count = 0;
                lock.pixels = None;
                self.backend.on_unlock();
            }
            _ => lock.count -= 1,
        }
    }

    /// If at least one lock is outstanding.
    pub fn is_locked(&self) -> bool {
        self.lock.lock().count > 0
    }

    /// An id that changes whenever the content of the store changes.
    pub fn generation_id(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Mark a copy as having the same content as its source.
    pub(crate) fn set_generation_id(&self, id: u32) {
        self.generation.store(id, Ordering::Release);
    }

    /// Record that the pixels were modified.
    ///
    /// # Panics
    ///
    /// If the store is immutable.
    pub fn notify_pixels_changed(&self) {
        assert!(
            !self.is_immutable(),
            "Pixels of an immutable store must not change"
        );
        self.generation.store(next_generation_id(), Ordering::Release);
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::Acquire)
    }

    /// Mark the content as immutable. This can not be undone.
    pub fn set_immutable(&self) {
        self.immutable.store(true, Ordering::Release);
    }

    pub fn is_external(&self) -> bool {
        self.backend.is_external()
    }

    pub fn pixels_are_writable(&self) -> bool {
        self.backend.pixels_are_writable()
    }

    pub fn deep_copy(&self, format: PixelFormat, subset: Option<&IRect>) -> Option<PixelStore> {
        self.backend.deep_copy(format, subset)
    }

    pub fn read_pixels(&self, subset: Option<&IRect>) -> Option<Bitmap> {
        self.backend.read_pixels(subset)
    }

    pub fn factory(&self) -> Option<&'static str> {
        self.backend.factory()
    }

    #[cfg(feature = "serialize")]
    pub(crate) fn flatten(&self, buffer: &mut WriteBuffer) -> bool {
        self.backend.flatten(buffer)
    }
}

impl fmt::Debug for PixelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelStore")
            .field("generation", &self.generation_id())
            .field("immutable", &self.is_immutable())
            .field("external", &self.is_external())
            .field("factory", &self.factory())
            .finish()
    }
}

impl MemoryBackend {
    /// The name of the serialization factory.
    pub const FACTORY: &'static str = "memory";

    pub fn new(buffer: Buffer, palette: Option<Arc<Palette>>) -> Self {
        MemoryBackend {
            len: buffer.len(),
            memory: Arc::new(RwLock::new(buffer)),
            palette,
        }
    }

    /// Share memory that is already referenced elsewhere.
    pub fn with_memory(memory: PixelMemory, palette: Option<Arc<Palette>>) -> Self {
        let len = memory.read().len();
        MemoryBackend {
            memory,
            len,
            palette,
        }
    }

    pub fn memory(&self) -> &PixelMemory {
        &self.memory
    }

    /// Recreate a store written by [`StoreBackend::flatten`] of this backend.
    #[cfg(feature = "serialize")]
    pub fn unflatten(buffer: &mut ReadBuffer) -> Result<PixelStore, DecodeError> {
        let len = buffer.read_u32()?;
        let bytes = buffer.read_bytes(len as usize)?;
        let pixels = Buffer::from_bytes(&bytes).map_err(|_| DecodeError::InvalidLength(len.into()))?;

        let count = buffer.read_u32()?;
        let palette = match count {
            0 => None,
            1..=256 => {
                let colors = (0..count)
                    .map(|_| buffer.read_u32().map(crate::color::PremulColor))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(Arc::new(Palette::new(colors)))
            }
            _ => return Err(DecodeError::InvalidPalette(count)),
        };

        Ok(PixelStore::new(MemoryBackend::new(pixels, palette)))
    }
}

impl StoreBackend for MemoryBackend {
    fn on_lock(&self) -> Option<LockedPixels> {
        Some(LockedPixels {
            memory: self.memory.clone(),
            len: self.len,
            palette: self.palette.clone(),
        })
    }

    fn factory(&self) -> Option<&'static str> {
        Some(Self::FACTORY)
    }

    #[cfg(feature = "serialize")]
    fn flatten(&self, buffer: &mut WriteBuffer) -> bool {
        let memory = self.memory.read();
        let Ok(len) = u32::try_from(memory.len()) else {
            tracing::warn!(len = memory.len(), "Pixel memory too large to serialize");
            return false;
        };

        buffer.write_u32(len);
        buffer.write_bytes(memory.as_bytes());

        match &self.palette {
            None => buffer.write_u32(0),
            Some(palette) => {
                buffer.write_u32(palette.len() as u32);
                for color in palette.colors() {
                    buffer.write_u32(color.0);
                }
            }
        }

        true
    }
}
