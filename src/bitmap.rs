// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
use core::{fmt, mem};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::allocator::{Allocator, HeapAllocator};
use crate::buf::Buffer;
use crate::color::{
    alpha_mul, expand_4444, expand_565, pack_565, pack_argb32, pack_argb4444, Color, PremulColor,
};
use crate::diagnostics::DiagnosticSink;
use crate::error::BitmapError;
use crate::format::PixelFormat;
use crate::geom::IRect;
use crate::mip::MipChain;
use crate::palette::Palette;
use crate::pixels::Pixels;
use crate::store::{LockedPixels, MemoryBackend, PixelStore};
use crate::stride::{checked_row_bytes, ByteRows, RowLayout};

bitflags! {
    /// Properties of a bitmap that are not derived from its pixels.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BitmapFlags: u8 {
        /// All pixels are known to be fully opaque.
        const OPAQUE = 1 << 0;
        /// The pixels change frequently, caches derived from them are not worth keeping.
        const VOLATILE = 1 << 1;
        /// The pixels will not change. Only used while no store is attached.
        const IMMUTABLE = 1 << 2;
    }
}

/// A value-type descriptor of pixels in a shared [`PixelStore`].
///
/// The descriptor holds dimensions, row stride, format and flags and refers to a store at some
/// byte offset. Cloning shares the store, its palette and the mip chain but never the lock state:
/// a clone always starts unlocked and re-derives its pixels when locked itself.
///
/// Pixels are only reachable while the descriptor is locked, see [`Bitmap::lock_pixels`] and
/// [`Bitmap::pixels`]. Operations that read or write pixels, such as erasing or converting, take a
/// lock of their own for their duration.
///
/// The lock count and the pixels it produced are updated together under a mutex local to the
/// descriptor, so concurrent lock and unlock calls on one descriptor never observe a torn state.
/// Sharing one descriptor between threads is still discouraged, clones are cheap.
pub struct Bitmap {
    format: PixelFormat,
    width: u32,
    height: u32,
    row_bytes: usize,
    flags: BitmapFlags,
    store: Option<Arc<PixelStore>>,
    store_offset: usize,
    lock: Mutex<DescriptorLock>,
    pub(crate) mip_chain: Option<Arc<MipChain>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

#[derive(Default)]
struct DescriptorLock {
    count: u32,
    pixels: Option<LockedPixels>,
}

/// Holds a lock on a bitmap, releasing it when dropped.
#[must_use = "The lock is released when the guard is dropped"]
pub struct PixelLockGuard<'lt> {
    bitmap: &'lt Bitmap,
}

impl Bitmap {
    /// An empty descriptor, with no format, dimensions or pixels.
    pub fn new() -> Self {
        Bitmap {
            format: PixelFormat::None,
            width: 0,
            height: 0,
            row_bytes: 0,
            flags: BitmapFlags::empty(),
            store: None,
            store_offset: 0,
            lock: Mutex::new(DescriptorLock::default()),
            mip_chain: None,
            diagnostics: None,
        }
    }

    /// A descriptor configured with [`Bitmap::configure`], without pixels.
    pub fn with_config(
        format: PixelFormat,
        width: i32,
        height: i32,
        row_bytes: usize,
    ) -> Result<Self, BitmapError> {
        let mut bitmap = Bitmap::new();
        bitmap.configure(format, width, height, row_bytes)?;
        Ok(bitmap)
    }

    /// Configure from unsigned dimensions, such as those of another bitmap.
    pub(crate) fn with_dimensions(
        format: PixelFormat,
        width: u32,
        height: u32,
        row_bytes: usize,
    ) -> Result<Self, BitmapError> {
        let width = i32::try_from(width).map_err(|_| BitmapError::Unrepresentable)?;
        let height = i32::try_from(height).map_err(|_| BitmapError::Unrepresentable)?;
        Self::with_config(format, width, height, row_bytes)
    }

    /// Set the format and geometry, releasing any pixels.
    ///
    /// A `row_bytes` of `0` selects the tightest stride of the format. An explicit stride must
    /// cover a row, be a multiple of the pixel size and fit into an `i32`. Formats other than
    /// [`PixelFormat::None`] need a positive stride, so they can not be configured with a width of
    /// zero.
    ///
    /// On failure the descriptor is reset to the empty state. Flags are kept on success.
    pub fn configure(
        &mut self,
        format: PixelFormat,
        width: i32,
        height: i32,
        row_bytes: usize,
    ) -> Result<(), BitmapError> {
        self.free_pixels();

        match Self::validate_config(format, width, height, row_bytes) {
            Ok(layout) => {
                self.format = layout.format;
                self.width = layout.width;
                self.height = layout.height;
                self.row_bytes = layout.row_bytes;
                Ok(())
            }
            Err(err) => {
                tracing::debug!(%err, "Rejected bitmap configuration");
                self.reset();
                Err(err)
            }
        }
    }

    fn validate_config(
        format: PixelFormat,
        width: i32,
        height: i32,
        row_bytes: usize,
    ) -> Result<RowLayout, BitmapError> {
        if width < 0 || height < 0 {
            return Err(BitmapError::NegativeDimensions { width, height });
        }

        let tight = checked_row_bytes(format, width).ok_or(BitmapError::Unrepresentable)?;
        let row_bytes = if row_bytes == 0 { tight } else { row_bytes };

        let bad_stride = row_bytes < tight
            || row_bytes % format.alignment() != 0
            || i32::try_from(row_bytes).is_err()
            || (row_bytes == 0 && format != PixelFormat::None);

        if bad_stride {
            return Err(BitmapError::UnsupportedStride {
                format,
                width,
                row_bytes,
            });
        }

        let layout = RowLayout {
            format,
            width: width as u32,
            height: height as u32,
            row_bytes,
        };

        layout
            .checked_byte_size()
            .ok_or(BitmapError::Unrepresentable)?;
        Ok(layout)
    }

    /// Release the pixels and return to the empty configuration.
    ///
    /// The diagnostic sink stays attached.
    pub fn reset(&mut self) {
        self.free_pixels();
        self.format = PixelFormat::None;
        self.width = 0;
        self.height = 0;
        self.row_bytes = 0;
        self.flags = BitmapFlags::empty();
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    pub fn layout(&self) -> RowLayout {
        RowLayout {
            format: self.format,
            width: self.width,
            height: self.height,
            row_bytes: self.row_bytes,
        }
    }

    /// The number of bytes of all rows, including the padding of the last one.
    pub fn size(&self) -> usize {
        self.layout().byte_size()
    }

    /// The number of bytes from the first to the last pixel.
    pub fn safe_size(&self) -> usize {
        self.layout().safe_size()
    }

    /// The rectangle of all pixels.
    pub fn bounds(&self) -> IRect {
        // Configuration ensures the dimensions fit an `i32`.
        IRect::from_wh(self.width as i32, self.height as i32)
    }

    /// If there are no pixels to speak of, because a dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn flags(&self) -> BitmapFlags {
        self.flags
    }

    pub fn store(&self) -> Option<&Arc<PixelStore>> {
        self.store.as_ref()
    }

    /// If writes through locked pixels reach the store, `false` without a store.
    pub fn pixels_are_writable(&self) -> bool {
        self.store
            .as_ref()
            .is_some_and(|store| store.pixels_are_writable())
    }

    /// The byte offset of the first pixel within the store.
    pub fn store_offset(&self) -> usize {
        self.store_offset
    }

    pub fn set_diagnostic_sink(&mut self, sink: Option<Arc<dyn DiagnosticSink>>) {
        self.diagnostics = sink;
    }

    /// Share `store` starting at `offset`, releasing the previous store.
    ///
    /// Attaching the store and offset that are already attached does nothing. Attaching another
    /// store drops all locks held on the previous one. When only the offset changes the locks are
    /// kept and the pixels are re-derived from them. Without a store the offset is always zero.
    ///
    /// # Panics
    ///
    /// If the offset is not aligned to the pixels of the format.
    pub fn attach_store(&mut self, store: Option<Arc<PixelStore>>, offset: usize) {
        let offset = if store.is_some() { offset } else { 0 };
        assert!(
            offset % self.format.alignment() == 0,
            "Store offset {offset} is not aligned for format {}",
            self.format
        );

        let same_store = match (&self.store, &store) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };

        if same_store && self.store_offset == offset {
            return;
        }

        if !same_store {
            self.free_pixels();
            self.store = store;
        }

        self.store_offset = offset;
    }

    /// Drop the store and mip chain, releasing all locks held on the store.
    pub fn free_pixels(&mut self) {
        self.mip_chain = None;

        let lock = self.lock.get_mut();
        if let Some(store) = self.store.take() {
            if lock.count > 0 {
                store.unlock_pixels();
            }
        }

        lock.count = 0;
        lock.pixels = None;
        self.store_offset = 0;
    }

    /// Take a lock on the pixels.
    ///
    /// Only the first lock of this descriptor locks the store. Without a store this does nothing,
    /// in particular the lock count is not changed.
    pub fn lock_pixels(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let mut lock = self.lock.lock();
        lock.count += 1;
        if lock.count == 1 {
            lock.pixels = store.lock_pixels();
        }
    }

    /// Release a lock taken with [`Bitmap::lock_pixels`].
    ///
    /// Unlocking an unlocked descriptor does nothing.
    pub fn unlock_pixels(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let mut lock = self.lock.lock();
        match lock.count {
            0 => {}
            1 => {
                lock.count = 0;
                lock.pixels = None;
                store.unlock_pixels();
            }
            _ => lock.count -= 1,
        }
    }

    /// Lock the pixels for the lifetime of the returned guard.
    pub fn locked(&self) -> PixelLockGuard<'_> {
        self.lock_pixels();
        PixelLockGuard { bitmap: self }
    }

    /// The number of locks held by this descriptor.
    pub fn lock_count(&self) -> u32 {
        self.lock.lock().count
    }

    /// If the descriptor is locked and its pixels are addressable.
    pub fn ready_to_draw(&self) -> bool {
        self.pixels().is_some()
    }

    /// The pixels of a locked descriptor.
    ///
    /// Returns `None` while unlocked, if the store has no addressable pixels, or if the rows of
    /// this descriptor do not lie within the memory of the store.
    pub fn pixels(&self) -> Option<Pixels> {
        if self.format == PixelFormat::None {
            return None;
        }

        let lock = self.lock.lock();
        let locked = lock.pixels.as_ref()?;
        Pixels::new(locked, self.layout(), self.store_offset)
    }

    /// The palette of a locked descriptor.
    pub fn palette(&self) -> Option<Arc<Palette>> {
        let lock = self.lock.lock();
        lock.pixels.as_ref()?.palette().cloned()
    }

    /// The byte offset of pixel `(x, y)` relative to the first pixel.
    ///
    /// For [`PixelFormat::Alpha1`] this is the byte containing the pixel's bit.
    pub fn addr(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }

        match self.format {
            PixelFormat::Alpha1 => (y as usize)
                .checked_mul(self.row_bytes)?
                .checked_add((x >> 3) as usize),
            format => format.sub_offset(x, y, self.row_bytes),
        }
    }

    /// Read a pixel as a straight color.
    ///
    /// Coverage formats read as black with the coverage as alpha. Returns `None` if the pixels are
    /// not ready.
    ///
    /// # Panics
    ///
    /// If the coordinates are out of bounds.
    pub fn get_color(&self, x: u32, y: u32) -> Option<Color> {
        assert!(
            x < self.width && y < self.height,
            "Pixel ({x}, {y}) out of bounds of {}x{}",
            self.width,
            self.height
        );

        let pixels = self.pixels()?;
        let read = pixels.read();
        let color = premul_at(&read.rows(), pixels.palette().map(|p| &**p), x, y);
        Some(PremulColor(color).unpremultiply())
    }

    /// Fill all pixels with a straight color given as channels.
    pub fn erase_argb(&self, a: u8, r: u8, g: u8, b: u8) {
        self.erase_internal(self.bounds(), a, r, g, b);
    }

    /// Fill all pixels with a straight color.
    pub fn erase_color(&self, color: Color) {
        self.erase_argb(color.alpha(), color.red(), color.green(), color.blue());
    }

    /// Fill the pixels of an area with a straight color.
    ///
    /// The area is clipped to the bounds, an empty intersection does nothing.
    pub fn erase_area(&self, area: IRect, color: Color) {
        if let Some(area) = area.intersect(&self.bounds()) {
            self.erase_internal(area, color.alpha(), color.red(), color.green(), color.blue());
        }
    }

    fn erase_internal(&self, area: IRect, a: u8, r: u8, g: u8, b: u8) {
        if matches!(self.format, PixelFormat::None | PixelFormat::Index8) {
            return;
        }

        let _lock = self.locked();
        let Some(pixels) = self.pixels() else {
            return;
        };

        let (a, mut r, mut g, mut b) = (u32::from(a), u32::from(r), u32::from(g), u32::from(b));
        if a != 0xFF {
            r = alpha_mul(r, a);
            g = alpha_mul(g, a);
            b = alpha_mul(b, a);
        }

        // The area is within bounds, which fit an `i32`.
        let (left, right) = (area.left as usize, area.right as usize);
        let (top, bottom) = (area.top as u32, area.bottom as u32);

        {
            let mut write = pixels.write();
            let mut rows = write.rows_mut();
            for y in top..bottom {
                match self.format {
                    PixelFormat::None | PixelFormat::Index8 => {}
                    PixelFormat::Alpha1 => erase_bits(rows.row_mut(y), left, right, a as u8),
                    PixelFormat::Alpha8 => rows.row_mut(y)[left..right].fill(a as u8),
                    PixelFormat::Rgb565 => {
                        rows.row_u16_mut(y)[left..right].fill(pack_565(r, g, b));
                    }
                    PixelFormat::Argb4444 => {
                        let value = pack_argb4444(a >> 4, r >> 4, g >> 4, b >> 4);
                        rows.row_u16_mut(y)[left..right].fill(value);
                    }
                    PixelFormat::Argb8888 => {
                        rows.row_u32_mut(y)[left..right].fill(pack_argb32(a, r, g, b));
                    }
                }
            }
        }

        self.notify_pixels_changed();
    }

    /// If all pixels are known to be opaque.
    ///
    /// Formats without alpha are always opaque, indexed bitmaps ask their palette, which requires
    /// a short lock. All others report their opaque flag.
    pub fn is_opaque(&self) -> bool {
        match self.format {
            PixelFormat::None | PixelFormat::Rgb565 => true,
            PixelFormat::Alpha1
            | PixelFormat::Alpha8
            | PixelFormat::Argb4444
            | PixelFormat::Argb8888 => self.flags.contains(BitmapFlags::OPAQUE),
            PixelFormat::Index8 => {
                let _lock = self.locked();
                self.palette().is_some_and(|palette| palette.all_opaque())
            }
        }
    }

    pub fn set_is_opaque(&mut self, opaque: bool) {
        self.flags.set(BitmapFlags::OPAQUE, opaque);
    }

    pub fn is_volatile(&self) -> bool {
        self.flags.contains(BitmapFlags::VOLATILE)
    }

    pub fn set_is_volatile(&mut self, volatile: bool) {
        self.flags.set(BitmapFlags::VOLATILE, volatile);
    }

    /// If the pixels are immutable, as decided by the store if one is attached.
    pub fn is_immutable(&self) -> bool {
        match &self.store {
            Some(store) => store.is_immutable(),
            None => self.flags.contains(BitmapFlags::IMMUTABLE),
        }
    }

    /// Mark the pixels immutable. With a store this affects every bitmap sharing it.
    pub fn set_immutable(&mut self) {
        match &self.store {
            Some(store) => store.set_immutable(),
            None => self.flags.insert(BitmapFlags::IMMUTABLE),
        }
    }

    /// The content version of the store, `0` without a store.
    pub fn generation_id(&self) -> u32 {
        self.store.as_ref().map_or(0, |store| store.generation_id())
    }

    /// Record a modification of the pixels.
    ///
    /// # Panics
    ///
    /// If the store is immutable.
    pub fn notify_pixels_changed(&self) {
        if let Some(store) = &self.store {
            store.notify_pixels_changed();
        }
    }

    /// Scan the pixels and decide if all of them are fully opaque.
    ///
    /// Returns `false` if the pixels can not be read. Indexed bitmaps scan their palette instead of
    /// their pixels.
    pub fn compute_is_opaque(&self) -> bool {
        let _lock = self.locked();
        let Some(pixels) = self.pixels() else {
            return false;
        };

        let read = pixels.read();
        let rows = read.rows();
        let height = self.height;

        match self.format {
            PixelFormat::None => false,
            PixelFormat::Rgb565 => true,
            PixelFormat::Alpha1 => {
                let full = (self.width / 8) as usize;
                let rest = self.width % 8;
                let mask = !(0xFFu8 >> rest);
                rows.rows().all(|row| {
                    row[..full].iter().all(|&bits| bits == 0xFF)
                        && (rest == 0 || row[full] & mask == mask)
                })
            }
            PixelFormat::Alpha8 => rows.rows().all(|row| row.iter().all(|&a| a == 0xFF)),
            PixelFormat::Index8 => pixels.palette().is_some_and(|palette| {
                let all = palette.colors().iter().fold(!0u32, |acc, c| acc & c.0);
                all >> 24 == 0xFF
            }),
            PixelFormat::Argb4444 => {
                (0..height).all(|y| rows.row_u16(y).iter().all(|&c| c >> 12 == 0xF))
            }
            PixelFormat::Argb8888 => {
                (0..height).all(|y| rows.row_u32(y).iter().all(|&c| c >> 24 == 0xFF))
            }
        }
    }

    /// A descriptor of the pixels within `subset`, clipped to the bounds.
    ///
    /// The result shares the store at the offset of the clipped area, with the same stride. Stores
    /// wrapping an external resource are asked for a copy of the area first. Opacity is not
    /// inherited by indexed bitmaps and is computed from the palette instead.
    pub fn extract_subset(&self, subset: IRect) -> Result<Bitmap, BitmapError> {
        let store = self.store.as_ref().ok_or(BitmapError::NoPixelStore)?;
        let area = subset
            .intersect(&self.bounds())
            .ok_or(BitmapError::EmptySubset)?;

        if store.is_external() {
            if let Some(copy) = store.deep_copy(self.format, Some(&area)) {
                let mut dst = Bitmap::with_config(self.format, area.width(), area.height(), 0)?;
                dst.set_is_volatile(self.is_volatile());
                dst.set_is_opaque(self.is_opaque());
                dst.attach_store(Some(Arc::new(copy)), 0);
                return Ok(dst);
            }

            tracing::debug!("External store did not copy the subset, sharing it instead");
        }

        // The area is within bounds, so its corner is not negative.
        let offset = self
            .format
            .sub_offset(area.left as u32, area.top as u32, self.row_bytes)
            .ok_or(BitmapError::UnsupportedFormat(self.format))?;
        let offset = self
            .store_offset
            .checked_add(offset)
            .ok_or(BitmapError::Unrepresentable)?;

        let mut dst =
            Bitmap::with_config(self.format, area.width(), area.height(), self.row_bytes)?;
        dst.set_is_volatile(self.is_volatile());
        if self.format != PixelFormat::Index8 {
            dst.set_is_opaque(self.is_opaque());
        }

        dst.attach_store(Some(store.clone()), offset);
        Ok(dst)
    }

    /// Copy all pixels into `dst`.
    ///
    /// With the own stride and no need to preserve the padding of `dst` the copy is a single block
    /// of [`Bitmap::safe_size`] bytes, including the padding between rows. Otherwise each row is
    /// copied separately and only the bytes of its pixels are written. A `dst_row_bytes` of `None`
    /// selects the stride of this bitmap.
    pub fn copy_pixels_to(
        &self,
        dst: &mut [u8],
        dst_row_bytes: Option<usize>,
        preserve_dst_pad: bool,
    ) -> Result<(), BitmapError> {
        let dst_row_bytes = dst_row_bytes.unwrap_or(self.row_bytes);
        let layout = RowLayout {
            row_bytes: dst_row_bytes,
            ..self.layout()
        };

        if dst_row_bytes < layout.tight_row_bytes() {
            return Err(BitmapError::UnsupportedStride {
                format: self.format,
                width: self.width as i32,
                row_bytes: dst_row_bytes,
            });
        }

        if self.store.is_none() {
            return Err(BitmapError::NoPixelStore);
        }

        let needed = layout
            .checked_safe_size()
            .ok_or(BitmapError::Unrepresentable)?;
        if needed > dst.len() {
            return Err(BitmapError::BufferTooSmall {
                needed,
                available: dst.len(),
            });
        }

        let _lock = self.locked();
        let pixels = self.pixels().ok_or(BitmapError::NotReady)?;
        let read = pixels.read();
        let rows = read.rows();

        if !preserve_dst_pad && dst_row_bytes == self.row_bytes {
            dst[..needed].copy_from_slice(rows.as_bytes());
        } else {
            for y in 0..self.height {
                dst[layout.row_range(y)].copy_from_slice(rows.row(y));
            }
        }

        Ok(())
    }

    /// Take ownership of `pixels` as the store of this bitmap and lock it.
    ///
    /// Passing `None` releases the current store instead.
    pub fn install_pixels(
        &mut self,
        pixels: Option<Buffer>,
        palette: Option<Arc<Palette>>,
    ) -> Result<(), BitmapError> {
        let Some(buffer) = pixels else {
            self.attach_store(None, 0);
            return Ok(());
        };

        let needed = self.safe_size();
        if buffer.len() < needed {
            return Err(BitmapError::BufferTooSmall {
                needed,
                available: buffer.len(),
            });
        }

        let store = PixelStore::new(MemoryBackend::new(buffer, palette));
        self.attach_store(Some(Arc::new(store)), 0);
        self.lock_pixels();
        Ok(())
    }

    /// Allocate a store for the configured geometry, with the [`HeapAllocator`] by default.
    ///
    /// The result is locked once. Indexed bitmaps without a palette receive one of 256
    /// transparent entries.
    pub fn alloc_pixels(
        &mut self,
        allocator: Option<&dyn Allocator>,
        palette: Option<Arc<Palette>>,
    ) -> Result<(), BitmapError> {
        let palette = match (self.format, palette) {
            (PixelFormat::Index8, None) => Some(Arc::new(Palette::transparent(Palette::MAX_LEN))),
            (_, palette) => palette,
        };

        allocator
            .unwrap_or(&HeapAllocator)
            .allocate(self, palette)
    }

    /// Exchange all state, including locks, with another descriptor.
    pub fn swap(&mut self, other: &mut Bitmap) {
        mem::swap(self, other);
    }

    /// Check the invariants of the descriptor in debug builds.
    pub fn validate(&self) {
        debug_assert!(self.row_bytes >= self.layout().tight_row_bytes());
        debug_assert!(self.store.is_some() || self.store_offset == 0);
        debug_assert!(self.store_offset % self.format.alignment() == 0);

        let lock = self.lock.lock();
        debug_assert!(lock.count > 0 || lock.pixels.is_none());
        debug_assert!(self.store.is_some() || lock.count == 0);
    }
}

/// Read the pixel at `(x, y)` as a premultiplied packed color.
pub(crate) fn premul_at(rows: &ByteRows<'_>, palette: Option<&Palette>, x: u32, y: u32) -> u32 {
    let x_idx = x as usize;
    match rows.layout().format {
        PixelFormat::None => 0,
        PixelFormat::Alpha1 => {
            let bits = rows.row(y)[x_idx >> 3];
            if bits & (0x80 >> (x & 7)) != 0 {
                0xFF00_0000
            } else {
                0
            }
        }
        PixelFormat::Alpha8 => u32::from(rows.row(y)[x_idx]) << 24,
        PixelFormat::Index8 => {
            let index = rows.row(y)[x_idx];
            palette.map_or(0, |palette| palette.get(index).0)
        }
        PixelFormat::Rgb565 => expand_565(rows.row_u16(y)[x_idx]),
        PixelFormat::Argb4444 => expand_4444(rows.row_u16(y)[x_idx]),
        PixelFormat::Argb8888 => rows.row_u32(y)[x_idx],
    }
}

/// Set the bits of `[left, right)` in a row of one bit pixels to the top bit of `alpha`.
fn erase_bits(row: &mut [u8], left: usize, right: usize, alpha: u8) {
    let fill = if alpha >> 7 != 0 { 0xFF } else { 0 };
    let (first, last) = (left >> 3, right >> 3);

    let mut left_mask = 0xFFu8 >> (left & 7);
    let mut right_mask = !(0xFFu8 >> (right & 7));
    if last == first {
        left_mask &= right_mask;
        right_mask = 0;
    }

    row[first] = (row[first] & !left_mask) | (fill & left_mask);
    if last > first + 1 {
        row[first + 1..last].fill(fill);
    }

    if right_mask != 0 {
        row[last] = (row[last] & !right_mask) | (fill & right_mask);
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Bitmap::new()
    }
}

impl Clone for Bitmap {
    fn clone(&self) -> Self {
        Bitmap {
            format: self.format,
            width: self.width,
            height: self.height,
            row_bytes: self.row_bytes,
            flags: self.flags,
            store: self.store.clone(),
            store_offset: self.store_offset,
            lock: Mutex::new(DescriptorLock::default()),
            mip_chain: self.mip_chain.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        if self.store.is_some() {
            if let Some(sink) = self.diagnostics.clone() {
                sink.bitmap_released(self);
            }
        }

        self.free_pixels();
    }
}

impl Drop for PixelLockGuard<'_> {
    fn drop(&mut self) {
        self.bitmap.unlock_pixels();
    }
}

impl fmt::Display for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bitmap: (({}, {}) {} ({}, {})",
            self.width,
            self.height,
            self.format,
            if self.is_opaque() { "opaque" } else { "transparent" },
            if self.is_immutable() { "immutable" } else { "not-immutable" },
        )?;

        match &self.store {
            Some(store) => write!(
                f,
                " store: generation {} offset {})",
                store.generation_id(),
                self.store_offset
            ),
            None => f.write_str(" no store)"),
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_bytes", &self.row_bytes)
            .field("flags", &self.flags)
            .field("store", &self.store)
            .field("store_offset", &self.store_offset)
            .field("lock_count", &self.lock_count())
            .field("mip_levels", &self.mip_chain.as_ref().map(|chain| chain.len()))
            .finish()
    }
}
