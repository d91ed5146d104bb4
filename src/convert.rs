// Distributed under The MIT License (MIT)
//
// Copyright (c) 2020 The `image-rs` developers
//! Copying pixels into new stores, optionally changing their format.
use std::sync::Arc;

use crate::allocator::Allocator;
use crate::bitmap::{premul_at, Bitmap};
use crate::color::{
    dither_argb32_to_4444, dither_rgb32_to_565, dither_value, expand_565, get_a32, src_over,
    DITHER_MATRIX_3BIT_16, DITHER_MATRIX_4BIT_16,
};
use crate::error::BitmapError;
use crate::format::PixelFormat;
use crate::geom::IRect;
use crate::palette::Palette;
use crate::stride::{ByteRows, ByteRowsMut};

impl Bitmap {
    /// If [`Bitmap::copy_to`] supports the target format.
    pub fn can_copy_to(&self, format: PixelFormat) -> bool {
        self.format().can_convert_to(format)
    }

    /// Copy the pixels into a new store of `format`.
    ///
    /// The store is created by `allocator`, or the [`HeapAllocator`] by default. If the current
    /// store can read its pixels back, for example from an external resource, the read back
    /// bitmap is used as the source. It is returned directly if it already has the requested
    /// format and no allocator was requested.
    ///
    /// Copies in the same format are exact and, if the geometry matches, keep the generation id.
    /// A conversion from `Argb8888` to `Argb4444` is dithered. Other conversions composite the
    /// source onto a destination cleared to transparent.
    ///
    /// The result is locked once and inherits the opacity of the source.
    ///
    /// [`HeapAllocator`]: crate::HeapAllocator
    pub fn copy_to(
        &self,
        format: PixelFormat,
        allocator: Option<&dyn Allocator>,
    ) -> Result<Bitmap, BitmapError> {
        if !self.can_copy_to(format) {
            return Err(BitmapError::UnsupportedConversion {
                from: self.format(),
                to: format,
            });
        }

        let read_back;
        let source = match self.read_back() {
            Some(copy) if copy.format() == format && allocator.is_none() => {
                if self.format() == format {
                    if let Some(store) = copy.store() {
                        store.set_generation_id(self.generation_id());
                    }
                }

                return Ok(copy);
            }
            Some(copy) => {
                read_back = copy;
                &read_back
            }
            None => self,
        };

        let _lock = source.locked();
        let src_pixels = source.pixels().ok_or(BitmapError::NotReady)?;
        let src_opaque = source.is_opaque();

        let palette = match format {
            PixelFormat::Index8 => src_pixels.palette().cloned(),
            _ => None,
        };

        let mut dst = Bitmap::with_dimensions(format, source.width(), source.height(), 0)?;
        dst.alloc_pixels(allocator, palette)?;
        let dst_pixels = dst.pixels().ok_or(BitmapError::NotReady)?;

        {
            let read = src_pixels.read();
            let src = read.rows();
            let mut write = dst_pixels.write();
            let mut out = write.rows_mut();

            if format == source.format() {
                if out.layout().row_bytes == src.layout().row_bytes {
                    out.as_bytes_mut().copy_from_slice(src.as_bytes());
                    if let Some(store) = dst.store() {
                        store.set_generation_id(self.generation_id());
                    }
                } else {
                    for y in 0..src.layout().height {
                        out.row_mut(y).copy_from_slice(src.row(y));
                    }
                }
            } else if format == PixelFormat::Argb4444 && source.format() == PixelFormat::Argb8888 {
                dither_to_4444(&src, &mut out);
            } else {
                if !src_opaque {
                    out.fill(0);
                }

                let palette = src_pixels.palette().map(|palette| &**palette);
                composite(&src, palette, &mut out)?;
            }
        }

        dst.set_is_opaque(src_opaque);
        Ok(dst)
    }

    /// Duplicate the pixels into an independent store of `format`.
    ///
    /// Stores that can duplicate themselves, such as external resources, are asked for a copy of
    /// their complete content first. The copy keeps the offset of this bitmap, translated into the
    /// stride of the new format. Everything else is copied with [`Bitmap::copy_to`].
    pub fn deep_copy_to(&self, format: PixelFormat) -> Result<Bitmap, BitmapError> {
        if !self.can_copy_to(format) {
            return Err(BitmapError::UnsupportedConversion {
                from: self.format(),
                to: format,
            });
        }

        let Some(copy) = self.store().and_then(|store| store.deep_copy(format, None)) else {
            return self.copy_to(format, None);
        };

        let row_bytes = if format == self.format() {
            copy.set_generation_id(self.generation_id());
            self.row_bytes()
        } else {
            0
        };

        let mut dst = Bitmap::with_dimensions(format, self.width(), self.height(), row_bytes)?;
        let offset = if self.store_offset() == 0 || format == self.format() {
            self.store_offset()
        } else {
            let (x, y) = self
                .format()
                .upper_left_from_offset(self.store_offset(), self.row_bytes())
                .ok_or(BitmapError::UnsupportedFormat(self.format()))?;
            format
                .sub_offset(x, y, dst.row_bytes())
                .ok_or(BitmapError::UnsupportedFormat(format))?
        };

        dst.set_is_opaque(self.is_opaque());
        dst.attach_store(Some(Arc::new(copy)), offset);
        Ok(dst)
    }

    /// Ask the store to read back exactly the pixels of this descriptor.
    fn read_back(&self) -> Option<Bitmap> {
        let store = self.store()?;
        let (x, y) = self
            .format()
            .upper_left_from_offset(self.store_offset(), self.row_bytes())?;
        let x = i32::try_from(x).ok()?;
        let y = i32::try_from(y).ok()?;
        let width = i32::try_from(self.width()).ok()?;
        let height = i32::try_from(self.height()).ok()?;

        let subset = IRect::from_xywh(x, y, width, height);
        let copy = store.read_pixels(Some(&subset))?;
        tracing::trace!(left = subset.left, top = subset.top, "Read back pixels of the store");
        Some(copy)
    }
}

fn dither_to_4444(src: &ByteRows<'_>, dst: &mut ByteRowsMut<'_>) {
    for y in 0..src.layout().height {
        let scan = DITHER_MATRIX_4BIT_16[(y & 3) as usize];
        let row = dst.row_u16_mut(y);
        for (x, (out, &c)) in row.iter_mut().zip(src.row_u32(y)).enumerate() {
            *out = dither_argb32_to_4444(c, dither_value(scan, x as u32));
        }
    }
}

/// Draw each source pixel over the destination, dithering down to 16 bits.
fn composite(
    src: &ByteRows<'_>,
    palette: Option<&Palette>,
    dst: &mut ByteRowsMut<'_>,
) -> Result<(), BitmapError> {
    let layout = dst.layout();
    for y in 0..layout.height {
        match layout.format {
            PixelFormat::Alpha8 => {
                for (x, out) in (0..layout.width).zip(dst.row_mut(y)) {
                    let over = src_over(premul_at(src, palette, x, y), u32::from(*out) << 24);
                    *out = get_a32(over) as u8;
                }
            }
            PixelFormat::Rgb565 => {
                let scan = DITHER_MATRIX_3BIT_16[(y & 3) as usize];
                for (x, out) in (0..layout.width).zip(dst.row_u16_mut(y)) {
                    let over = src_over(premul_at(src, palette, x, y), expand_565(*out));
                    *out = dither_rgb32_to_565(over, dither_value(scan, x));
                }
            }
            PixelFormat::Argb8888 => {
                for (x, out) in (0..layout.width).zip(dst.row_u32_mut(y)) {
                    *out = src_over(premul_at(src, palette, x, y), *out);
                }
            }
            PixelFormat::None
            | PixelFormat::Alpha1
            | PixelFormat::Index8
            | PixelFormat::Argb4444 => {
                return Err(BitmapError::UnsupportedConversion {
                    from: src.layout().format,
                    to: layout.format,
                })
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::Buffer;
    use crate::color::{Color, PremulColor};

    fn allocated(format: PixelFormat, width: i32, height: i32, row_bytes: usize) -> Bitmap {
        let mut bitmap = Bitmap::with_config(format, width, height, row_bytes).unwrap();
        bitmap.alloc_pixels(None, None).unwrap();
        bitmap
    }

    #[test]
    fn rejects_unsupported_targets() {
        let bitmap = allocated(PixelFormat::Alpha1, 8, 1, 0);
        assert_eq!(
            bitmap.copy_to(PixelFormat::Argb8888, None).unwrap_err(),
            BitmapError::UnsupportedConversion {
                from: PixelFormat::Alpha1,
                to: PixelFormat::Argb8888,
            }
        );

        let bitmap = allocated(PixelFormat::Rgb565, 2, 2, 0);
        assert!(!bitmap.can_copy_to(PixelFormat::Argb4444));
        assert!(bitmap.deep_copy_to(PixelFormat::Index8).is_err());
    }

    #[test]
    fn requires_pixels() {
        let bitmap = Bitmap::with_config(PixelFormat::Argb8888, 2, 2, 0).unwrap();
        assert_eq!(
            bitmap.copy_to(PixelFormat::Argb8888, None).unwrap_err(),
            BitmapError::NotReady
        );
    }

    #[test]
    fn same_format_keeps_generation() {
        let bitmap = allocated(PixelFormat::Argb8888, 3, 2, 0);
        bitmap.erase_color(Color(0xFF10_2030));

        let copy = bitmap.copy_to(PixelFormat::Argb8888, None).unwrap();
        assert!(!Arc::ptr_eq(copy.store().unwrap(), bitmap.store().unwrap()));
        assert_eq!(copy.generation_id(), bitmap.generation_id());
        assert_eq!(copy.get_color(2, 1), Some(Color(0xFF10_2030)));
        assert_eq!(copy.lock_count(), 1);

        // The copy is independent of the source.
        bitmap.erase_color(Color::BLACK);
        assert_ne!(copy.generation_id(), bitmap.generation_id());
        assert_eq!(copy.get_color(0, 0), Some(Color(0xFF10_2030)));
    }

    #[test]
    fn padded_source_copies_rows() {
        let bitmap = allocated(PixelFormat::Rgb565, 3, 3, 16);
        bitmap.erase_color(Color(0xFFFF_0000));

        let copy = bitmap.copy_to(PixelFormat::Rgb565, None).unwrap();
        assert_eq!(copy.row_bytes(), 6);
        assert_ne!(copy.generation_id(), bitmap.generation_id());
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(copy.get_color(x, y), Some(Color(0xFFFF_0000)));
            }
        }
    }

    #[test]
    fn opaque_into_565() {
        let mut bitmap = allocated(PixelFormat::Argb8888, 4, 4, 0);
        bitmap.erase_color(Color(0xFFFF_0000));
        bitmap.set_is_opaque(true);

        let copy = bitmap.copy_to(PixelFormat::Rgb565, None).unwrap();
        assert!(copy.is_opaque());
        assert_eq!(copy.get_color(3, 3), Some(Color(0xFFFF_0000)));
    }

    #[test]
    fn translucent_into_alpha() {
        let bitmap = allocated(PixelFormat::Argb8888, 2, 2, 0);
        bitmap.erase_argb(0x80, 0xFF, 0, 0);

        let copy = bitmap.copy_to(PixelFormat::Alpha8, None).unwrap();
        assert!(!copy.is_opaque());
        assert_eq!(copy.get_color(1, 1), Some(Color(0x8000_0000)));
    }

    #[test]
    fn indexed_through_palette() {
        let palette = Palette::new(vec![PremulColor(0xFF00_00FF), PremulColor(0x8080_0000)]);
        let mut bitmap = Bitmap::with_config(PixelFormat::Index8, 2, 1, 0).unwrap();
        let pixels = Buffer::from_bytes(&[0, 1]).unwrap();
        bitmap.install_pixels(Some(pixels), Some(Arc::new(palette))).unwrap();

        let copy = bitmap.copy_to(PixelFormat::Argb8888, None).unwrap();
        assert!(!copy.is_opaque());
        assert_eq!(copy.get_color(0, 0), Some(Color(0xFF00_00FF)));
        assert_eq!(copy.get_color(1, 0), Some(Color(0x80FF_0000)));

        let same = bitmap.copy_to(PixelFormat::Index8, None).unwrap();
        assert!(Arc::ptr_eq(&same.palette().unwrap(), &bitmap.palette().unwrap()));
    }

    #[test]
    fn deep_copy_of_memory_falls_back() {
        let bitmap = allocated(PixelFormat::Argb4444, 2, 2, 0);
        bitmap.erase_color(Color::WHITE);

        let copy = bitmap.deep_copy_to(PixelFormat::Argb4444).unwrap();
        assert_eq!(copy.generation_id(), bitmap.generation_id());
        assert_eq!(copy.get_color(1, 0), Some(Color::WHITE));
    }
}
