#![cfg(feature = "serialize")]
use std::sync::Arc;

use image_bitmap::{
    Bitmap, BitmapError, Buffer, Color, DecodeError, IRect, LockedPixels, Palette, PixelFormat,
    PixelStore, PremulColor, ReadBuffer, StoreBackend, StoreRegistry, WriteBuffer,
};

fn round_trip(bitmap: &Bitmap, registry: &StoreRegistry) -> Result<Bitmap, BitmapError> {
    let mut buffer = WriteBuffer::new();
    bitmap.flatten(&mut buffer);

    let mut read = ReadBuffer::new(buffer.freeze());
    let mut copy = Bitmap::new();
    copy.unflatten(&mut read, registry)?;
    assert_eq!(read.remaining(), 0);
    Ok(copy)
}

fn header(buffer: &mut WriteBuffer, format: PixelFormat, width: i32, height: i32, row_bytes: i32) {
    buffer.write_i32(width);
    buffer.write_i32(height);
    buffer.write_i32(row_bytes);
    buffer.write_i32(format as i32);
    buffer.write_bool(false);
}

#[test]
fn memory_store_with_offset() -> Result<(), BitmapError> {
    let mut bitmap = Bitmap::with_config(PixelFormat::Argb8888, 4, 3, 0)?;
    bitmap.alloc_pixels(None, None)?;
    bitmap.erase_area(IRect::from_xywh(1, 1, 2, 2), Color::from_argb(0x80, 0xFF, 0, 0));

    let subset = bitmap.extract_subset(IRect::from_xywh(1, 1, 3, 2))?;
    let copy = round_trip(&subset, &StoreRegistry::default())?;

    assert_eq!(copy.layout(), subset.layout());
    assert_eq!(copy.store_offset(), subset.store_offset());
    assert_eq!(copy.is_opaque(), subset.is_opaque());
    assert_eq!(copy.lock_count(), 0);

    let _lock = copy.locked();
    let _source = subset.locked();
    for y in 0..2 {
        for x in 0..3 {
            assert_eq!(copy.get_color(x, y), subset.get_color(x, y), "at {x}, {y}");
        }
    }

    Ok(())
}

#[test]
fn indexed_with_palette() -> Result<(), BitmapError> {
    let colors = vec![PremulColor(0xFF00_FF00), PremulColor(0x4040_0000)];
    let mut bitmap = Bitmap::with_config(PixelFormat::Index8, 2, 2, 4)?;
    let pixels = Buffer::from_bytes(&[1, 0, 0, 0, 0, 1]).expect("Small buffer");
    bitmap.install_pixels(Some(pixels), Some(Arc::new(Palette::new(colors))))?;

    let copy = round_trip(&bitmap, &StoreRegistry::with_defaults())?;
    assert_eq!(copy.row_bytes(), 4);
    assert!(!copy.is_opaque());

    let _lock = copy.locked();
    assert_eq!(copy.palette().map(|p| p.len()), Some(2));
    assert_eq!(copy.get_color(0, 0), Some(Color(0x40FF_0000)));
    assert_eq!(copy.get_color(1, 1), Some(Color(0x40FF_0000)));
    assert_eq!(copy.get_color(1, 0), Some(Color(0xFF00_FF00)));
    Ok(())
}

struct Anonymous;

impl StoreBackend for Anonymous {
    fn on_lock(&self) -> Option<LockedPixels> {
        None
    }
}

#[test]
fn store_without_factory_is_dropped() -> Result<(), BitmapError> {
    let mut bitmap = Bitmap::with_config(PixelFormat::Rgb565, 2, 2, 0)?;
    bitmap.attach_store(Some(Arc::new(PixelStore::new(Anonymous))), 0);

    let copy = round_trip(&bitmap, &StoreRegistry::default())?;
    assert_eq!(copy.layout(), bitmap.layout());
    assert!(copy.store().is_none());
    Ok(())
}

#[test]
fn unknown_tag() {
    let mut buffer = WriteBuffer::new();
    header(&mut buffer, PixelFormat::Alpha8, 1, 1, 1);
    buffer.write_u32(7);

    let mut bitmap = Bitmap::new();
    let err = bitmap
        .unflatten(&mut ReadBuffer::new(buffer.freeze()), &StoreRegistry::default())
        .unwrap_err();
    assert_eq!(err, BitmapError::Decode(DecodeError::UnknownPixelTag(7)));
    assert_eq!(bitmap.format(), PixelFormat::None);
}

#[test]
fn unknown_factory() -> Result<(), BitmapError> {
    let mut bitmap = Bitmap::with_config(PixelFormat::Alpha8, 2, 2, 0)?;
    bitmap.alloc_pixels(None, None)?;

    let err = round_trip(&bitmap, &StoreRegistry::new()).unwrap_err();
    assert_eq!(
        err,
        BitmapError::Decode(DecodeError::UnknownFactory("memory".into()))
    );
    Ok(())
}

#[test]
fn misaligned_offset() {
    let mut buffer = WriteBuffer::new();
    header(&mut buffer, PixelFormat::Argb8888, 1, 1, 4);
    buffer.write_u32(1);
    buffer.write_u32(2);
    buffer.write_str("memory");
    buffer.write_u32(8);
    buffer.write_bytes(&[0; 8]);
    buffer.write_u32(0);

    let mut bitmap = Bitmap::new();
    let err = bitmap
        .unflatten(&mut ReadBuffer::new(buffer.freeze()), &StoreRegistry::default())
        .unwrap_err();
    assert_eq!(
        err,
        BitmapError::Decode(DecodeError::MisalignedOffset {
            offset: 2,
            format: PixelFormat::Argb8888
        })
    );
}

#[test]
fn truncated_payload() {
    let mut buffer = WriteBuffer::new();
    header(&mut buffer, PixelFormat::Alpha8, 4, 1, 4);
    buffer.write_u32(1);
    buffer.write_u32(0);
    buffer.write_str("memory");
    buffer.write_u32(4);
    buffer.write_bytes(&[0xFF; 2]);

    let mut bitmap = Bitmap::new();
    let err = bitmap
        .unflatten(&mut ReadBuffer::new(buffer.freeze()), &StoreRegistry::default())
        .unwrap_err();
    assert_eq!(
        err,
        BitmapError::Decode(DecodeError::UnexpectedEnd { needed: 2 })
    );
    assert!(bitmap.store().is_none());
}
