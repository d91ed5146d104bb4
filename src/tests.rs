use std::sync::Arc;

use crate::{
    compute_row_bytes, compute_size, Bitmap, BitmapError, Color, IRect, Palette, PixelFormat,
    PremulColor, FIXED_ONE,
};

fn allocated(format: PixelFormat, width: i32, height: i32) -> Result<Bitmap, BitmapError> {
    let mut bitmap = Bitmap::with_config(format, width, height, 0)?;
    bitmap.alloc_pixels(None, None)?;
    Ok(bitmap)
}

#[test]
fn erase_and_scan_opacity() -> Result<(), BitmapError> {
    let bitmap = allocated(PixelFormat::Argb8888, 4, 4)?;

    bitmap.erase_color(Color::from_argb(0xFF, 0xFF, 0, 0));
    assert!(bitmap.compute_is_opaque());

    bitmap.erase_area(IRect::from_wh(4, 4), Color::from_argb(0x80, 0xFF, 0, 0));
    assert!(!bitmap.compute_is_opaque());

    Ok(())
}

#[test]
fn opacity_scans() -> Result<(), BitmapError> {
    // Erased alpha and the expected result of the scan.
    let cases = [
        (PixelFormat::Alpha8, 0xFF, true),
        (PixelFormat::Alpha8, 0xFE, false),
        // Only the top nibble of the alpha survives.
        (PixelFormat::Argb4444, 0xF0, true),
        (PixelFormat::Argb4444, 0xEF, false),
        (PixelFormat::Argb8888, 0xFF, true),
        (PixelFormat::Argb8888, 0x01, false),
    ];

    for (format, alpha, opaque) in cases {
        let bitmap = allocated(format, 5, 3)?;
        bitmap.erase_argb(0xFF, 0x20, 0x40, 0x60);
        assert!(bitmap.compute_is_opaque(), "{format:?} after opaque erase");

        bitmap.erase_area(IRect::from_xywh(4, 2, 1, 1), Color::from_argb(alpha, 0, 0, 0));
        assert_eq!(bitmap.compute_is_opaque(), opaque, "{format:?} with alpha {alpha:#x}");
    }

    let opaque = Palette::new(vec![PremulColor(0xFF10_2030), PremulColor(0xFFFF_FFFF)]);
    let translucent = Palette::new(vec![PremulColor(0xFF10_2030), PremulColor(0xFE00_0000)]);
    for (palette, expected) in [(opaque, true), (translucent, false)] {
        let mut bitmap = Bitmap::with_config(PixelFormat::Index8, 5, 3, 0)?;
        bitmap.alloc_pixels(None, Some(Arc::new(palette)))?;
        assert_eq!(bitmap.compute_is_opaque(), expected);
    }

    Ok(())
}

#[test]
fn mip_chain_of_eight() -> Result<(), BitmapError> {
    let mut bitmap = allocated(PixelFormat::Argb8888, 8, 8)?;
    bitmap.erase_color(Color::WHITE);
    bitmap.build_mip_chain(false)?;

    let chain = bitmap.mip_chain().expect("Chain for a supported format");
    let dims: Vec<_> = chain.levels().iter().map(|l| (l.width, l.height)).collect();
    assert_eq!(dims, [(4, 4), (2, 2), (1, 1)]);

    let view = bitmap
        .extract_mip_level(2 * FIXED_ONE, 2 * FIXED_ONE)
        .expect("Minification by two");
    assert_eq!((view.width(), view.height()), (4, 4));
    assert_eq!(view.level, 1);
    assert!(view.rows().row_u32(3).iter().all(|&c| c == 0xFFFF_FFFF));

    // Never the smallest level.
    let view = bitmap.extract_mip_level(64 * FIXED_ONE, FIXED_ONE).unwrap();
    assert_eq!((view.width(), view.height()), (2, 2));

    assert!(bitmap.extract_mip_level(FIXED_ONE, FIXED_ONE).is_none());
    assert!(bitmap.extract_mip_level(FIXED_ONE + FIXED_ONE / 2, 0).is_none());

    Ok(())
}

#[test]
fn mip_chain_is_built_once() -> Result<(), BitmapError> {
    let mut bitmap = allocated(PixelFormat::Rgb565, 16, 16)?;
    bitmap.build_mip_chain(false)?;
    let first = bitmap.mip_chain().cloned().unwrap();

    bitmap.build_mip_chain(false)?;
    assert!(Arc::ptr_eq(&first, bitmap.mip_chain().unwrap()));

    bitmap.build_mip_chain(true)?;
    assert!(!Arc::ptr_eq(&first, bitmap.mip_chain().unwrap()));

    // Clones share the chain.
    let clone = bitmap.clone();
    assert!(Arc::ptr_eq(
        clone.mip_chain().unwrap(),
        bitmap.mip_chain().unwrap()
    ));

    Ok(())
}

#[test]
fn dithered_copy_into_4444() -> Result<(), BitmapError> {
    let bitmap = allocated(PixelFormat::Argb8888, 4, 1)?;
    bitmap.erase_color(Color(0xFF1F_1F1F));

    let copy = bitmap.copy_to(PixelFormat::Argb4444, None)?;
    let pixels = copy.pixels().ok_or(BitmapError::NotReady)?;
    let read = pixels.read();
    let row = read.rows().row_u16(0).to_vec();

    // Truncation would produce `0xF111` for every pixel.
    assert_eq!(row, [0xF111, 0xF222, 0xF222, 0xF222]);
    Ok(())
}

#[test]
fn subsets() -> Result<(), BitmapError> {
    let unallocated = Bitmap::with_config(PixelFormat::Argb8888, 4, 4, 0)?;
    assert_eq!(
        unallocated.extract_subset(IRect::from_wh(2, 2)).unwrap_err(),
        BitmapError::NoPixelStore
    );

    let bitmap = allocated(PixelFormat::Argb8888, 4, 4)?;
    assert_eq!(
        bitmap.extract_subset(IRect::from_xywh(4, 0, 2, 2)).unwrap_err(),
        BitmapError::EmptySubset
    );

    let clipped = bitmap.extract_subset(IRect::from_xywh(2, 3, 8, 8))?;
    assert_eq!((clipped.width(), clipped.height()), (2, 1));
    assert_eq!(clipped.row_bytes(), bitmap.row_bytes());
    assert_eq!(clipped.store_offset(), 3 * 16 + 2 * 4);

    let full = bitmap.extract_subset(bitmap.bounds())?;
    assert!(Arc::ptr_eq(full.store().unwrap(), bitmap.store().unwrap()));
    assert_eq!(full.store_offset(), 0);
    assert_eq!(full.layout(), bitmap.layout());

    // Writes through the subset are visible in the source.
    clipped.erase_color(Color::WHITE);
    assert_eq!(bitmap.get_color(3, 3), Some(Color::WHITE));
    assert_eq!(bitmap.get_color(1, 3), Some(Color::TRANSPARENT));

    Ok(())
}

#[test]
fn subset_opacity() -> Result<(), BitmapError> {
    let mut bitmap = allocated(PixelFormat::Argb8888, 4, 4)?;
    let subset = bitmap.extract_subset(IRect::from_xywh(1, 1, 2, 2))?;
    assert!(!subset.is_opaque());

    bitmap.set_is_opaque(true);
    let subset = bitmap.extract_subset(IRect::from_xywh(1, 1, 2, 2))?;
    assert!(subset.is_opaque());

    let opaque = Palette::new(vec![PremulColor(0xFF00_00FF)]);
    let translucent = Palette::new(vec![PremulColor(0xFF00_00FF), PremulColor(0x8000_0080)]);
    for (palette, flag, expected) in [(opaque, false, true), (translucent, true, false)] {
        let mut indexed = Bitmap::with_config(PixelFormat::Index8, 4, 4, 0)?;
        indexed.alloc_pixels(None, Some(Arc::new(palette)))?;
        indexed.set_is_opaque(flag);

        let subset = indexed.extract_subset(IRect::from_xywh(2, 0, 2, 3))?;
        assert!(!subset.flags().contains(crate::BitmapFlags::OPAQUE));
        assert_eq!(subset.is_opaque(), expected);
    }

    Ok(())
}

#[test]
fn one_bit_subsets_are_not_addressable() -> Result<(), BitmapError> {
    let bitmap = allocated(PixelFormat::Alpha1, 16, 2)?;
    assert_eq!(
        bitmap.extract_subset(IRect::from_xywh(8, 0, 8, 1)).unwrap_err(),
        BitmapError::UnsupportedFormat(PixelFormat::Alpha1)
    );
    Ok(())
}

#[test]
fn clone_locks_are_independent() -> Result<(), BitmapError> {
    let bitmap = allocated(PixelFormat::Alpha8, 2, 2)?;
    assert!(bitmap.ready_to_draw());

    let clone = bitmap.clone();
    assert_eq!(clone.lock_count(), 0);
    assert!(!clone.ready_to_draw());

    clone.lock_pixels();
    assert!(clone.ready_to_draw());
    clone.unlock_pixels();

    assert!(!clone.ready_to_draw());
    assert!(bitmap.ready_to_draw());

    // Both still describe the same content.
    bitmap.erase_argb(0x40, 0, 0, 0);
    let _lock = clone.locked();
    assert_eq!(clone.get_color(1, 1), Some(Color(0x4000_0000)));
    assert_eq!(clone.generation_id(), bitmap.generation_id());

    Ok(())
}

#[test]
fn balanced_locks() -> Result<(), BitmapError> {
    let bitmap = allocated(PixelFormat::Argb8888, 2, 2)?;
    let fresh = bitmap.clone();

    for _ in 0..5 {
        fresh.lock_pixels();
    }

    assert_eq!(fresh.lock_count(), 5);
    for _ in 0..5 {
        fresh.unlock_pixels();
    }

    assert_eq!(fresh.lock_count(), 0);
    assert!(!fresh.ready_to_draw());

    // Extra unlocks do not underflow.
    fresh.unlock_pixels();
    assert_eq!(fresh.lock_count(), 0);
    assert_eq!(bitmap.lock_count(), 1);

    Ok(())
}

#[test]
fn unrepresentable_sizes_are_zero() {
    assert_eq!(compute_row_bytes(PixelFormat::Argb8888, -1), 0);
    assert_eq!(compute_row_bytes(PixelFormat::Alpha1, 9), 2);
    assert_eq!(compute_size(PixelFormat::None, 100, 100), 0);

    let max = i32::MAX;
    let wide = compute_size(PixelFormat::Argb8888, max, max);
    assert_eq!(wide, 0, "4 * max * max exceeds any address space");

    assert!(Bitmap::with_config(PixelFormat::Argb8888, max, max, 0).is_err());
}
