use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use image_bitmap::{Bitmap, BitmapError, Color, DiagnosticSink, IRect, PixelFormat};

const THREADS: usize = 8;

#[test]
fn clones_lock_concurrently() -> Result<(), BitmapError> {
    let mut bitmap = Bitmap::with_config(PixelFormat::Argb8888, 32, 32, 0)?;
    bitmap.alloc_pixels(None, None)?;
    bitmap.erase_color(Color::WHITE);
    bitmap.unlock_pixels();

    let barrier = &Barrier::new(THREADS);
    thread::scope(|scope| {
        for _ in 0..THREADS {
            let clone = bitmap.clone();
            scope.spawn(move || {
                let _ = barrier.wait();
                for _ in 0..100 {
                    let _lock = clone.locked();
                    assert!(clone.ready_to_draw());
                    assert_eq!(clone.get_color(31, 31), Some(Color::WHITE));
                    assert!(clone.compute_is_opaque());
                }
                assert_eq!(clone.lock_count(), 0);
            });
        }
    });

    let store = bitmap.store().expect("Allocated store");
    assert!(!store.is_locked());
    Ok(())
}

#[test]
fn disjoint_subsets_from_threads() -> Result<(), BitmapError> {
    let mut bitmap = Bitmap::with_config(PixelFormat::Rgb565, 4, THREADS as i32, 0)?;
    bitmap.alloc_pixels(None, None)?;

    let colors: Vec<Color> = (0..THREADS as u32)
        // Red values that survive the round trip through five bits.
        .map(|i| Color::from_argb(0xFF, (i * 32 | i) as u8, 0, 0xFF))
        .collect();

    thread::scope(|scope| {
        for (row, &color) in colors.iter().enumerate() {
            let subset = bitmap.extract_subset(IRect::from_xywh(0, row as i32, 4, 1));
            scope.spawn(move || {
                let subset = subset.expect("Row within bounds");
                subset.erase_color(color);
            });
        }
    });

    for (row, color) in colors.iter().enumerate() {
        assert_eq!(bitmap.get_color(3, row as u32), Some(*color));
    }

    Ok(())
}

#[derive(Default)]
struct CountReleases(AtomicUsize);

impl DiagnosticSink for CountReleases {
    fn bitmap_released(&self, _: &Bitmap) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn released_clones_are_reported() -> Result<(), BitmapError> {
    let sink = Arc::new(CountReleases::default());
    let mut bitmap = Bitmap::with_config(PixelFormat::Alpha8, 2, 2, 0)?;
    bitmap.set_diagnostic_sink(Some(sink.clone()));

    drop(bitmap.clone());
    assert_eq!(sink.0.load(Ordering::Relaxed), 0, "No store, nothing to report");

    bitmap.alloc_pixels(None, None)?;
    thread::scope(|scope| {
        for _ in 0..THREADS {
            let clone = bitmap.clone();
            scope.spawn(move || drop(clone));
        }
    });

    assert_eq!(sink.0.load(Ordering::Relaxed), THREADS);
    drop(bitmap);
    assert_eq!(sink.0.load(Ordering::Relaxed), THREADS + 1);
    Ok(())
}
