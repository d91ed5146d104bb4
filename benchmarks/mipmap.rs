use std::hint::black_box;

use brunch::Bench;

use image_bitmap::{Bitmap, BitmapError, Color, PixelFormat};

#[derive(Debug)]
enum Task {
    MipChain,
    CopyTo(PixelFormat),
    ExtractAlpha,
}

#[derive(Debug)]
struct Setup {
    format: PixelFormat,
    task: Task,
    sz: i32,
}

impl Setup {
    fn name(&self) -> String {
        format!("{:?}({}, {})", self.task, self.format, self.sz)
    }

    fn prepare(&self) -> Result<impl FnMut(), BitmapError> {
        let mut bitmap = Bitmap::with_config(self.format, self.sz, self.sz, 0)?;
        bitmap.alloc_pixels(None, None)?;
        bitmap.erase_color(Color::from_argb(0xC0, 0x40, 0x80, 0xFF));

        // Each task runs once here so that failures surface before measuring.
        let run: Box<dyn FnMut()> = match self.task {
            Task::MipChain => {
                bitmap.build_mip_chain(true)?;
                assert!(bitmap.has_mip_chain(), "No chain for {}", self.format);
                Box::new(move || {
                    bitmap.build_mip_chain(true).expect("Chain was built before");
                    black_box(bitmap.mip_chain());
                })
            }
            Task::CopyTo(format) => {
                bitmap.copy_to(format, None)?;
                Box::new(move || {
                    black_box(bitmap.copy_to(format, None).expect("Copied before"));
                })
            }
            Task::ExtractAlpha => {
                bitmap.extract_alpha(None, None)?;
                Box::new(move || {
                    black_box(bitmap.extract_alpha(None, None).expect("Extracted before"));
                })
            }
        };

        Ok(run)
    }
}

fn main() {
    let tests = [
        /* box filtered chains */
        Setup {
            format: PixelFormat::Argb8888,
            task: Task::MipChain,
            sz: 512,
        },
        Setup {
            format: PixelFormat::Rgb565,
            task: Task::MipChain,
            sz: 512,
        },
        Setup {
            format: PixelFormat::Argb4444,
            task: Task::MipChain,
            sz: 512,
        },
        /* conversions */
        Setup {
            format: PixelFormat::Argb8888,
            task: Task::CopyTo(PixelFormat::Argb8888),
            sz: 512,
        },
        Setup {
            format: PixelFormat::Argb8888,
            task: Task::CopyTo(PixelFormat::Argb4444),
            sz: 512,
        },
        Setup {
            format: PixelFormat::Argb8888,
            task: Task::CopyTo(PixelFormat::Rgb565),
            sz: 512,
        },
        Setup {
            format: PixelFormat::Argb4444,
            task: Task::CopyTo(PixelFormat::Argb8888),
            sz: 512,
        },
        /* masks */
        Setup {
            format: PixelFormat::Argb8888,
            task: Task::ExtractAlpha,
            sz: 512,
        },
    ];

    let mut benches = brunch::Benches::default();
    benches.extend(tests.map(|setup| {
        let bench = match setup.prepare() {
            Ok(bench) => bench,
            Err(err) => panic!("Failed to setup benchmark {:?}: {:?}", setup, err),
        };

        Bench::new(format!("bitmap::mipmap::main::{}", setup.name())).run(bench)
    }));
    benches.finish();
}
