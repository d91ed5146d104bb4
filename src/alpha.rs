//! Extraction of coverage masks, optionally reshaped by a mask filter.
use crate::allocator::Allocator;
use crate::bitmap::Bitmap;
use crate::color::{expand_4444, get_a32};
use crate::error::BitmapError;
use crate::format::PixelFormat;
use crate::geom::{IPoint, IRect};
use crate::stride::{ByteRowsMut, RowLayout};

/// An 8-bit coverage mask positioned at some bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub bounds: IRect,
    /// The distance between two rows of `image`.
    pub row_bytes: usize,
    pub image: Vec<u8>,
}

/// A scale and translation applied to a mask by its filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub sx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

/// Reshapes an alpha mask, for example by blurring it.
pub trait MaskFilter: Send + Sync {
    /// Produce a new mask from `src`, which may cover larger bounds.
    ///
    /// Returning `None` declines, in which case the unfiltered alpha is used.
    fn filter_mask(&self, src: &Mask, transform: &Transform) -> Option<Mask>;
}

impl Mask {
    /// A transparent mask of the bounds, with rows padded to four bytes.
    ///
    /// Panics if the image can not be allocated. See [`Mask::try_new`] for the fallible version.
    pub fn new(bounds: IRect) -> Self {
        match Self::try_new(bounds) {
            Ok(mask) => mask,
            Err(err) => panic!("Failed to allocate mask of {bounds:?}: {err}"),
        }
    }

    /// A transparent mask of the bounds, reporting allocation failure instead of aborting.
    pub fn try_new(bounds: IRect) -> Result<Self, BitmapError> {
        let width = bounds.width().max(0) as usize;
        let height = bounds.height().max(0) as usize;
        let row_bytes = align4(width);
        let bytes = row_bytes
            .checked_mul(height)
            .ok_or(BitmapError::Unrepresentable)?;

        let mut image = Vec::new();
        image
            .try_reserve_exact(bytes)
            .map_err(|_| BitmapError::AllocationFailed { bytes })?;
        image.resize(bytes, 0);

        Ok(Mask {
            bounds,
            row_bytes,
            image,
        })
    }

    pub fn width(&self) -> u32 {
        self.bounds.width().max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.bounds.height().max(0) as u32
    }

    fn layout(&self) -> RowLayout {
        RowLayout {
            format: PixelFormat::Alpha8,
            width: self.width(),
            height: self.height(),
            row_bytes: self.row_bytes,
        }
    }

    /// The coverage of row `y`, if the image covers it.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let start = (y as usize).checked_mul(self.row_bytes)?;
        self.image.get(start..start.checked_add(self.width() as usize)?)
    }

    fn rows_mut(&mut self) -> Option<ByteRowsMut<'_>> {
        ByteRowsMut::new(self.layout(), &mut self.image)
    }

    /// If the image covers all rows of the bounds.
    fn is_complete(&self) -> bool {
        self.row_bytes >= self.width() as usize
            && self
                .layout()
                .checked_safe_size()
                .is_some_and(|len| len <= self.image.len())
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        sx: 1.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

impl Bitmap {
    /// Extract the coverage of every pixel into a new `Alpha8` bitmap.
    ///
    /// Without a filter the result has the dimensions of this bitmap and its offset is the origin.
    /// A filter receives the coverage as a mask at the origin and may return a mask with other
    /// bounds; the result then has the size of those bounds and their top left corner as offset.
    /// When the filter declines the unfiltered coverage is returned.
    ///
    /// Pixels that can not be read give zero coverage, opaque bitmaps give full coverage. The rows
    /// of the result are padded to a multiple of four bytes.
    pub fn extract_alpha(
        &self,
        filter: Option<&dyn MaskFilter>,
        allocator: Option<&dyn Allocator>,
    ) -> Result<(Bitmap, IPoint), BitmapError> {
        if let Some(filter) = filter {
            if let Some(mask) = self.filtered_mask(filter)? {
                let dst = allocate_alpha(mask.width(), mask.height(), mask.row_bytes, allocator)?;
                copy_mask(&dst, &mask)?;
                return Ok((dst, mask.bounds.top_left()));
            }
        }

        let (width, height) = (self.width(), self.height());
        let dst = allocate_alpha(width, height, align4(width as usize), allocator)?;
        {
            let _lock = dst.locked();
            let pixels = dst.pixels().ok_or(BitmapError::NotReady)?;
            let mut write = pixels.write();
            get_bitmap_alpha(self, &mut write.rows_mut());
        }

        Ok((dst, IPoint::new(0, 0)))
    }

    /// The filtered coverage, `None` if the filter declined or produced an unusable mask.
    fn filtered_mask(&self, filter: &dyn MaskFilter) -> Result<Option<Mask>, BitmapError> {
        let width = i32::try_from(self.width()).map_err(|_| BitmapError::Unrepresentable)?;
        let height = i32::try_from(self.height()).map_err(|_| BitmapError::Unrepresentable)?;

        let mut src = Mask::try_new(IRect::from_wh(width, height)).inspect_err(|err| {
            tracing::warn!(%err, "Failed to allocate the mask for filtering");
        })?;
        let mut rows = src.rows_mut().ok_or(BitmapError::Unrepresentable)?;
        get_bitmap_alpha(self, &mut rows);

        let Some(mask) = filter.filter_mask(&src, &Transform::IDENTITY) else {
            tracing::trace!("Mask filter declined, using the unfiltered alpha");
            return Ok(None);
        };

        if mask.bounds.is_empty() || !mask.is_complete() {
            tracing::debug!(
                width = mask.bounds.width(),
                height = mask.bounds.height(),
                row_bytes = mask.row_bytes,
                len = mask.image.len(),
                "Mask filter produced an unusable mask"
            );
            return Ok(None);
        }

        Ok(Some(mask))
    }
}

fn allocate_alpha(
    width: u32,
    height: u32,
    row_bytes: usize,
    allocator: Option<&dyn Allocator>,
) -> Result<Bitmap, BitmapError> {
    let mut dst = Bitmap::with_dimensions(PixelFormat::Alpha8, width, height, align4(row_bytes))?;
    dst.alloc_pixels(allocator, None)?;
    Ok(dst)
}

fn copy_mask(dst: &Bitmap, mask: &Mask) -> Result<(), BitmapError> {
    let _lock = dst.locked();
    let pixels = dst.pixels().ok_or(BitmapError::NotReady)?;
    let mut write = pixels.write();
    let mut rows = write.rows_mut();

    for y in 0..mask.height() {
        if let Some(src) = mask.row(y) {
            rows.row_mut(y).copy_from_slice(src);
        }
    }

    Ok(())
}

/// Write the coverage of every pixel of `src` into rows of the same dimensions.
fn get_bitmap_alpha(src: &Bitmap, out: &mut ByteRowsMut<'_>) {
    let _lock = src.locked();
    let Some(pixels) = src.pixels() else {
        out.fill(0);
        return;
    };

    if src.is_opaque() {
        out.fill(0xFF);
        return;
    }

    let read = pixels.read();
    let rows = read.rows();
    for y in 0..out.layout().height {
        let dst = out.row_mut(y);
        match src.format() {
            PixelFormat::Alpha8 => dst.copy_from_slice(rows.row(y)),
            PixelFormat::Alpha1 => {
                let bits = rows.row(y);
                for (x, a) in dst.iter_mut().enumerate() {
                    let set = bits[x >> 3] & (0x80 >> (x & 7)) != 0;
                    *a = if set { 0xFF } else { 0 };
                }
            }
            PixelFormat::Argb8888 => {
                for (a, &c) in dst.iter_mut().zip(rows.row_u32(y)) {
                    *a = get_a32(c) as u8;
                }
            }
            PixelFormat::Argb4444 => {
                for (a, &c) in dst.iter_mut().zip(rows.row_u16(y)) {
                    *a = get_a32(expand_4444(c)) as u8;
                }
            }
            PixelFormat::Index8 => match pixels.palette() {
                Some(palette) => {
                    for (a, &index) in dst.iter_mut().zip(rows.row(y)) {
                        *a = palette.get(index).alpha();
                    }
                }
                None => dst.fill(0),
            },
            PixelFormat::None | PixelFormat::Rgb565 => dst.fill(0xFF),
        }
    }
}
