//! Chains of progressively halved images for minification.
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::buf::Buffer;
use crate::downsample::{self, Kernel};
use crate::error::BitmapError;
use crate::format::PixelFormat;
use crate::stride::{ByteRows, ByteRowsMut, RowLayout};

/// A 16.16 fixed point number.
pub type Fixed = i32;

/// The fixed point representation of one.
pub const FIXED_ONE: Fixed = 1 << 16;

/// The position of one level within the memory of its chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MipLevel {
    pub offset: usize,
    pub width: u32,
    pub height: u32,
    pub row_bytes: usize,
}

/// An immutable cache of half-size images, shared between clones of a bitmap.
///
/// The first level is half the size of the bitmap, each following level halves the previous one.
/// All levels live in one allocation that is freed with the last reference to the chain.
pub struct MipChain {
    format: PixelFormat,
    memory: Buffer,
    levels: Vec<MipLevel>,
}

/// A borrowed view of one level of a mip chain.
#[derive(Clone, Copy)]
pub struct MipLevelView<'chain> {
    /// The level number, where `1` is the first half-size image.
    pub level: usize,
    rows: ByteRows<'chain>,
}

/// Compute the mip level for a scale as the fixed point binary logarithm of its magnitude.
///
/// The larger magnitude of both axes is used. Scales below one map to level zero. The integral
/// part of the result is `floor(log2(scale))`, the fraction interpolates linearly towards the next
/// power of two.
pub fn compute_mip_level(sx: Fixed, sy: Fixed) -> Fixed {
    let scale = sx.unsigned_abs().max(sy.unsigned_abs());
    if scale < FIXED_ONE as u32 {
        return 0;
    }

    let clz = scale.leading_zeros();
    debug_assert!(clz <= 15);
    let fraction = (scale << (clz + 1)) >> 16;
    (((15 - clz) as i32) << 16) + fraction as i32
}

impl MipChain {
    /// Build all levels from the pixels of a bitmap.
    ///
    /// Returns `None` if the format has no box filter or if the bitmap is too small for a single
    /// level.
    pub(crate) fn build(src: &ByteRows<'_>) -> Result<Option<Self>, BitmapError> {
        let format = src.layout().format;
        let Some(kernel) = downsample::kernel_for(format) else {
            return Ok(None);
        };

        let mut levels = Vec::new();
        let mut total = 0usize;
        let (mut width, mut height) = (src.layout().width, src.layout().height);
        loop {
            width >>= 1;
            height >>= 1;
            if width == 0 || height == 0 {
                break;
            }

            let layout = RowLayout::packed(format, width, height).ok_or(BitmapError::Unrepresentable)?;
            levels.push(MipLevel {
                offset: total,
                width,
                height,
                row_bytes: layout.row_bytes,
            });

            total = total
                .checked_add(layout.byte_size())
                .ok_or(BitmapError::Unrepresentable)?;
        }

        if levels.is_empty() {
            return Ok(None);
        }

        let mut memory = Buffer::try_new(total).map_err(|_| {
            tracing::warn!(bytes = total, "Failed to allocate mip chain");
            BitmapError::AllocationFailed { bytes: total }
        })?;

        Self::fill(format, kernel, src, &levels, memory.as_bytes_mut())?;
        tracing::trace!(levels = levels.len(), bytes = total, %format, "Built mip chain");

        Ok(Some(MipChain {
            format,
            memory,
            levels,
        }))
    }

    fn fill(
        format: PixelFormat,
        kernel: Kernel,
        src: &ByteRows<'_>,
        levels: &[MipLevel],
        bytes: &mut [u8],
    ) -> Result<(), BitmapError> {
        for (idx, level) in levels.iter().enumerate() {
            let (done, rest) = bytes.split_at_mut(level.offset);
            let mut dst = ByteRowsMut::new(level.layout(format), rest)
                .ok_or(BitmapError::Unrepresentable)?;

            match idx.checked_sub(1).map(|prev| levels[prev]) {
                None => kernel(src, &mut dst),
                Some(prev) => {
                    let prev_rows = ByteRows::new(prev.layout(format), &done[prev.offset..])
                        .ok_or(BitmapError::Unrepresentable)?;
                    kernel(&prev_rows, &mut dst)
                }
            }
        }

        Ok(())
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    /// The memory of all levels.
    pub fn as_bytes(&self) -> &[u8] {
        self.memory.as_bytes()
    }

    /// View the level at `index`, where index `0` is the first half-size image.
    pub fn level(&self, index: usize) -> Option<MipLevelView<'_>> {
        let level = self.levels.get(index)?;
        let rows = ByteRows::new(level.layout(self.format), &self.as_bytes()[level.offset..])?;
        Some(MipLevelView {
            level: index + 1,
            rows,
        })
    }
}

impl MipLevel {
    pub fn layout(&self, format: PixelFormat) -> RowLayout {
        RowLayout {
            format,
            width: self.width,
            height: self.height,
            row_bytes: self.row_bytes,
        }
    }
}

impl<'chain> MipLevelView<'chain> {
    pub fn width(&self) -> u32 {
        self.rows.layout().width
    }

    pub fn height(&self) -> u32 {
        self.rows.layout().height
    }

    pub fn row_bytes(&self) -> usize {
        self.rows.layout().row_bytes
    }

    pub fn format(&self) -> PixelFormat {
        self.rows.layout().format
    }

    pub fn rows(&self) -> ByteRows<'chain> {
        self.rows
    }
}

impl core::fmt::Debug for MipChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MipChain")
            .field("format", &self.format)
            .field("levels", &self.levels)
            .finish()
    }
}

impl Bitmap {
    /// Build the mip chain from the current pixels.
    ///
    /// Does nothing if a chain exists, unless `force` is set. Only `Argb8888`, `Rgb565` and
    /// `Argb4444` bitmaps get a chain, for other formats and for bitmaps too small to halve this
    /// succeeds without building one. Fails if the pixels are not ready or the chain can not be
    /// allocated.
    pub fn build_mip_chain(&mut self, force: bool) -> Result<(), BitmapError> {
        if force {
            self.mip_chain = None;
        } else if self.mip_chain.is_some() {
            return Ok(());
        }

        if downsample::kernel_for(self.format()).is_none() {
            return Ok(());
        }

        let chain = {
            let _lock = self.locked();
            let pixels = self.pixels().ok_or(BitmapError::NotReady)?;
            let read = pixels.read();
            MipChain::build(&read.rows())?
        };

        self.mip_chain = chain.map(Arc::new);
        Ok(())
    }

    pub fn has_mip_chain(&self) -> bool {
        self.mip_chain.is_some()
    }

    pub fn mip_chain(&self) -> Option<&Arc<MipChain>> {
        self.mip_chain.as_ref()
    }

    /// View the level of the mip chain appropriate for drawing at a scale.
    ///
    /// Returns `None` without a chain or when the scale does not minify by at least two. The level
    /// is clamped such that the last level of the chain is never selected.
    pub fn extract_mip_level(&self, sx: Fixed, sy: Fixed) -> Option<MipLevelView<'_>> {
        let chain = self.mip_chain.as_ref()?;
        let level = compute_mip_level(sx, sy) >> 16;
        if level <= 0 {
            return None;
        }

        let level = (level as usize).min(chain.len() - 1);
        if level == 0 {
            return None;
        }

        chain.level(level - 1)
    }
}
