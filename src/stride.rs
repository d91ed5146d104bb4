//! Byte-based, strided row operations on pixel memory.
//!
//! The size functions in this module are the single source of truth for how many bytes a bitmap
//! of some format and dimensions needs. They compute in 64-bit even on narrower targets and treat
//! any result that does not fit into the address space as unrepresentable. The `compute_*`
//! functions report this as `0`, which callers must treat as failure and never as an empty image.
//! The `checked_*` variants report the same condition as `None`.
//!
//! The row views, `ByteRows` and `ByteRowsMut`, are validated once on construction. They view a
//! byte slice that starts at the first pixel and covers at least the safe size of the layout: all
//! rows but the last include their padding, the last one stops at its last pixel.
use crate::format::PixelFormat;
use core::ops::Range;

/// The largest byte count an allocation can have.
const MAX_BYTES: u64 = isize::MAX as u64;

/// The minimum number of bytes of one row of `width` pixels, or `0`.
///
/// Returns `0` for a negative width, for [`PixelFormat::None`] and when the row does not fit the
/// address space.
pub fn compute_row_bytes(format: PixelFormat, width: i32) -> usize {
    checked_row_bytes(format, width).unwrap_or(0)
}

/// The minimum number of bytes of one row of `width` pixels.
///
/// Returns `Some(0)` for [`PixelFormat::None`] and `None` if the width is negative or the row does
/// not fit the address space.
pub fn checked_row_bytes(format: PixelFormat, width: i32) -> Option<usize> {
    let width = u64::try_from(width).ok()?;
    row_bytes_wide(format, width)
}

/// The number of bytes of a tightly packed bitmap, or `0` if it is not representable.
pub fn compute_size(format: PixelFormat, width: i32, height: i32) -> usize {
    checked_size(format, width, height).unwrap_or(0)
}

/// The number of bytes of a tightly packed bitmap.
pub fn checked_size(format: PixelFormat, width: i32, height: i32) -> Option<usize> {
    let row_bytes = checked_row_bytes(format, width)?;
    let height = u64::try_from(height).ok()?;
    fit(u64::try_from(row_bytes).ok()?.checked_mul(height)?)
}

/// The minimum number of bytes that hold all pixels of the bitmap, or `0`.
///
/// Different to [`compute_size`] this respects a row stride larger than required but does not
/// count the padding after the last row. This is the amount of memory which bulk copies of all
/// pixels may touch.
pub fn compute_safe_size(format: PixelFormat, width: i32, height: i32, row_bytes: usize) -> usize {
    checked_safe_size(format, width, height, row_bytes).unwrap_or(0)
}

/// The minimum number of bytes that hold all pixels of the bitmap.
pub fn checked_safe_size(
    format: PixelFormat,
    width: i32,
    height: i32,
    row_bytes: usize,
) -> Option<usize> {
    let width = u64::try_from(width).ok()?;
    let height = u64::try_from(height).ok()?;
    safe_size_wide(format, width, height, u64::try_from(row_bytes).ok()?)
}

fn row_bytes_wide(format: PixelFormat, width: u64) -> Option<usize> {
    let bytes = match format {
        PixelFormat::None => 0,
        PixelFormat::Alpha1 => width.checked_add(7)? >> 3,
        PixelFormat::Alpha8 | PixelFormat::Index8 => width,
        PixelFormat::Rgb565 | PixelFormat::Argb4444 => width.checked_mul(2)?,
        PixelFormat::Argb8888 => width.checked_mul(4)?,
    };

    fit(bytes)
}

fn safe_size_wide(format: PixelFormat, width: u64, height: u64, row_bytes: u64) -> Option<usize> {
    if height == 0 {
        return Some(0);
    }

    let last_row = u64::try_from(row_bytes_wide(format, width)?).ok()?;
    let before_last = (height - 1).checked_mul(row_bytes)?;
    fit(before_last.checked_add(last_row)?)
}

fn fit(bytes: u64) -> Option<usize> {
    if bytes > MAX_BYTES {
        return None;
    }

    usize::try_from(bytes).ok()
}

/// The geometry of rows of pixels in memory.
///
/// A layout with a validated descriptor is always representable: its row size and safe size fit
/// into the address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowLayout {
    /// The encoding of each pixel.
    pub format: PixelFormat,
    /// The number of pixels in each row.
    pub width: u32,
    /// The number of rows.
    pub height: u32,
    /// The distance in bytes between the starts of two consecutive rows.
    pub row_bytes: usize,
}

impl RowLayout {
    /// A layout with rows packed as tightly as the format allows.
    pub fn packed(format: PixelFormat, width: u32, height: u32) -> Option<Self> {
        let row_bytes = row_bytes_wide(format, width.into())?;
        let layout = RowLayout {
            format,
            width,
            height,
            row_bytes,
        };

        layout.checked_safe_size()?;
        Some(layout)
    }

    /// The number of bytes holding the pixels of a single row, without padding.
    pub fn tight_row_bytes(&self) -> usize {
        row_bytes_wide(self.format, self.width.into()).unwrap_or(0)
    }

    /// The number of bytes covered by all rows, excluding the padding of the last row.
    pub fn safe_size(&self) -> usize {
        self.checked_safe_size().unwrap_or(0)
    }

    /// The number of bytes covered by all rows, including the padding of the last row.
    pub fn byte_size(&self) -> usize {
        self.checked_byte_size().unwrap_or(0)
    }

    pub(crate) fn checked_byte_size(&self) -> Option<usize> {
        let row_bytes = u64::try_from(self.row_bytes).ok()?;
        fit(row_bytes.checked_mul(self.height.into())?)
    }

    pub(crate) fn checked_safe_size(&self) -> Option<usize> {
        let row_bytes = u64::try_from(self.row_bytes).ok()?;
        safe_size_wide(self.format, self.width.into(), self.height.into(), row_bytes)
    }

    /// The bytes holding the pixels of row `y`.
    pub fn row_range(&self, y: u32) -> Range<usize> {
        let start = y as usize * self.row_bytes;
        start..start + self.tight_row_bytes()
    }

    fn is_aligned(&self, data: &[u8]) -> bool {
        let align = self.format.alignment();
        self.row_bytes % align == 0 && (data.as_ptr() as usize) % align == 0
    }
}

/// Rows of pixel bytes, borrowed from some buffer.
#[derive(Clone, Copy)]
pub struct ByteRows<'data> {
    layout: RowLayout,
    data: &'data [u8],
}

/// Mutable rows of pixel bytes, borrowed from some buffer.
pub struct ByteRowsMut<'data> {
    layout: RowLayout,
    data: &'data mut [u8],
}

impl<'data> ByteRows<'data> {
    /// View `data` as rows of the layout.
    ///
    /// Fails if the data is too short for the layout, or if it is not aligned to the pixel size of
    /// the format so that rows can not be viewed as words.
    pub fn new(layout: RowLayout, data: &'data [u8]) -> Option<Self> {
        let len = layout.checked_safe_size()?;
        let data = data.get(..len)?;

        if !layout.is_aligned(data) {
            return None;
        }

        Some(ByteRows { layout, data })
    }

    /// View data that was previously validated for the layout.
    ///
    /// Panics if the data is too short. Alignment was checked by the caller.
    pub(crate) fn validated(layout: RowLayout, data: &'data [u8]) -> Self {
        let data = &data[..layout.safe_size()];
        debug_assert!(layout.is_aligned(data));
        ByteRows { layout, data }
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    /// The pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> &'data [u8] {
        &self.data[self.layout.row_range(y)]
    }

    /// The pixels of row `y` of a 16-bit format.
    pub fn row_u16(&self, y: u32) -> &'data [u16] {
        bytemuck::cast_slice(self.row(y))
    }

    /// The pixels of row `y` of a 32-bit format.
    pub fn row_u32(&self, y: u32) -> &'data [u32] {
        bytemuck::cast_slice(self.row(y))
    }

    /// Iterate over all rows.
    pub fn rows(&self) -> impl Iterator<Item = &'data [u8]> + '_ {
        (0..self.layout.height).map(move |y| self.row(y))
    }

    /// All bytes, from the first pixel to the last, including padding between rows.
    pub fn as_bytes(&self) -> &'data [u8] {
        self.data
    }
}

impl<'data> ByteRowsMut<'data> {
    /// View `data` as mutable rows of the layout, see [`ByteRows::new`].
    pub fn new(layout: RowLayout, data: &'data mut [u8]) -> Option<Self> {
        let len = layout.checked_safe_size()?;
        let data = data.get_mut(..len)?;

        if !layout.is_aligned(data) {
            return None;
        }

        Some(ByteRowsMut { layout, data })
    }

    pub(crate) fn validated(layout: RowLayout, data: &'data mut [u8]) -> Self {
        let data = &mut data[..layout.safe_size()];
        debug_assert!(layout.is_aligned(data));
        ByteRowsMut { layout, data }
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    /// Reborrow as immutable rows.
    pub fn as_rows(&self) -> ByteRows<'_> {
        ByteRows {
            layout: self.layout,
            data: self.data,
        }
    }

    pub fn row(&self, y: u32) -> &[u8] {
        &self.data[self.layout.row_range(y)]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let range = self.layout.row_range(y);
        &mut self.data[range]
    }

    pub fn row_u16_mut(&mut self, y: u32) -> &mut [u16] {
        bytemuck::cast_slice_mut(self.row_mut(y))
    }

    pub fn row_u32_mut(&mut self, y: u32) -> &mut [u32] {
        bytemuck::cast_slice_mut(self.row_mut(y))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Overwrite every pixel byte of every row with `value`, leaving the padding untouched.
    pub fn fill(&mut self, value: u8) {
        for y in 0..self.layout.height {
            self.row_mut(y).fill(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, TestResult};

    fn minimum_bits(format: PixelFormat) -> u128 {
        match format {
            PixelFormat::None => 0,
            PixelFormat::Alpha1 => 1,
            PixelFormat::Alpha8 | PixelFormat::Index8 => 8,
            PixelFormat::Rgb565 | PixelFormat::Argb4444 => 16,
            PixelFormat::Argb8888 => 32,
        }
    }

    fn reference_row(format: PixelFormat, width: i32) -> u128 {
        (width as u128 * minimum_bits(format) + 7) / 8
    }

    fn format_of(idx: u8) -> PixelFormat {
        PixelFormat::ALL[usize::from(idx) % PixelFormat::ALL.len()]
    }

    quickcheck! {
        fn row_bytes_cover_the_row(idx: u8, width: i32) -> TestResult {
            if width < 0 {
                return TestResult::from_bool(compute_row_bytes(format_of(idx), width) == 0);
            }

            let format = format_of(idx);
            let expected = reference_row(format, width);
            match checked_row_bytes(format, width) {
                Some(bytes) => TestResult::from_bool(bytes as u128 == expected),
                None => TestResult::from_bool(expected > isize::MAX as u128),
            }
        }

        fn size_never_wraps(idx: u8, width: i32, height: i32) -> TestResult {
            if width < 0 || height < 0 {
                return TestResult::discard();
            }

            let format = format_of(idx);
            let expected = reference_row(format, width) * height as u128;
            let size = compute_size(format, width, height);
            if expected > isize::MAX as u128 {
                TestResult::from_bool(size == 0)
            } else {
                TestResult::from_bool(size as u128 == expected)
            }
        }

        fn safe_size_is_at_most_size(idx: u8, width: u16, height: u16, pad: u8) -> bool {
            let format = format_of(idx);
            let (width, height) = (i32::from(width), i32::from(height));
            let row_bytes = compute_row_bytes(format, width) + usize::from(pad);
            let safe = compute_safe_size(format, width, height, row_bytes);
            let padded = row_bytes * height as usize;
            safe <= padded && (height == 0 || safe >= compute_row_bytes(format, width))
        }
    }

    #[test]
    fn row_bytes_per_format() {
        assert_eq!(compute_row_bytes(PixelFormat::None, 10), 0);
        assert_eq!(compute_row_bytes(PixelFormat::Alpha1, 9), 2);
        assert_eq!(compute_row_bytes(PixelFormat::Alpha1, 8), 1);
        assert_eq!(compute_row_bytes(PixelFormat::Alpha8, 9), 9);
        assert_eq!(compute_row_bytes(PixelFormat::Index8, 9), 9);
        assert_eq!(compute_row_bytes(PixelFormat::Rgb565, 9), 18);
        assert_eq!(compute_row_bytes(PixelFormat::Argb4444, 9), 18);
        assert_eq!(compute_row_bytes(PixelFormat::Argb8888, 9), 36);
        assert_eq!(compute_row_bytes(PixelFormat::Argb8888, -1), 0);
        assert_eq!(checked_row_bytes(PixelFormat::Argb8888, -1), None);
    }

    #[test]
    fn safe_size_skips_last_padding() {
        assert_eq!(compute_safe_size(PixelFormat::Argb8888, 3, 2, 16), 16 + 12);
        assert_eq!(compute_safe_size(PixelFormat::Argb8888, 3, 0, 16), 0);
        assert_eq!(compute_safe_size(PixelFormat::Alpha1, 3, 3, 4), 9);
        assert_eq!(compute_safe_size(PixelFormat::Alpha8, -3, 3, 4), 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn boundaries_near_max() {
        let max = i32::MAX;
        assert_eq!(compute_row_bytes(PixelFormat::Argb8888, max), 4 * max as usize);
        assert_eq!(compute_size(PixelFormat::Alpha8, max, max), max as usize * max as usize);
        assert_eq!(compute_size(PixelFormat::Argb8888, max, max), 0, "Exceeds isize::MAX");
        assert_eq!(compute_row_bytes(PixelFormat::Alpha1, max), (max as usize + 7) / 8);
        assert_eq!(
            compute_safe_size(PixelFormat::Argb8888, max, max, usize::MAX / 2),
            0,
            "Overflows the address space"
        );
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn boundaries_near_max() {
        let max = i32::MAX;
        assert_eq!(compute_row_bytes(PixelFormat::Argb8888, max), 0);
        assert_eq!(compute_size(PixelFormat::Alpha8, max, 2), 0);
        assert_eq!(compute_size(PixelFormat::Alpha8, max, 1), max as usize);
    }

    #[test]
    fn row_views() {
        let layout = RowLayout {
            format: PixelFormat::Rgb565,
            width: 2,
            height: 2,
            row_bytes: 6,
        };

        let mut data = [0u16; 8];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut data);
        assert!(ByteRowsMut::new(layout, &mut bytes[..9]).is_none());
        assert!(ByteRowsMut::new(layout, &mut bytes[1..]).is_none(), "Misaligned");

        let mut rows = ByteRowsMut::new(layout, bytes).expect("Valid layout");
        assert_eq!(rows.as_bytes().len(), 10);
        rows.row_u16_mut(1).copy_from_slice(&[0x1234, 0x5678]);
        rows.fill(0xff);
        assert_eq!(rows.as_rows().row(1), &[0xff; 4]);
        assert_eq!(rows.as_bytes()[4..6], [0, 0], "Padding untouched");
    }

    #[test]
    fn packed_layout() {
        let layout = RowLayout::packed(PixelFormat::Alpha1, 9, 3).unwrap();
        assert_eq!(layout.row_bytes, 2);
        assert_eq!(layout.safe_size(), 6);
        assert_eq!(layout.byte_size(), 6);
        assert_eq!(layout.row_range(2), 4..6);
    }
}
