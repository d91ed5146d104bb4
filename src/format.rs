//! The closed set of pixel encodings a bitmap can hold.
use core::fmt;

/// The per-pixel encoding of a bitmap.
///
/// Every operation that depends on the encoding matches on this enum exhaustively, adding a format
/// is a compile error at every site that has to learn about it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PixelFormat {
    /// No pixels, only dimensions.
    #[default]
    None = 0,
    /// One bit of coverage per pixel, most significant bit first.
    Alpha1 = 1,
    /// One byte of coverage per pixel.
    Alpha8 = 2,
    /// One byte per pixel indexing a [`Palette`](crate::Palette) of premultiplied colors.
    Index8 = 3,
    /// 16-bit opaque color, 5 bits red and blue, 6 bits green.
    Rgb565 = 4,
    /// 16-bit premultiplied color, four bits per channel with alpha in the highest nibble.
    Argb4444 = 5,
    /// 32-bit premultiplied color, alpha in the highest byte.
    Argb8888 = 6,
}

impl PixelFormat {
    /// All formats, in the order of their serialized value.
    pub const ALL: [PixelFormat; 7] = [
        PixelFormat::None,
        PixelFormat::Alpha1,
        PixelFormat::Alpha8,
        PixelFormat::Index8,
        PixelFormat::Rgb565,
        PixelFormat::Argb4444,
        PixelFormat::Argb8888,
    ];

    /// The number of bytes of one pixel, zero for formats without whole-byte pixels.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::None | PixelFormat::Alpha1 => 0,
            PixelFormat::Alpha8 | PixelFormat::Index8 => 1,
            PixelFormat::Rgb565 | PixelFormat::Argb4444 => 2,
            PixelFormat::Argb8888 => 4,
        }
    }

    /// The shift turning a pixel column into a byte column, for addressable formats.
    pub(crate) const fn byte_shift(self) -> Option<u32> {
        match self {
            PixelFormat::None | PixelFormat::Alpha1 => None,
            PixelFormat::Alpha8 | PixelFormat::Index8 => Some(0),
            PixelFormat::Rgb565 | PixelFormat::Argb4444 => Some(1),
            PixelFormat::Argb8888 => Some(2),
        }
    }

    /// The alignment rows and offsets of this format must have in memory.
    pub(crate) const fn alignment(self) -> usize {
        match self.bytes_per_pixel() {
            0 => 1,
            n => n,
        }
    }

    /// Decode the serialized value of a format.
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => PixelFormat::None,
            1 => PixelFormat::Alpha1,
            2 => PixelFormat::Alpha8,
            3 => PixelFormat::Index8,
            4 => PixelFormat::Rgb565,
            5 => PixelFormat::Argb4444,
            6 => PixelFormat::Argb8888,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::None => "NONE",
            PixelFormat::Alpha1 => "A1",
            PixelFormat::Alpha8 => "A8",
            PixelFormat::Index8 => "INDEX8",
            PixelFormat::Rgb565 => "565",
            PixelFormat::Argb4444 => "4444",
            PixelFormat::Argb8888 => "8888",
        }
    }

    /// If the format has a channel that can make pixels translucent.
    pub const fn has_alpha(self) -> bool {
        !matches!(self, PixelFormat::None | PixelFormat::Rgb565)
    }

    /// Whether pixels of this format can be copied into a bitmap of format `target`.
    ///
    /// Identity is always allowed for a format with pixels. Any format with pixels converts into
    /// `Alpha8`, `Rgb565` and `Argb8888`, except for `Alpha1` which only copies to itself.
    /// `Alpha1` and `Index8` targets only accept their own format while `Argb4444` additionally
    /// accepts `Argb8888` which is dithered down.
    pub fn can_convert_to(self, target: PixelFormat) -> bool {
        if self == PixelFormat::None {
            return false;
        }

        let same = self == target;
        match target {
            PixelFormat::None => false,
            PixelFormat::Alpha1 | PixelFormat::Index8 => same,
            PixelFormat::Argb4444 => same || self == PixelFormat::Argb8888,
            PixelFormat::Alpha8 | PixelFormat::Rgb565 | PixelFormat::Argb8888 => {
                same || self != PixelFormat::Alpha1
            }
        }
    }

    /// The byte offset of pixel `(x, y)` in rows of `row_bytes`.
    ///
    /// Fails for the formats that are not byte addressable, and when the offset is not
    /// representable.
    pub fn sub_offset(self, x: u32, y: u32, row_bytes: usize) -> Option<usize> {
        let shift = self.byte_shift()?;
        let column = usize::try_from(x).ok()?.checked_shl(shift)?;
        usize::try_from(y)
            .ok()?
            .checked_mul(row_bytes)?
            .checked_add(column)
    }

    /// Invert [`PixelFormat::sub_offset`], finding the pixel at which a byte offset points.
    ///
    /// An offset of zero is always the origin, regardless of format. Other offsets are only
    /// understood for byte addressable formats.
    pub fn upper_left_from_offset(self, offset: usize, row_bytes: usize) -> Option<(u32, u32)> {
        if offset == 0 {
            return Some((0, 0));
        }

        let shift = self.byte_shift()?;
        if row_bytes == 0 {
            return None;
        }

        let y = offset / row_bytes;
        let x = (offset % row_bytes) >> shift;
        Some((u32::try_from(x).ok()?, u32::try_from(y).ok()?))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
