//! The shared color table of indexed bitmaps.
use crate::color::PremulColor;

/// An immutable table of premultiplied colors for [`PixelFormat::Index8`](crate::PixelFormat).
///
/// Palettes are shared behind an `Arc` by the stores and bitmaps that use them. Replacing colors
/// means constructing a new palette. Whether all entries are opaque is computed once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Box<[PremulColor]>,
    all_opaque: bool,
}

impl Palette {
    /// The most entries an 8-bit index can address.
    pub const MAX_LEN: usize = 256;

    /// Create a palette from its entries.
    ///
    /// # Panics
    ///
    /// When given more than [`Palette::MAX_LEN`] colors.
    pub fn new(colors: impl Into<Box<[PremulColor]>>) -> Self {
        let colors = colors.into();
        assert!(
            colors.len() <= Self::MAX_LEN,
            "A palette holds at most {} colors, got {}",
            Self::MAX_LEN,
            colors.len()
        );

        let all_opaque = colors.iter().all(|c| c.is_opaque());
        Palette { colors, all_opaque }
    }

    /// A palette of `len` transparent black entries.
    pub fn transparent(len: usize) -> Self {
        Self::new(vec![PremulColor(0); len])
    }

    pub fn colors(&self) -> &[PremulColor] {
        &self.colors
    }

    /// The color of an index, transparent black for indices past the end.
    pub fn get(&self, index: u8) -> PremulColor {
        self.colors
            .get(usize::from(index))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// If every entry has full alpha.
    pub fn all_opaque(&self) -> bool {
        self.all_opaque
    }
}
