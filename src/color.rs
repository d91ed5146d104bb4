// Distributed under The MIT License (MIT)
//
// Copyright (c) 2020, 2021 The `image-rs` developers
//! Packing of colors into the supported pixel encodings.
//!
//! Packed 32-bit colors keep alpha in the highest byte followed by red, green and blue. The 16-bit
//! encodings follow the same order: `Rgb565` puts red in the top five bits and `Argb4444` puts
//! alpha in the top nibble.
use core::fmt;

/// A straight, not premultiplied, 32-bit color.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

/// A premultiplied 32-bit color, as stored in `Argb8888` pixels and palettes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct PremulColor(pub u32);

/// Ordered dither offsets for 4-bit channels, one scanline entry per row modulo four.
pub const DITHER_MATRIX_4BIT_16: [u16; 4] = [0xA280, 0x6E4C, 0x91B3, 0x5D7F];

/// Ordered dither offsets for 5 and 6-bit channels, one scanline entry per row modulo four.
pub const DITHER_MATRIX_3BIT_16: [u16; 4] = [0x5140, 0x3726, 0x4051, 0x2637];

impl Color {
    pub const TRANSPARENT: Color = Color(0);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(pack_argb32(a as u32, r as u32, g as u32, b as u32))
    }

    pub const fn alpha(self) -> u8 {
        get_a32(self.0) as u8
    }

    pub const fn red(self) -> u8 {
        get_r32(self.0) as u8
    }

    pub const fn green(self) -> u8 {
        get_g32(self.0) as u8
    }

    pub const fn blue(self) -> u8 {
        get_b32(self.0) as u8
    }

    /// Scale each color channel by the alpha fraction, rounding to nearest.
    pub fn premultiply(self) -> PremulColor {
        let a = get_a32(self.0);
        if a == 0xFF {
            return PremulColor(self.0);
        }

        PremulColor(pack_argb32(
            a,
            mul_div_255_round(get_r32(self.0), a),
            mul_div_255_round(get_g32(self.0), a),
            mul_div_255_round(get_b32(self.0), a),
        ))
    }
}

impl PremulColor {
    pub const fn alpha(self) -> u8 {
        get_a32(self.0) as u8
    }

    pub const fn is_opaque(self) -> bool {
        get_a32(self.0) == 0xFF
    }

    /// Divide the channels by the alpha fraction again.
    ///
    /// A fully transparent color has no recoverable channels and turns into transparent black.
    pub fn unpremultiply(self) -> Color {
        let a = get_a32(self.0);
        match a {
            0 => Color::TRANSPARENT,
            0xFF => Color(self.0),
            a => {
                let div = |v: u32| (v * 255 + a / 2) / a;
                Color(pack_argb32(
                    a,
                    div(get_r32(self.0)).min(0xFF),
                    div(get_g32(self.0)).min(0xFF),
                    div(get_b32(self.0)).min(0xFF),
                ))
            }
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({:#010x})", self.0)
    }
}

impl fmt::Debug for PremulColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PremulColor({:#010x})", self.0)
    }
}

pub const fn get_a32(c: u32) -> u32 {
    c >> 24
}

pub const fn get_r32(c: u32) -> u32 {
    (c >> 16) & 0xFF
}

pub const fn get_g32(c: u32) -> u32 {
    (c >> 8) & 0xFF
}

pub const fn get_b32(c: u32) -> u32 {
    c & 0xFF
}

pub const fn pack_argb32(a: u32, r: u32, g: u32, b: u32) -> u32 {
    (a << 24) | (r << 16) | (g << 8) | b
}

/// Scale an 8-bit value by `scale`, a fraction of 256.
pub const fn alpha_mul(value: u32, scale: u32) -> u32 {
    (value * scale) >> 8
}

/// Compute `a * b / 255`, rounded to nearest, without a division.
pub const fn mul_div_255_round(a: u32, b: u32) -> u32 {
    let prod = a * b + 128;
    (prod + (prod >> 8)) >> 8
}

/// Scale all four channels of a packed color by `scale`, a fraction of 256.
pub(crate) const fn alpha_mul_q(c: u32, scale: u32) -> u32 {
    let mask = 0x00FF_00FF;
    let rb = ((c & mask) * scale) >> 8;
    let ag = ((c >> 8) & mask) * scale;
    (rb & mask) | (ag & !mask)
}

/// Composite a premultiplied color over another one.
pub(crate) const fn src_over(src: u32, dst: u32) -> u32 {
    src.wrapping_add(alpha_mul_q(dst, 256 - get_a32(src)))
}

/// Pack 8-bit channels into `Rgb565`, truncating.
pub const fn pack_565(r: u32, g: u32, b: u32) -> u16 {
    (((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3)) as u16
}

/// Expand an `Rgb565` pixel into an opaque packed 32-bit color, replicating the high bits.
pub const fn expand_565(c: u16) -> u32 {
    let c = c as u32;
    let r = (c >> 11) & 0x1F;
    let g = (c >> 5) & 0x3F;
    let b = c & 0x1F;
    pack_argb32(0xFF, (r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}

/// Pack 4-bit channels into `Argb4444`.
pub const fn pack_argb4444(a: u32, r: u32, g: u32, b: u32) -> u16 {
    ((a << 12) | (r << 8) | (g << 4) | b) as u16
}

/// Pack a 32-bit color into `Argb4444`, truncating each channel.
pub const fn pack_8888_to_4444(c: u32) -> u16 {
    pack_argb4444(
        get_a32(c) >> 4,
        get_r32(c) >> 4,
        get_g32(c) >> 4,
        get_b32(c) >> 4,
    )
}

/// Expand an `Argb4444` pixel into a packed 32-bit color, replicating each nibble.
pub const fn expand_4444(c: u16) -> u32 {
    let c = c as u32;
    pack_argb32(
        replicate_nibble(c >> 12),
        replicate_nibble(c >> 8),
        replicate_nibble(c >> 4),
        replicate_nibble(c),
    )
}

const fn replicate_nibble(v: u32) -> u32 {
    let v = v & 0xF;
    (v << 4) | v
}

/// The dither offset of column `x` from a row entry of one of the dither matrices.
pub const fn dither_value(scan: u16, x: u32) -> u32 {
    ((scan as u32) >> ((x & 3) << 2)) & 0xF
}

/// Pack a premultiplied 32-bit color into `Argb4444` with an ordered dither offset.
///
/// The offset is scaled by alpha, so transparent pixels stay transparent.
pub const fn dither_argb32_to_4444(c: u32, dither: u32) -> u16 {
    let a = get_a32(c);
    let d = (dither * (a + 1)) >> 8;
    pack_argb4444(
        dither_to_4bit(a, d),
        dither_to_4bit(get_r32(c), d),
        dither_to_4bit(get_g32(c), d),
        dither_to_4bit(get_b32(c), d),
    )
}

const fn dither_to_4bit(v: u32, d: u32) -> u32 {
    (v + d - (v >> 4)) >> 4
}

/// Pack a premultiplied 32-bit color into `Rgb565` with an ordered dither offset.
pub const fn dither_rgb32_to_565(c: u32, dither: u32) -> u16 {
    let a = get_a32(c);
    let d = (dither * (a + 1)) >> 8;
    let r = get_r32(c);
    let g = get_g32(c);
    let b = get_b32(c);
    let r = (r + d - (r >> 5)) >> 3;
    let g = (g + (d >> 1) - (g >> 6)) >> 2;
    let b = (b + d - (b >> 5)) >> 3;
    ((r << 11) | (g << 5) | b) as u16
}
