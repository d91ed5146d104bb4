//! Box filters halving an image in both directions.
//!
//! Every kernel writes each pixel of the destination as the average of the 2×2 block of source
//! pixels it covers. A block at an odd right or bottom edge reuses the last column or row. The
//! channels are averaged in lanes wide enough to hold the sum of four samples.
use crate::format::PixelFormat;
use crate::stride::{ByteRows, ByteRowsMut};

/// Fills `dst` from a source of twice its dimensions, rounded up.
pub(crate) type Kernel = fn(&ByteRows<'_>, &mut ByteRowsMut<'_>);

/// The kernel for a format, if it supports mip chains.
pub(crate) fn kernel_for(format: PixelFormat) -> Option<Kernel> {
    match format {
        PixelFormat::Argb8888 => Some(downsample_8888),
        PixelFormat::Rgb565 => Some(downsample_565),
        PixelFormat::Argb4444 => Some(downsample_4444),
        PixelFormat::None | PixelFormat::Alpha1 | PixelFormat::Alpha8 | PixelFormat::Index8 => {
            None
        }
    }
}

/// The source coordinates of the 2×2 block behind destination `(x, y)`.
fn block(src: &ByteRows<'_>, x: u32, y: u32) -> [(u32, u32); 4] {
    let layout = src.layout();
    let (x0, y0) = (2 * x, 2 * y);
    let x1 = if x0 + 1 < layout.width { x0 + 1 } else { x0 };
    let y1 = if y0 + 1 < layout.height { y0 + 1 } else { y0 };
    [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
}

fn downsample_8888(src: &ByteRows<'_>, dst: &mut ByteRowsMut<'_>) {
    let layout = dst.layout();
    for y in 0..layout.height {
        let row = dst.row_u32_mut(y);
        for (x, out) in (0..layout.width).zip(row.iter_mut()) {
            let (mut ag, mut rb) = (0u32, 0u32);
            for (sx, sy) in block(src, x, y) {
                let c = src.row_u32(sy)[sx as usize];
                ag += (c >> 8) & 0x00FF_00FF;
                rb += c & 0x00FF_00FF;
            }

            *out = ((rb >> 2) & 0x00FF_00FF) | ((ag << 6) & 0xFF00_FF00);
        }
    }
}

/// Move green out of the way so that all channels have room for carries.
fn expand_16(c: u16) -> u32 {
    let c = u32::from(c);
    (c & !0x07E0) | ((c & 0x07E0) << 16)
}

fn pack_16(c: u32) -> u16 {
    ((c & !0x07E0) | ((c >> 16) & 0x07E0)) as u16
}

fn downsample_565(src: &ByteRows<'_>, dst: &mut ByteRowsMut<'_>) {
    let layout = dst.layout();
    for y in 0..layout.height {
        let row = dst.row_u16_mut(y);
        for (x, out) in (0..layout.width).zip(row.iter_mut()) {
            let sum: u32 = block(src, x, y)
                .iter()
                .map(|&(sx, sy)| expand_16(src.row_u16(sy)[sx as usize]))
                .sum();
            *out = pack_16(sum >> 2);
        }
    }
}

/// Spread the nibbles into two lanes with room for carries.
fn expand_4444(c: u16) -> u32 {
    let c = u32::from(c);
    (c & 0x0F0F) | ((c & 0xF0F0) << 12)
}

fn collapse_4444(c: u32) -> u16 {
    ((c & 0x0F0F) | ((c >> 12) & 0xF0F0)) as u16
}

fn downsample_4444(src: &ByteRows<'_>, dst: &mut ByteRowsMut<'_>) {
    let layout = dst.layout();
    for y in 0..layout.height {
        let row = dst.row_u16_mut(y);
        for (x, out) in (0..layout.width).zip(row.iter_mut()) {
            let sum: u32 = block(src, x, y)
                .iter()
                .map(|&(sx, sy)| expand_4444(src.row_u16(sy)[sx as usize]))
                .sum();
            *out = collapse_4444(sum >> 2);
        }
    }
}
