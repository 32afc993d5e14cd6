//! Texture readback into 32-bit RGBA
//!
//! The destination is a byte buffer of little-endian texels, `dst_pitch`
//! bytes per row, with `rect.left, rect.top` at offset 0.

use crate::constants::*;
use crate::local::LocalMemory;
use crate::offset::{GsOffset, Rect};
use crate::psm::{psm_info, Psm, PsmInfo};
use crate::regs::Texa;
use crate::swizzle::Swizzle;

#[inline]
fn put(dst: &mut [u8], offset: usize, c: u32) {
    dst[offset..offset + 4].copy_from_slice(&c.to_le_bytes());
}

impl LocalMemory {
    /// Read `rect` of the buffer described by `off`
    ///
    /// Block-aligned parts are read a block at a time, the rest texel by
    /// texel.
    pub fn read_texture(&self, off: &GsOffset, rect: &Rect, dst: &mut [u8], dst_pitch: usize, texa: &Texa) {
        if rect.is_empty() {
            return;
        }

        if off.psm == Psm::Gpu24.id() {
            self.read_texture_gpu24(off, rect, dst, dst_pitch);
            return;
        }

        let info = psm_info(off.psm);
        let bs = info.bs;

        if rect.width() < bs.x as i32 || rect.height() < bs.y as i32 || !rect.is_aligned(bs) {
            let cr = rect.align_inside(bs);

            if cr.is_empty() {
                self.read_texels(off, info, rect, rect, dst, dst_pitch, texa);
                return;
            }

            let top = Rect::new(rect.left, rect.top, rect.right, cr.top);
            let bottom = Rect::new(rect.left, cr.bottom, rect.right, rect.bottom);
            let left = Rect::new(rect.left, cr.top, cr.left, cr.bottom);
            let right = Rect::new(cr.right, cr.top, rect.right, cr.bottom);

            for edge in [top, bottom, left, right] {
                if !edge.is_empty() {
                    self.read_texels(off, info, &edge, rect, dst, dst_pitch, texa);
                }
            }

            self.read_blocks(off, info, &cr, rect, dst, dst_pitch, texa);
        } else {
            self.read_blocks(off, info, rect, rect, dst, dst_pitch, texa);
        }
    }

    /// Expand block `bp` to 32-bit texels at the start of `dst`
    ///
    /// GPU24 blocks come out as raw 16-bit values.
    pub fn read_texture_block(&self, bp: u32, psm: u32, dst: &mut [u8], dst_pitch: usize, texa: &Texa) {
        let info = psm_info(psm);
        let base = (bp & BLOCK_MASK) << info.swizzle.block_shift();
        let raw = psm & 0x3f == Psm::Gpu24.id();

        for j in 0..info.bs.y {
            let row = j as usize * dst_pitch;

            for i in 0..info.bs.x {
                let addr = base + info.swizzle.column_offset(i, j);
                let c = if raw {
                    self.vram.read16(addr) as u32
                } else {
                    info.access.read_texel(&self.vram, addr, &self.clut()[..], texa)
                };
                put(dst, row + i as usize * 4, c);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_texels(
        &self,
        off: &GsOffset,
        info: &PsmInfo,
        r: &Rect,
        origin: &Rect,
        dst: &mut [u8],
        dst_pitch: usize,
        texa: &Texa,
    ) {
        let clut = &self.clut()[..];

        for y in r.top..r.bottom {
            let row = (y - origin.top) as usize * dst_pitch;

            for x in r.left..r.right {
                let addr = info.pa(x as u32, y as u32, off.bp, off.bw);
                let c = info.access.read_texel(&self.vram, addr, clut, texa);
                put(dst, row + (x - origin.left) as usize * 4, c);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_blocks(
        &self,
        off: &GsOffset,
        info: &PsmInfo,
        r: &Rect,
        origin: &Rect,
        dst: &mut [u8],
        dst_pitch: usize,
        texa: &Texa,
    ) {
        for y in (r.top..r.bottom).step_by(info.bs.y as usize) {
            let base = off.block_row((y >> 3) as usize);
            let row = (y - origin.top) as usize * dst_pitch;

            for x in (r.left..r.right).step_by(info.bs.x as usize) {
                let bn = base.wrapping_add_signed(off.block_col((x >> 3) as usize) as i32) & BLOCK_MASK;
                let start = row + (x - origin.left) as usize * 4;
                self.read_texture_block(bn, off.psm, &mut dst[start..], dst_pitch, texa);
            }
        }
    }

    /// GPU24 keeps packed 24-bit RGB in 16-bit storage
    ///
    /// Each row of halfwords is a byte stream; texel `x` is bytes
    /// `3x..3x + 3` of it. Alpha is zero.
    fn read_texture_gpu24(&self, off: &GsOffset, rect: &Rect, dst: &mut [u8], dst_pitch: usize) {
        let swizzle = Swizzle::S16;

        for y in rect.top..rect.bottom {
            let row = (y - rect.top) as usize * dst_pitch;
            let byte = |b: u32| {
                let half = self.vram.read16(swizzle.pixel_address(b >> 1, y as u32, off.bp, off.bw));
                ((half >> ((b & 1) * 8)) & 0xff) as u32
            };

            for x in rect.left..rect.right {
                let b = x as u32 * 3;
                let c = byte(b) | (byte(b + 1) << 8) | (byte(b + 2) << 16);
                put(dst, row + (x - rect.left) as usize * 4, c);
            }
        }
    }
}
