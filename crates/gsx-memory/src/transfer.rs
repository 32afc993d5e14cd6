//! Host to local memory image transfers
//!
//! Transfers arrive in chunks. The caller keeps a [`TransferCursor`] between
//! chunks; each call consumes as much of its input as fits the rectangle
//! described by TRXPOS/TRXREG and leaves the cursor on the next pixel.
//!
//! Writes take one of three routes:
//! - the block route for formats that fill whole elements: unaligned edges
//!   per pixel, partial block rows column by column, the interior block by
//!   block
//! - the unpacking route for formats that only own some bits of a 32-bit
//!   word (24, 8H, 4HL, 4HH), taken when the rectangle is 8x8 aligned
//! - the streaming route, one pixel at a time through the row tables

use crate::constants::*;
use crate::format::Format;
use crate::local::LocalMemory;
use crate::psm::Access;
use crate::regs::{BitBltBuf, TrxPos, TrxReg};

/// Position of the next pixel of a transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCursor {
    pub tx: u32,
    pub ty: u32,
}

impl TransferCursor {
    /// Cursor at the start of a host to local transfer
    pub const fn for_write(trxpos: &TrxPos) -> Self {
        Self {
            tx: trxpos.dsax,
            ty: trxpos.dsay,
        }
    }

    /// Cursor at the start of a local to host transfer
    pub const fn for_read(trxpos: &TrxPos) -> Self {
        Self {
            tx: trxpos.ssax,
            ty: trxpos.ssay,
        }
    }
}

/// Pixels held by `len` bytes of a stream with `trbpp` bits per pixel
#[inline]
const fn stream_pixels(len: usize, trbpp: u32) -> usize {
    match trbpp {
        32 => len / 4,
        24 => len / 3,
        16 => len / 2,
        8 => len,
        _ => len * 2,
    }
}

/// Pixel `i` of a packed little-endian stream
#[inline]
fn fetch(src: &[u8], i: usize, trbpp: u32) -> u32 {
    match trbpp {
        32 => {
            let p = i * 4;
            u32::from_le_bytes([src[p], src[p + 1], src[p + 2], src[p + 3]])
        }
        24 => {
            let p = i * 3;
            u32::from_le_bytes([src[p], src[p + 1], src[p + 2], 0])
        }
        16 => {
            let p = i * 2;
            u16::from_le_bytes([src[p], src[p + 1]]) as u32
        }
        8 => src[i] as u32,
        _ => ((src[i >> 1] >> ((i & 1) << 2)) & 0xf) as u32,
    }
}

/// Store pixel `i` into a packed little-endian stream
#[inline]
fn store(dst: &mut [u8], i: usize, trbpp: u32, c: u32) {
    match trbpp {
        32 => dst[i * 4..i * 4 + 4].copy_from_slice(&c.to_le_bytes()),
        24 => dst[i * 3..i * 3 + 3].copy_from_slice(&c.to_le_bytes()[..3]),
        16 => dst[i * 2..i * 2 + 2].copy_from_slice(&(c as u16).to_le_bytes()),
        8 => dst[i] = c as u8,
        _ => {
            let byte = &mut dst[i >> 1];
            if i & 1 == 0 {
                *byte = (c & 0xf) as u8;
            } else {
                *byte |= ((c & 0xf) << 4) as u8;
            }
        }
    }
}

/// Rows of a transfer source starting at pixel column `l`
struct SourceRows<'a> {
    data: &'a [u8],
    pitch: usize,
    l: u32,
}

impl SourceRows<'_> {
    #[inline]
    fn pixel(&self, x: u32, row: u32, trbpp: u32) -> u32 {
        let start = row as usize * self.pitch;
        fetch(&self.data[start..start + self.pitch], (x - self.l) as usize, trbpp)
    }

    /// Bytes of `n` pixels of `row` from column `x`, if they start on a byte
    #[inline]
    fn span(&self, x: u32, row: u32, n: u32, trbpp: u32) -> Option<&[u8]> {
        let bit = (x - self.l) as usize * trbpp as usize;
        if bit & 7 != 0 {
            return None;
        }
        let start = row as usize * self.pitch + (bit >> 3);
        self.data.get(start..start + ((n * trbpp) >> 3) as usize)
    }
}

/// Decode one byte-aligned source row into `out`
///
/// Word-aligned 32-bit and halfword-aligned 16-bit rows are reinterpreted in
/// place on little-endian hosts; anything else is assembled byte by byte.
fn decode_row(bytes: &[u8], trbpp: u32, out: &mut [u32]) {
    match trbpp {
        32 => match bytemuck::try_cast_slice::<u8, u32>(bytes) {
            Ok(words) if cfg!(target_endian = "little") => out.copy_from_slice(words),
            _ => {
                for (o, c) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                    *o = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                }
            }
        },
        24 => {
            for (o, c) in out.iter_mut().zip(bytes.chunks_exact(3)) {
                *o = c[0] as u32 | (c[1] as u32) << 8 | (c[2] as u32) << 16;
            }
        }
        16 => match bytemuck::try_cast_slice::<u8, u16>(bytes) {
            Ok(halves) if cfg!(target_endian = "little") => {
                for (o, &h) in out.iter_mut().zip(halves) {
                    *o = h as u32;
                }
            }
            _ => {
                for (o, c) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                    *o = u16::from_le_bytes([c[0], c[1]]) as u32;
                }
            }
        },
        8 => {
            for (o, &b) in out.iter_mut().zip(bytes) {
                *o = b as u32;
            }
        }
        _ => {
            for (i, o) in out.iter_mut().enumerate() {
                let b = bytes[i >> 1];
                *o = (if i & 1 == 0 { b & 0xf } else { b >> 4 }) as u32;
            }
        }
    }
}

impl LocalMemory {
    /// Write a chunk of a host to local transfer
    ///
    /// `src` is consumed in pixel order; a trailing partial pixel is dropped.
    pub fn write_image(
        &mut self,
        cursor: &mut TransferCursor,
        src: &[u8],
        bitbltbuf: &BitBltBuf,
        trxpos: &TrxPos,
        trxreg: &TrxReg,
    ) {
        if self.trace_transfers {
            tracing::trace!(
                "write_image: dbp={:#x} dbw={} dpsm={:#x} at ({}, {}) {}x{} cursor ({}, {}) {} bytes",
                bitbltbuf.dbp,
                bitbltbuf.dbw,
                bitbltbuf.dpsm,
                trxpos.dsax,
                trxpos.dsay,
                trxreg.rrw,
                trxreg.rrh,
                cursor.tx,
                cursor.ty,
                src.len()
            );
        }

        crate::with_format!(bitbltbuf.dpsm, F => match F::ACCESS {
            Access::P24 | Access::P8H | Access::P4HL | Access::P4HH => {
                self.write_image_unpacked::<F>(cursor, src, bitbltbuf, trxpos, trxreg)
            }
            _ => self.write_image_aligned::<F>(cursor, src, bitbltbuf, trxpos, trxreg),
        })
    }

    /// Write a chunk through the block route
    pub fn write_image_aligned<F: Format>(
        &mut self,
        cursor: &mut TransferCursor,
        src: &[u8],
        bitbltbuf: &BitBltBuf,
        trxpos: &TrxPos,
        trxreg: &TrxReg,
    ) {
        if trxreg.rrw == 0 {
            return;
        }

        let (bsx, bsy) = (F::BSX, F::BSY);
        let l = trxpos.dsax;
        let r = l + trxreg.rrw;
        let mut src = src;

        if cursor.tx != l {
            let n = src.len().min(((r.saturating_sub(cursor.tx) * F::TRBPP) >> 3) as usize);
            self.write_image_x::<F>(cursor, &src[..n], bitbltbuf, trxpos, trxreg);
            src = &src[n..];
        }

        let la = (l + bsx - 1) & !(bsx - 1);
        let ra = r & !(bsx - 1);
        let pitch = (((r - l) * F::TRBPP + 7) >> 3) as usize;
        let h = (src.len() / pitch) as u32;

        if ra >= la + bsx && h > 0 && cursor.tx == l {
            let (rows, rest) = src.split_at(pitch * h as usize);
            let rows = SourceRows { data: rows, pitch, l };
            let ty = cursor.ty;

            if l < la {
                self.write_pixels::<F>(l, la, ty, h, &rows, 0, bitbltbuf);
            }

            if ra < r {
                self.write_pixels::<F>(ra, r, ty, h, &rows, 0, bitbltbuf);
            }

            let (mut y, mut h, mut row) = (ty, h, 0);

            let h2 = h.min(bsy - (y & (bsy - 1)));
            if h2 < bsy {
                self.write_band::<F>(la, ra, y, h2, &rows, row, bitbltbuf);
                y += h2;
                h -= h2;
                row += h2;
            }

            let h2 = h & !(bsy - 1);
            if h2 > 0 {
                self.write_tiles::<F>(la, ra, y, h2, bsy, &rows, row, bitbltbuf);
                y += h2;
                h -= h2;
                row += h2;
            }

            if h > 0 {
                self.write_band::<F>(la, ra, y, h, &rows, row, bitbltbuf);
                y += h;
            }

            cursor.ty = y;
            src = rest;
        }

        if !src.is_empty() {
            self.write_image_x::<F>(cursor, src, bitbltbuf, trxpos, trxreg);
        }
    }

    /// Write a chunk through the unpacking route
    ///
    /// Only whole, 8x8 aligned rectangles starting on a row boundary take the
    /// block path; anything else streams pixel by pixel.
    pub fn write_image_unpacked<F: Format>(
        &mut self,
        cursor: &mut TransferCursor,
        src: &[u8],
        bitbltbuf: &BitBltBuf,
        trxpos: &TrxPos,
        trxreg: &TrxReg,
    ) {
        if trxreg.rrw == 0 {
            return;
        }

        let tw = trxpos.dsax + trxreg.rrw;
        let pitch = ((trxreg.rrw * F::TRBPP) >> 3) as usize;
        let th = if pitch > 0 { (src.len() / pitch) as u32 } else { 0 };

        let aligned = is_top_left_aligned(trxpos.dsax, cursor.tx, cursor.ty, 8, 8);

        if !aligned || tw & 7 != 0 || th & 7 != 0 || pitch == 0 || src.len() % pitch != 0 {
            tracing::trace!(
                "Unaligned {:?} transfer at ({}, {}) {}x{}, streaming per pixel",
                F::PSM,
                cursor.tx,
                cursor.ty,
                trxreg.rrw,
                th
            );
            self.write_image_x::<F>(cursor, src, bitbltbuf, trxpos, trxreg);
            return;
        }

        let rows = SourceRows {
            data: src,
            pitch,
            l: cursor.tx,
        };
        self.write_tiles::<F>(cursor.tx, tw, cursor.ty, th, 8, &rows, 0, bitbltbuf);
        cursor.ty += th;
    }

    /// Stream pixels into the transfer rectangle
    pub fn write_image_x<F: Format>(
        &mut self,
        cursor: &mut TransferCursor,
        src: &[u8],
        bitbltbuf: &BitBltBuf,
        trxpos: &TrxPos,
        trxreg: &TrxReg,
    ) {
        let count = stream_pixels(src.len(), F::TRBPP);
        if count == 0 || trxreg.rrw == 0 {
            return;
        }

        let (bp, bw) = (bitbltbuf.dbp, bitbltbuf.dbw);
        let sx = trxpos.dsax;
        let ex = sx + trxreg.rrw;

        let (mut x, mut y) = (cursor.tx, cursor.ty);
        let mut i = 0;

        while i < count {
            let addr = F::pa(0, y, bp, bw);
            let offset = F::row_offset(y);

            while i < count && x < ex {
                let c = fetch(src, i, F::TRBPP);
                F::write_pixel(&mut self.vram, addr.wrapping_add_signed(offset[x as usize & (ROW_TABLE_LEN - 1)]), c);
                i += 1;
                x += 1;
            }

            if x >= ex {
                // Rows of 4-bit data start on a byte boundary
                if F::TRBPP == 4 && i & 1 != 0 {
                    i += 1;
                }
                x = sx;
                y += 1;
            }
        }

        cursor.tx = x;
        cursor.ty = y;
    }

    /// Read a chunk of a local to host transfer
    pub fn read_image(
        &self,
        cursor: &mut TransferCursor,
        dst: &mut [u8],
        bitbltbuf: &BitBltBuf,
        trxpos: &TrxPos,
        trxreg: &TrxReg,
    ) {
        if self.trace_transfers {
            tracing::trace!(
                "read_image: sbp={:#x} sbw={} spsm={:#x} at ({}, {}) {}x{} cursor ({}, {}) {} bytes",
                bitbltbuf.sbp,
                bitbltbuf.sbw,
                bitbltbuf.spsm,
                trxpos.ssax,
                trxpos.ssay,
                trxreg.rrw,
                trxreg.rrh,
                cursor.tx,
                cursor.ty,
                dst.len()
            );
        }

        crate::with_format!(bitbltbuf.spsm, F => self.read_image_x::<F>(cursor, dst, bitbltbuf, trxpos, trxreg))
    }

    /// Stream pixels out of the transfer rectangle
    pub fn read_image_x<F: Format>(
        &self,
        cursor: &mut TransferCursor,
        dst: &mut [u8],
        bitbltbuf: &BitBltBuf,
        trxpos: &TrxPos,
        trxreg: &TrxReg,
    ) {
        let count = stream_pixels(dst.len(), F::TRBPP);
        if count == 0 || trxreg.rrw == 0 {
            return;
        }

        let (bp, bw) = (bitbltbuf.sbp, bitbltbuf.sbw);
        let sx = trxpos.ssax;
        let ex = sx + trxreg.rrw;

        let (mut x, mut y) = (cursor.tx, cursor.ty);
        let mut i = 0;

        while i < count {
            let addr = F::pa(0, y, bp, bw);
            let offset = F::row_offset(y);

            while i < count && x < ex {
                let c = F::read_pixel(&self.vram, addr.wrapping_add_signed(offset[x as usize & (ROW_TABLE_LEN - 1)]));
                store(dst, i, F::TRBPP, c);
                i += 1;
                x += 1;
            }

            if x >= ex {
                if F::TRBPP == 4 && i & 1 != 0 {
                    i += 1;
                }
                x = sx;
                y += 1;
            }
        }

        cursor.tx = x;
        cursor.ty = y;
    }

    /// Write columns `l..r` of `h` source rows one pixel at a time
    #[allow(clippy::too_many_arguments)]
    fn write_pixels<F: Format>(&mut self, l: u32, r: u32, y: u32, h: u32, rows: &SourceRows, row: u32, bitbltbuf: &BitBltBuf) {
        let (bp, bw) = (bitbltbuf.dbp, bitbltbuf.dbw);

        for j in 0..h {
            for x in l..r {
                let c = rows.pixel(x, row + j, F::TRBPP);
                F::write_pixel(&mut self.vram, F::pa(x, y + j, bp, bw), c);
            }
        }
    }

    /// Write a block-aligned span of fewer than `bsy` rows
    ///
    /// Rows above the first whole column are merged into their column, whole
    /// columns are written as units, and the remaining rows are merged last.
    #[allow(clippy::too_many_arguments)]
    fn write_band<F: Format>(&mut self, l: u32, r: u32, y: u32, h: u32, rows: &SourceRows, row: u32, bitbltbuf: &BitBltBuf) {
        let csy = F::BSY / 4;
        let (mut y, mut h, mut row) = (y, h, row);

        let y2 = y & (csy - 1);
        if y2 > 0 {
            let h2 = h.min(csy - y2);
            self.write_tiles::<F>(l, r, y, h2, h2, rows, row, bitbltbuf);
            y += h2;
            h -= h2;
            row += h2;
        }

        let h2 = h & !(csy - 1);
        if h2 > 0 {
            self.write_tiles::<F>(l, r, y, h2, csy, rows, row, bitbltbuf);
            y += h2;
            h -= h2;
            row += h2;
        }

        if h > 0 {
            self.write_tiles::<F>(l, r, y, h, h, rows, row, bitbltbuf);
        }
    }

    /// Write `h` rows of block-aligned columns `l..r` in tiles `F::BSX` wide
    /// and `th` tall
    ///
    /// Each tile lies inside one block. Its rows are decoded whole and stored
    /// into the block's words through the column table; 4-bit rows starting
    /// mid-byte are gathered pixel by pixel first.
    #[allow(clippy::too_many_arguments)]
    fn write_tiles<F: Format>(
        &mut self,
        l: u32,
        r: u32,
        y: u32,
        h: u32,
        th: u32,
        rows: &SourceRows,
        row: u32,
        bitbltbuf: &BitBltBuf,
    ) {
        let (bp, bw) = (bitbltbuf.dbp, bitbltbuf.dbw);
        let mut line = [0u32; MAX_BLOCK_WIDTH];
        let line = &mut line[..F::BSX as usize];

        let mut ty = 0;
        while ty < h {
            let rows_in_tile = th.min(h - ty);
            let y0 = y + ty;

            for x0 in (l..r).step_by(F::BSX as usize) {
                let bn = F::bn(x0, y0, bp, bw);

                for j in 0..rows_in_tile {
                    let src_row = row + ty + j;
                    match rows.span(x0, src_row, F::BSX, F::TRBPP) {
                        Some(bytes) => decode_row(bytes, F::TRBPP, line),
                        None => {
                            for (i, c) in line.iter_mut().enumerate() {
                                *c = rows.pixel(x0 + i as u32, src_row, F::TRBPP);
                            }
                        }
                    }

                    let block = self.vram.block_mut(bn);
                    for (i, &c) in line.iter().enumerate() {
                        let index = F::SWIZZLE.column_offset(x0 + i as u32, y0 + j) as usize;
                        F::ACCESS.write_block(block, index, c);
                    }
                }
            }

            ty += rows_in_tile;
        }
    }
}

/// Whether a transfer starts at the left edge of its rectangle on an
/// `bw` x `bh` grid
pub const fn is_top_left_aligned(dsax: u32, tx: u32, ty: u32, bw: u32, bh: u32) -> bool {
    dsax & (bw - 1) == 0 && tx & (bw - 1) == 0 && dsax == tx && ty & (bh - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsx_core::config::Config;

    #[test]
    fn test_stream_codec() {
        let src = [0x21u8, 0x43, 0x65, 0x87, 0xa9, 0xcb];
        assert_eq!(fetch(&src, 0, 32), 0x8765_4321);
        assert_eq!(fetch(&src, 1, 24), 0x00cb_a987);
        assert_eq!(fetch(&src, 2, 16), 0xcba9);
        assert_eq!(fetch(&src, 3, 8), 0x87);
        assert_eq!(fetch(&src, 0, 4), 0x1);
        assert_eq!(fetch(&src, 1, 4), 0x2);

        let mut dst = [0u8; 4];
        store(&mut dst, 0, 4, 0xa);
        store(&mut dst, 1, 4, 0x5);
        assert_eq!(dst[0], 0x5a);

        let mut dst = [0u8; 6];
        store(&mut dst, 1, 24, 0xffee_ddcc);
        assert_eq!(&dst[3..], &[0xcc, 0xdd, 0xee]);
    }

    #[test]
    fn test_top_left_alignment() {
        assert!(is_top_left_aligned(8, 8, 16, 8, 8));
        assert!(!is_top_left_aligned(8, 16, 16, 8, 8));
        assert!(!is_top_left_aligned(4, 4, 0, 8, 8));
        assert!(!is_top_left_aligned(0, 0, 3, 8, 8));
    }

    #[test]
    fn test_ct32_8x8_block() {
        let mut mem = LocalMemory::new(&Config::default()).unwrap();
        let bitbltbuf = BitBltBuf {
            dbw: 1,
            ..Default::default()
        };
        let trxpos = TrxPos::default();
        let trxreg = TrxReg { rrw: 8, rrh: 8 };
        let src: Vec<u8> = std::iter::repeat(0xAABB_CCDDu32.to_le_bytes()).take(64).flatten().collect();

        let mut cursor = TransferCursor::for_write(&trxpos);
        mem.write_image(&mut cursor, &src, &bitbltbuf, &trxpos, &trxreg);

        assert_eq!(mem.read_pixel(3, 5, 0x00, 0, 1), 0xAABB_CCDD);
        assert_eq!(cursor, TransferCursor { tx: 0, ty: 8 });
        assert_eq!(mem.read_pixel(8, 0, 0x00, 0, 1), 0);
    }

    #[test]
    fn test_t4_stream_packing() {
        let mut mem = LocalMemory::new(&Config::default()).unwrap();
        let bitbltbuf = BitBltBuf {
            dbw: 2,
            dpsm: 0x14,
            sbw: 2,
            spsm: 0x14,
            ..Default::default()
        };
        let trxpos = TrxPos::default();
        let trxreg = TrxReg { rrw: 2, rrh: 1 };

        let mut cursor = TransferCursor::for_write(&trxpos);
        mem.write_image(&mut cursor, &[0x5a], &bitbltbuf, &trxpos, &trxreg);
        assert_eq!(mem.read_pixel(0, 0, 0x14, 0, 2), 0xa);
        assert_eq!(mem.read_pixel(1, 0, 0x14, 0, 2), 0x5);

        let mut out = [0u8; 1];
        let mut cursor = TransferCursor::for_read(&trxpos);
        mem.read_image(&mut cursor, &mut out, &bitbltbuf, &trxpos, &trxreg);
        assert_eq!(out[0], 0x5a);
        assert_eq!(cursor, TransferCursor { tx: 0, ty: 1 });
    }

    #[test]
    fn test_odd_width_t4_rows_are_byte_aligned() {
        let mut mem = LocalMemory::new(&Config::default()).unwrap();
        let bitbltbuf = BitBltBuf {
            dbw: 2,
            dpsm: 0x14,
            ..Default::default()
        };
        let trxpos = TrxPos::default();
        let trxreg = TrxReg { rrw: 3, rrh: 2 };

        let mut cursor = TransferCursor::for_write(&trxpos);
        mem.write_image(&mut cursor, &[0x21, 0x03, 0x54, 0x06], &bitbltbuf, &trxpos, &trxreg);

        let row0: Vec<u32> = (0..4).map(|x| mem.read_pixel(x, 0, 0x14, 0, 2)).collect();
        let row1: Vec<u32> = (0..3).map(|x| mem.read_pixel(x, 1, 0x14, 0, 2)).collect();
        assert_eq!(row0, vec![1, 2, 3, 0]);
        assert_eq!(row1, vec![4, 5, 6]);
        assert_eq!(cursor, TransferCursor { tx: 0, ty: 2 });
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut mem = LocalMemory::new(&Config::default()).unwrap();
        let bitbltbuf = BitBltBuf {
            dbw: 1,
            ..Default::default()
        };
        let trxpos = TrxPos::default();
        let trxreg = TrxReg { rrw: 0, rrh: 8 };
        let mut cursor = TransferCursor::default();
        mem.write_image(&mut cursor, &[0xff; 64], &bitbltbuf, &trxpos, &trxreg);
        assert_eq!(cursor, TransferCursor::default());
        assert!(mem.vram().words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_partial_pixel_dropped() {
        let mut mem = LocalMemory::new(&Config::default()).unwrap();
        let bitbltbuf = BitBltBuf {
            dbw: 1,
            ..Default::default()
        };
        let trxpos = TrxPos::default();
        let trxreg = TrxReg { rrw: 4, rrh: 1 };
        let mut cursor = TransferCursor::default();
        mem.write_image(&mut cursor, &[1, 0, 0, 0, 2, 0, 0], &bitbltbuf, &trxpos, &trxreg);
        assert_eq!(mem.read_pixel(0, 0, 0, 0, 1), 1);
        assert_eq!(mem.read_pixel(1, 0, 0, 0, 1), 0);
        assert_eq!(cursor, TransferCursor { tx: 1, ty: 0 });
    }
}
