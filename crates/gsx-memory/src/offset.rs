//! Per-buffer offset tables
//!
//! A [`GsOffset`] precomputes the block and pixel row bases of one
//! (bp, bw, psm) buffer so that any pixel address becomes a row lookup plus a
//! column lookup. [`PixelOffset`] does the same for a frame/depth buffer pair
//! and [`Page2TileMap`] lists which 8x8 tiles of a texture land in each page.

use crate::constants::*;
use crate::psm::{psm_info, Size};
use crate::regs::{Frame, Tex0, Zbuf};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};

/// Integer rectangle, right and bottom exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Grow to the smallest enclosing rectangle aligned to `bs`
    pub fn align_outside(&self, bs: Size) -> Self {
        let (mx, my) = (bs.x as i32 - 1, bs.y as i32 - 1);
        Self {
            left: self.left & !mx,
            top: self.top & !my,
            right: (self.right + mx) & !mx,
            bottom: (self.bottom + my) & !my,
        }
    }

    /// Shrink to the largest enclosed rectangle aligned to `bs`
    pub fn align_inside(&self, bs: Size) -> Self {
        let (mx, my) = (bs.x as i32 - 1, bs.y as i32 - 1);
        Self {
            left: (self.left + mx) & !mx,
            top: (self.top + my) & !my,
            right: self.right & !mx,
            bottom: self.bottom & !my,
        }
    }

    /// Whether every edge sits on a multiple of `bs`
    pub fn is_aligned(&self, bs: Size) -> bool {
        self.align_inside(bs) == *self
    }
}

/// Page bitmap: one bit per page of local memory
pub type PageBits = [u32; (MAX_PAGES / 32) as usize];

#[inline]
fn page_of(base: u32, col: i16) -> u32 {
    (base.wrapping_add_signed(col as i32) & BLOCK_MASK) >> 5
}

/// Address tables for one buffer
pub struct GsOffset {
    pub hash: u32,
    pub bp: u32,
    pub bw: u32,
    pub psm: u32,
    block_row: Box<[u32]>,
    block_col: &'static [i16; BLOCK_TABLE_LEN],
    pixel_row: Box<[u32]>,
    pixel_col: [&'static [i32]; 8],
    pages_as_bits: Box<[OnceCell<PageBits>]>,
}

impl GsOffset {
    pub fn new(bp: u32, bw: u32, psm: u32) -> Self {
        let psm = psm & 0x3f;
        let info = psm_info(psm);

        let block_row = (0..BLOCK_TABLE_LEN as u32).map(|i| info.bn(0, i << 3, bp, bw)).collect();
        let pixel_row = (0..ROW_TABLE_LEN as u32)
            .map(|i| info.pa(0, i & (MAX_COORD - 1), bp, bw))
            .collect();
        let pixel_col = std::array::from_fn(|y| info.row_offset(y as u32));

        Self {
            hash: Self::hash_of(bp, bw, psm),
            bp,
            bw,
            psm,
            block_row,
            block_col: info.block_offset(),
            pixel_row,
            pixel_col,
            pages_as_bits: (0..256).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Cache key of a buffer
    pub const fn hash_of(bp: u32, bw: u32, psm: u32) -> u32 {
        (bp & 0x3fff) | ((bw & 0x3f) << 14) | ((psm & 0x3f) << 20)
    }

    /// Block number of block row `i` (y = i * 8), column 0
    #[inline]
    pub fn block_row(&self, i: usize) -> u32 {
        self.block_row[i & (BLOCK_TABLE_LEN - 1)]
    }

    /// Block number delta of block column `i` (x = i * 8)
    #[inline]
    pub fn block_col(&self, i: usize) -> i16 {
        self.block_col[i & (BLOCK_TABLE_LEN - 1)]
    }

    /// Element address of pixel row `y`, column 0
    #[inline]
    pub fn pixel_row(&self, y: u32) -> u32 {
        self.pixel_row[y as usize & (ROW_TABLE_LEN - 1)]
    }

    /// Column deltas for pixel row `y`
    #[inline]
    pub fn pixel_col(&self, y: u32) -> &'static [i32] {
        self.pixel_col[(y & 7) as usize]
    }

    /// Element address of `(x, y)` through the row and column tables
    #[inline]
    pub fn pixel_address(&self, x: u32, y: u32) -> u32 {
        let col = self.pixel_col(y)[x as usize & (ROW_TABLE_LEN - 1)];
        self.pixel_row(y).wrapping_add_signed(col)
    }

    /// Block number of `(x, y)` through the block tables
    #[inline]
    pub fn block_number(&self, x: u32, y: u32) -> u32 {
        self.block_row((y >> 3) as usize)
            .wrapping_add_signed(self.block_col((x >> 3) as usize) as i32)
            & BLOCK_MASK
    }

    fn page_step(&self) -> Size {
        let info = psm_info(self.psm);
        if self.bp & 31 == 0 {
            info.pgs
        } else {
            info.bs
        }
    }

    fn for_each_page(&self, rect: &Rect, mut f: impl FnMut(u32)) {
        let bs = self.page_step();
        let r = rect.align_outside(bs);
        let (left, top, right, bottom) = (r.left >> 3, r.top >> 3, r.right >> 3, r.bottom >> 3);
        let (sx, sy) = ((bs.x >> 3) as usize, (bs.y >> 3) as usize);

        if left >= right || top >= bottom {
            return;
        }

        for y in (top.max(0) as usize..bottom as usize).step_by(sy) {
            let base = self.block_row(y);
            for x in (left.max(0) as usize..right as usize).step_by(sx) {
                f(page_of(base, self.block_col(x)) % MAX_PAGES);
            }
        }
    }

    /// Pages touched by `rect`, each listed once in visit order
    ///
    /// The rectangle is first grown to whole pages when the buffer is page
    /// aligned, or to whole blocks otherwise.
    pub fn pages(&self, rect: &Rect) -> Vec<u32> {
        let mut seen: PageBits = [0; (MAX_PAGES / 32) as usize];
        let mut pages = Vec::new();

        self.for_each_page(rect, |n| {
            let row = &mut seen[(n >> 5) as usize];
            let col = 1 << (n & 31);
            if *row & col == 0 {
                *row |= col;
                pages.push(n);
            }
        });

        pages
    }

    /// Pages touched by `rect` as a bitmap
    pub fn pages_as_bits(&self, rect: &Rect) -> PageBits {
        let mut bits: PageBits = [0; (MAX_PAGES / 32) as usize];
        self.for_each_page(rect, |n| bits[(n >> 5) as usize] |= 1 << (n & 31));
        bits
    }

    /// Pages touched by a whole texture of the size given in `tex0`
    ///
    /// Results are cached per (TW, TH) pair.
    pub fn pages_as_bits_tex0(&self, tex0: &Tex0) -> &PageBits {
        let key = tex0.size_key() as usize;
        self.pages_as_bits[key].get_or_init(|| {
            let (tw, th) = (tex0.tw.min(10), tex0.th.min(10));
            self.pages_as_bits(&Rect::new(0, 0, 1 << tw, 1 << th))
        })
    }
}

impl std::fmt::Debug for GsOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsOffset")
            .field("bp", &self.bp)
            .field("bw", &self.bw)
            .field("psm", &self.psm)
            .finish()
    }
}

/// Frame and depth element offsets of one pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FzOffset {
    pub frame: i32,
    pub depth: i32,
}

/// Cache key of a frame/depth pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelOffsetKey {
    pub fbp: u32,
    pub zbp: u32,
    pub bw: u32,
    pub fpsm: u32,
    pub zpsm: u32,
}

impl PixelOffsetKey {
    pub fn new(frame: &Frame, zbuf: &Zbuf) -> Self {
        Self {
            fbp: frame.fbp,
            zbp: zbuf.zbp,
            bw: frame.fbw,
            fpsm: frame.psm,
            zpsm: zbuf.full_psm(),
        }
    }

    /// Packed 32-bit hash
    ///
    /// Distinct keys can collide here; the cache keys on the full struct.
    pub const fn hash(&self) -> u32 {
        const fn psm_hash(psm: u32) -> u32 {
            (psm & 0x0f) ^ ((psm & 0x30) >> 2)
        }

        self.fbp
            | (self.zbp << 9)
            | (self.bw << 18)
            | (psm_hash(self.fpsm) << 24)
            | (psm_hash(self.zpsm) << 28)
    }
}

fn fz_rows(key: &PixelOffsetKey) -> Box<[FzOffset]> {
    let (finfo, zinfo) = (psm_info(key.fpsm), psm_info(key.zpsm));
    let (fs, zs) = (finfo.bpp >> 5, zinfo.bpp >> 5);
    let (fbp, zbp) = (key.fbp << 5, key.zbp << 5);

    (0..MAX_COORD)
        .map(|i| FzOffset {
            frame: (finfo.pa(0, i, fbp, key.bw) as i32) << fs,
            depth: (zinfo.pa(0, i, zbp, key.bw) as i32) << zs,
        })
        .collect()
}

fn fz_cols(key: &PixelOffsetKey, count: usize, step: usize) -> Box<[FzOffset]> {
    let (finfo, zinfo) = (psm_info(key.fpsm), psm_info(key.zpsm));
    let (fs, zs) = (finfo.bpp >> 5, zinfo.bpp >> 5);
    let (frow, zrow) = (finfo.row_offset(0), zinfo.row_offset(0));

    (0..count)
        .map(|i| FzOffset {
            frame: frow[i * step] << fs,
            depth: zrow[i * step] << zs,
        })
        .collect()
}

/// Combined frame/depth addressing for every pixel column
pub struct PixelOffset {
    pub key: PixelOffsetKey,
    pub hash: u32,
    /// Block base pointers
    pub fbp: u32,
    pub zbp: u32,
    row: Box<[FzOffset]>,
    col: Box<[FzOffset]>,
}

impl PixelOffset {
    pub fn new(key: PixelOffsetKey) -> Self {
        Self {
            hash: key.hash(),
            fbp: key.fbp << 5,
            zbp: key.zbp << 5,
            row: fz_rows(&key),
            col: fz_cols(&key, MAX_COORD as usize, 1),
            key,
        }
    }

    #[inline]
    pub fn row(&self, y: u32) -> FzOffset {
        self.row[(y & (MAX_COORD - 1)) as usize]
    }

    #[inline]
    pub fn col(&self, x: u32) -> FzOffset {
        self.col[(x & (MAX_COORD - 1)) as usize]
    }

    /// Scaled offsets of `(x, y)`: byte offsets for 32-bit formats, halfword
    /// offsets for 16-bit ones
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> FzOffset {
        let (r, c) = (self.row(y), self.col(x));
        FzOffset {
            frame: r.frame.wrapping_add(c.frame),
            depth: r.depth.wrapping_add(c.depth),
        }
    }
}

/// Like [`PixelOffset`] with columns sampled every fourth pixel
pub struct PixelOffset4 {
    pub key: PixelOffsetKey,
    pub hash: u32,
    pub fbp: u32,
    pub zbp: u32,
    row: Box<[FzOffset]>,
    col: Box<[FzOffset]>,
}

impl PixelOffset4 {
    pub fn new(key: PixelOffsetKey) -> Self {
        Self {
            hash: key.hash(),
            fbp: key.fbp << 5,
            zbp: key.zbp << 5,
            row: fz_rows(&key),
            col: fz_cols(&key, (MAX_COORD / 4) as usize, 4),
            key,
        }
    }

    #[inline]
    pub fn row(&self, y: u32) -> FzOffset {
        self.row[(y & (MAX_COORD - 1)) as usize]
    }

    /// Column entry for pixel `x * 4`
    #[inline]
    pub fn col(&self, x: u32) -> FzOffset {
        self.col[(x & (MAX_COORD / 4 - 1)) as usize]
    }
}

/// Tile row and inverted column mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRow {
    /// Tile id >> 5
    pub row: u32,
    /// Inverted bitmap of tile ids & 31
    pub mask: u32,
}

/// For each page, the 8x8 tiles of a texture stored there
pub struct Page2TileMap {
    pages: Box<[Vec<TileRow>]>,
}

impl Page2TileMap {
    /// Map every page touched by the texture described by `tex0`
    pub fn new(off: &GsOffset, tex0: &Tex0) -> Self {
        let bs = psm_info(tex0.psm).bs;
        let tw = (1u32 << tex0.tw.min(10)).max(bs.x);
        let th = (1u32 << tex0.th.min(10)).max(bs.y);

        let mut tiles: HashMap<u32, BTreeMap<u32, u32>> = HashMap::new();

        for y in (0..th).step_by(bs.y as usize) {
            let base = off.block_row((y >> 3) as usize);
            for x in (0..tw).step_by(bs.x as usize) {
                let page = page_of(base, off.block_col((x >> 3) as usize)) % MAX_PAGES;
                let id = ((y << 7) + x) >> 3;
                *tiles.entry(page).or_default().entry(id >> 5).or_insert(0) |= 1 << (id & 31);
            }
        }

        let mut pages = vec![Vec::new(); MAX_PAGES as usize].into_boxed_slice();
        for (page, rows) in tiles {
            pages[page as usize] = rows
                .into_iter()
                .map(|(row, mask)| TileRow { row, mask: !mask })
                .collect();
        }

        Self { pages }
    }

    /// Tiles stored in `page`, sorted by row
    pub fn page(&self, page: u32) -> &[TileRow] {
        &self.pages[(page % MAX_PAGES) as usize]
    }

    /// Pages holding at least one tile
    pub fn touched_pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(page, _)| page as u32)
    }
}
