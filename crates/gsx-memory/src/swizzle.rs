//! Swizzle functions and precomputed offset tables
//!
//! Every pixel storage mode maps (x, y) through one of eight swizzles. A
//! swizzle yields block numbers (256-byte units) and element addresses in
//! the swizzle's native element size: 32-bit words, 16-bit halfwords,
//! bytes or nibbles.
//!
//! Two address forms exist. The "org" form evaluates the block and column
//! tables directly. The fast form looks the in-page part up in a page offset
//! table built from the org form, so both agree modulo the size of local
//! memory.

use crate::constants::*;
use crate::tables::*;
use once_cell::sync::Lazy;

/// Tiling function shared by one or more pixel storage modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Swizzle {
    S32,
    S32Z,
    S16,
    S16S,
    S16Z,
    S16SZ,
    S8,
    S4,
}

impl Swizzle {
    pub const ALL: [Swizzle; 8] = [
        Swizzle::S32,
        Swizzle::S32Z,
        Swizzle::S16,
        Swizzle::S16S,
        Swizzle::S16Z,
        Swizzle::S16SZ,
        Swizzle::S8,
        Swizzle::S4,
    ];

    /// Bits per addressed element
    pub const fn element_bits(self) -> u32 {
        match self {
            Swizzle::S32 | Swizzle::S32Z => 32,
            Swizzle::S16 | Swizzle::S16S | Swizzle::S16Z | Swizzle::S16SZ => 16,
            Swizzle::S8 => 8,
            Swizzle::S4 => 4,
        }
    }

    /// Page size in pixels (width, height)
    pub const fn page_shape(self) -> (u32, u32) {
        match self.element_bits() {
            32 => (64, 32),
            16 => (64, 64),
            8 => (128, 64),
            _ => (128, 128),
        }
    }

    /// Block size in pixels (width, height)
    pub const fn block_shape(self) -> (u32, u32) {
        match self.element_bits() {
            32 => (8, 8),
            16 => (16, 8),
            8 => (16, 16),
            _ => (32, 16),
        }
    }

    /// Whether rows inside a block alternate between two column patterns
    pub const fn has_split_rows(self) -> bool {
        matches!(self, Swizzle::S8 | Swizzle::S4)
    }

    /// Block number of the pixel, masked to local memory
    #[inline]
    pub fn block_number(self, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        let bn = match self {
            Swizzle::S32 => bn32(x, y, bp, bw, &BLOCK_TABLE_32),
            Swizzle::S32Z => bn32(x, y, bp, bw, &BLOCK_TABLE_32Z),
            Swizzle::S16 => bn16(x, y, bp, bw, &BLOCK_TABLE_16),
            Swizzle::S16S => bn16(x, y, bp, bw, &BLOCK_TABLE_16S),
            Swizzle::S16Z => bn16(x, y, bp, bw, &BLOCK_TABLE_16Z),
            Swizzle::S16SZ => bn16(x, y, bp, bw, &BLOCK_TABLE_16SZ),
            Swizzle::S8 => {
                let base = bp
                    .wrapping_add(((y >> 1) & !0x1f).wrapping_mul(bw >> 1))
                    .wrapping_add((x >> 2) & !0x1f);
                base.wrapping_add(BLOCK_TABLE_8[((y >> 4) & 3) as usize][((x >> 4) & 7) as usize] as u32)
            }
            Swizzle::S4 => {
                let base = bp
                    .wrapping_add(((y >> 2) & !0x1f).wrapping_mul(bw >> 1))
                    .wrapping_add((x >> 2) & !0x1f);
                base.wrapping_add(BLOCK_TABLE_4[((y >> 4) & 7) as usize][((x >> 5) & 3) as usize] as u32)
            }
        };

        bn & BLOCK_MASK
    }

    /// Shift turning a block number into an element address
    pub const fn block_shift(self) -> u32 {
        match self.element_bits() {
            32 => 6,
            16 => 7,
            8 => 8,
            _ => 9,
        }
    }

    /// Element offset of `(x, y)` inside its block
    #[inline]
    pub fn column_offset(self, x: u32, y: u32) -> u32 {
        match self.element_bits() {
            32 => COLUMN_TABLE_32[(y & 7) as usize][(x & 7) as usize] as u32,
            16 => COLUMN_TABLE_16[(y & 7) as usize][(x & 15) as usize] as u32,
            8 => COLUMN_TABLE_8[(y & 15) as usize][(x & 15) as usize] as u32,
            _ => COLUMN_TABLE_4[(y & 15) as usize][(x & 31) as usize] as u32,
        }
    }

    /// Element address computed from the block and column tables
    #[inline]
    pub fn pixel_address_org(self, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        (self.block_number(x, y, bp, bw) << self.block_shift()) + self.column_offset(x, y)
    }

    /// Element address through the page offset table
    ///
    /// The result is not masked; callers wrap it to local memory on access.
    #[inline]
    pub fn pixel_address(self, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        let table = self.page_offset();
        let (page, shift) = match self.element_bits() {
            32 => ((bp >> 5) + (y >> 5) * bw + (x >> 6), 11),
            16 => ((bp >> 5) + (y >> 6) * bw + (x >> 6), 12),
            8 => ((bp >> 5) + (y >> 6) * (bw >> 1) + (x >> 7), 13),
            _ => ((bp >> 5) + (y >> 7) * (bw >> 1) + (x >> 7), 14),
        };

        (page << shift).wrapping_add(table.get(bp, x, y))
    }

    /// Page offset table of this swizzle
    pub fn page_offset(self) -> &'static PageOffsetTable {
        match self {
            Swizzle::S32 => &PAGE_OFFSET_32,
            Swizzle::S32Z => &PAGE_OFFSET_32Z,
            Swizzle::S16 => &PAGE_OFFSET_16,
            Swizzle::S16S => &PAGE_OFFSET_16S,
            Swizzle::S16Z => &PAGE_OFFSET_16Z,
            Swizzle::S16SZ => &PAGE_OFFSET_16SZ,
            Swizzle::S8 => &PAGE_OFFSET_8,
            Swizzle::S4 => &PAGE_OFFSET_4,
        }
    }

    fn row_offsets(self) -> &'static RowOffsetTable {
        match self {
            Swizzle::S32 => &ROW_OFFSET_32,
            Swizzle::S32Z => &ROW_OFFSET_32Z,
            Swizzle::S16 => &ROW_OFFSET_16,
            Swizzle::S16S => &ROW_OFFSET_16S,
            Swizzle::S16Z => &ROW_OFFSET_16Z,
            Swizzle::S16SZ => &ROW_OFFSET_16SZ,
            Swizzle::S8 => &ROW_OFFSET_8,
            Swizzle::S4 => &ROW_OFFSET_4,
        }
    }

    /// Row offset table for row `y`
    ///
    /// Entry `x` is the element delta between `(x, y)` and `(0, y)`.
    #[inline]
    pub fn row_offset(self, y: u32) -> &'static [i32] {
        let table = self.row_offsets();
        &table.rows[row_variant(y)]
    }

    /// Row offset table variant (0 or 1) directly
    pub fn row_offset_variant(self, variant: usize) -> &'static [i32] {
        &self.row_offsets().rows[variant & 1]
    }

    /// Block-number deltas between 8-pixel block columns
    pub fn block_offset(self) -> &'static [i16; BLOCK_TABLE_LEN] {
        match self {
            Swizzle::S32 => &BLOCK_OFFSET_32,
            Swizzle::S32Z => &BLOCK_OFFSET_32Z,
            Swizzle::S16 => &BLOCK_OFFSET_16,
            Swizzle::S16S => &BLOCK_OFFSET_16S,
            Swizzle::S16Z => &BLOCK_OFFSET_16Z,
            Swizzle::S16SZ => &BLOCK_OFFSET_16SZ,
            Swizzle::S8 => &BLOCK_OFFSET_8,
            Swizzle::S4 => &BLOCK_OFFSET_4,
        }
    }
}

#[inline]
fn bn32(x: u32, y: u32, bp: u32, bw: u32, table: &[[u8; 8]; 4]) -> u32 {
    bp.wrapping_add((y & !0x1f).wrapping_mul(bw))
        .wrapping_add((x >> 1) & !0x1f)
        .wrapping_add(table[((y >> 3) & 3) as usize][((x >> 3) & 7) as usize] as u32)
}

#[inline]
fn bn16(x: u32, y: u32, bp: u32, bw: u32, table: &[[u8; 4]; 8]) -> u32 {
    bp.wrapping_add(((y >> 1) & !0x1f).wrapping_mul(bw))
        .wrapping_add((x >> 1) & !0x1f)
        .wrapping_add(table[((y >> 3) & 7) as usize][((x >> 4) & 3) as usize] as u32)
}

/// Which of the two row tables serves row `y`
#[inline]
pub const fn row_variant(y: u32) -> usize {
    ((((y & 7) + 2) >> 2) & 1) as usize
}

/// In-page element offsets for each of the 32 block-aligned base pointers
pub struct PageOffsetTable {
    width: usize,
    height: usize,
    data: Box<[u32]>,
}

impl PageOffsetTable {
    fn build(swizzle: Swizzle) -> Self {
        let (width, height) = swizzle.page_shape();
        let (width, height) = (width as usize, height as usize);
        let mut data = Vec::with_capacity(BLOCKS_PER_PAGE as usize * width * height);

        for bp in 0..BLOCKS_PER_PAGE {
            for y in 0..height as u32 {
                for x in 0..width as u32 {
                    data.push(swizzle.pixel_address_org(x, y, bp, 0));
                }
            }
        }

        tracing::debug!("Built {:?} page offset table ({} entries)", swizzle, data.len());

        Self {
            width,
            height,
            data: data.into_boxed_slice(),
        }
    }

    /// Offset of `(x, y)` inside a page for base pointer `bp`
    ///
    /// Only the low bits of each argument are used.
    #[inline]
    pub fn get(&self, bp: u32, x: u32, y: u32) -> u32 {
        let bp = (bp & (BLOCKS_PER_PAGE - 1)) as usize;
        let x = x as usize & (self.width - 1);
        let y = y as usize & (self.height - 1);
        self.data[(bp * self.height + y) * self.width + x]
    }

    /// Page dimensions in pixels (width, height)
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

struct RowOffsetTable {
    rows: [Box<[i32]>; 2],
}

impl RowOffsetTable {
    fn build(swizzle: Swizzle) -> Self {
        let build_row = |y: u32| -> Box<[i32]> {
            let origin = swizzle.pixel_address(0, y, 0, 32) as i32;
            (0..ROW_TABLE_LEN as u32)
                .map(|x| swizzle.pixel_address(x & (MAX_COORD - 1), y, 0, 32) as i32 - origin)
                .collect()
        };

        let first = build_row(0);
        let second = if swizzle.has_split_rows() {
            build_row(2)
        } else {
            first.clone()
        };

        Self {
            rows: [first, second],
        }
    }
}

fn build_block_offset(swizzle: Swizzle) -> [i16; BLOCK_TABLE_LEN] {
    let origin = swizzle.block_number(0, 0, 0, 32) as i32;
    std::array::from_fn(|x| (swizzle.block_number((x as u32) << 3, 0, 0, 32) as i32 - origin) as i16)
}

static PAGE_OFFSET_32: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S32));
static PAGE_OFFSET_32Z: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S32Z));
static PAGE_OFFSET_16: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S16));
static PAGE_OFFSET_16S: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S16S));
static PAGE_OFFSET_16Z: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S16Z));
static PAGE_OFFSET_16SZ: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S16SZ));
static PAGE_OFFSET_8: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S8));
static PAGE_OFFSET_4: Lazy<PageOffsetTable> = Lazy::new(|| PageOffsetTable::build(Swizzle::S4));

static ROW_OFFSET_32: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S32));
static ROW_OFFSET_32Z: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S32Z));
static ROW_OFFSET_16: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S16));
static ROW_OFFSET_16S: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S16S));
static ROW_OFFSET_16Z: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S16Z));
static ROW_OFFSET_16SZ: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S16SZ));
static ROW_OFFSET_8: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S8));
static ROW_OFFSET_4: Lazy<RowOffsetTable> = Lazy::new(|| RowOffsetTable::build(Swizzle::S4));

static BLOCK_OFFSET_32: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S32));
static BLOCK_OFFSET_32Z: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S32Z));
static BLOCK_OFFSET_16: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S16));
static BLOCK_OFFSET_16S: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S16S));
static BLOCK_OFFSET_16Z: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S16Z));
static BLOCK_OFFSET_16SZ: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S16SZ));
static BLOCK_OFFSET_8: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S8));
static BLOCK_OFFSET_4: Lazy<[i16; BLOCK_TABLE_LEN]> = Lazy::new(|| build_block_offset(Swizzle::S4));

/// Force construction of every table
pub fn prebuild_tables() {
    for swizzle in Swizzle::ALL {
        let _ = swizzle.page_offset();
        let _ = swizzle.row_offsets();
        let _ = swizzle.block_offset();
    }
    tracing::info!("Swizzle tables ready");
}

/// Wrap an element address to local memory
#[inline]
pub const fn wrap_address(bits: u32, addr: u32) -> u32 {
    match bits {
        32 => addr & VRAM_WORD_MASK,
        16 => addr & VRAM_HALF_MASK,
        8 => addr & VRAM_BYTE_MASK,
        _ => addr & VRAM_NIBBLE_MASK,
    }
}
