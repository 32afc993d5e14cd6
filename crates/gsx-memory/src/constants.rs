//! GS local memory constants

/// Local memory size (4 MB)
pub const VRAM_SIZE: usize = 4 * 1024 * 1024;

/// Page size in bytes (8 KB)
pub const PAGE_SIZE: usize = 8192;

/// Block size in bytes
pub const BLOCK_SIZE: usize = 256;

/// Widest block in pixels (4-bit formats)
pub const MAX_BLOCK_WIDTH: usize = 32;

/// Number of pages in local memory
pub const MAX_PAGES: u32 = (VRAM_SIZE / PAGE_SIZE) as u32;

/// Number of blocks in local memory
pub const MAX_BLOCKS: u32 = (VRAM_SIZE / BLOCK_SIZE) as u32;

/// Blocks per page
pub const BLOCKS_PER_PAGE: u32 = 32;

/// Mask applied to block numbers
pub const BLOCK_MASK: u32 = MAX_BLOCKS - 1;

/// Coordinates wrap at this value in the row tables
pub const MAX_COORD: u32 = 2048;

/// Row tables cover two full coordinate ranges
pub const ROW_TABLE_LEN: usize = 4096;

/// Entries in a block-offset table
pub const BLOCK_TABLE_LEN: usize = 256;

/// Element masks for each access width
pub const VRAM_WORDS: usize = VRAM_SIZE / 4;
pub const VRAM_WORD_MASK: u32 = (VRAM_WORDS - 1) as u32;
pub const VRAM_HALF_MASK: u32 = (VRAM_SIZE / 2 - 1) as u32;
pub const VRAM_BYTE_MASK: u32 = (VRAM_SIZE - 1) as u32;
pub const VRAM_NIBBLE_MASK: u32 = (VRAM_SIZE * 2 - 1) as u32;

/// Entries in the palette buffer
pub const CLUT_ENTRIES: usize = 256;
