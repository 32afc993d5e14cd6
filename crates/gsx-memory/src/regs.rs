//! GS register images used by the memory engine
//!
//! Each register is decoded from its raw 64-bit value. Field widths follow the
//! hardware layout; undefined bits are ignored.

#[inline]
const fn bits(value: u64, shift: u32, width: u32) -> u32 {
    ((value >> shift) & ((1u64 << width) - 1)) as u32
}

/// BITBLTBUF: source and destination buffers of an image transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitBltBuf {
    pub sbp: u32,
    pub sbw: u32,
    pub spsm: u32,
    pub dbp: u32,
    pub dbw: u32,
    pub dpsm: u32,
}

impl BitBltBuf {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            sbp: bits(value, 0, 14),
            sbw: bits(value, 16, 6),
            spsm: bits(value, 24, 6),
            dbp: bits(value, 32, 14),
            dbw: bits(value, 48, 6),
            dpsm: bits(value, 56, 6),
        }
    }
}

/// TRXPOS: upper-left corners of the source and destination rectangles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrxPos {
    pub ssax: u32,
    pub ssay: u32,
    pub dsax: u32,
    pub dsay: u32,
    /// Pixel transmission order (only order 0 is modelled)
    pub dir: u32,
}

impl TrxPos {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            ssax: bits(value, 0, 11),
            ssay: bits(value, 16, 11),
            dsax: bits(value, 32, 11),
            dsay: bits(value, 48, 11),
            dir: bits(value, 59, 2),
        }
    }
}

/// TRXREG: transfer rectangle size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrxReg {
    pub rrw: u32,
    pub rrh: u32,
}

impl TrxReg {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            rrw: bits(value, 0, 12),
            rrh: bits(value, 32, 12),
        }
    }
}

/// TEX0: texture buffer and palette settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tex0 {
    pub tbp0: u32,
    pub tbw: u32,
    pub psm: u32,
    /// log2 of the texture width
    pub tw: u32,
    /// log2 of the texture height
    pub th: u32,
    pub tcc: u32,
    pub tfx: u32,
    pub cbp: u32,
    pub cpsm: u32,
    pub csm: u32,
    pub csa: u32,
    pub cld: u32,
    raw: u64,
}

impl Tex0 {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            tbp0: bits(value, 0, 14),
            tbw: bits(value, 14, 6),
            psm: bits(value, 20, 6),
            tw: bits(value, 26, 4),
            th: bits(value, 30, 4),
            tcc: bits(value, 34, 1),
            tfx: bits(value, 35, 2),
            cbp: bits(value, 37, 14),
            cpsm: bits(value, 51, 4),
            csm: bits(value, 55, 1),
            csa: bits(value, 56, 5),
            cld: bits(value, 61, 3),
            raw: value,
        }
    }

    /// Raw register value
    pub const fn raw(&self) -> u64 {
        self.raw
    }

    /// Buffer, width, format and size bits (TBP0 through TH)
    pub const fn layout_key(&self) -> u64 {
        self.raw & 0x3_ffff_ffff
    }

    /// Packed TW | TH << 4
    pub const fn size_key(&self) -> u32 {
        ((self.raw >> 26) & 0xff) as u32
    }
}

/// TEXA: alpha expansion for 24 and 16-bit texels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Texa {
    pub ta0: u32,
    /// Alpha-expansion method: transparent black when set
    pub aem: bool,
    pub ta1: u32,
}

impl Texa {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            ta0: bits(value, 0, 8),
            aem: bits(value, 15, 1) != 0,
            ta1: bits(value, 32, 8),
        }
    }
}

/// FRAME: frame buffer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// Base pointer in pages
    pub fbp: u32,
    pub fbw: u32,
    pub psm: u32,
    pub fbmsk: u32,
}

impl Frame {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            fbp: bits(value, 0, 9),
            fbw: bits(value, 16, 6),
            psm: bits(value, 24, 6),
            fbmsk: bits(value, 32, 32),
        }
    }

    /// Base pointer in blocks
    pub const fn block(&self) -> u32 {
        self.fbp << 5
    }
}

/// ZBUF: depth buffer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zbuf {
    /// Base pointer in pages
    pub zbp: u32,
    /// Low four bits of the format; depth formats all live in 0x30..0x3f
    pub psm: u32,
    pub zmsk: bool,
}

impl Zbuf {
    pub const fn from_u64(value: u64) -> Self {
        Self {
            zbp: bits(value, 0, 9),
            psm: bits(value, 24, 4),
            zmsk: bits(value, 32, 1) != 0,
        }
    }

    /// Base pointer in blocks
    pub const fn block(&self) -> u32 {
        self.zbp << 5
    }

    /// Full 6-bit pixel storage mode
    pub const fn full_psm(&self) -> u32 {
        0x30 | self.psm
    }
}
