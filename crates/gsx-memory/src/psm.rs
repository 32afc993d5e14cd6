//! Pixel storage mode descriptor table

use crate::swizzle::Swizzle;
use gsx_core::error::MemoryError;
use once_cell::sync::Lazy;

/// Named pixel storage modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Psm {
    Ct32 = 0x00,
    Ct24 = 0x01,
    Ct16 = 0x02,
    Ct16S = 0x0a,
    Gpu24 = 0x12,
    T8 = 0x13,
    T4 = 0x14,
    T8H = 0x1b,
    T4HL = 0x24,
    T4HH = 0x2c,
    Z32 = 0x30,
    Z24 = 0x31,
    Z16 = 0x32,
    Z16S = 0x3a,
}

impl Psm {
    pub const ALL: [Psm; 14] = [
        Psm::Ct32,
        Psm::Ct24,
        Psm::Ct16,
        Psm::Ct16S,
        Psm::Gpu24,
        Psm::T8,
        Psm::T4,
        Psm::T8H,
        Psm::T4HL,
        Psm::T4HH,
        Psm::Z32,
        Psm::Z24,
        Psm::Z16,
        Psm::Z16S,
    ];

    /// Raw register value
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Descriptor for this mode
    pub fn info(self) -> &'static PsmInfo {
        psm_info(self.id())
    }
}

impl TryFrom<u32> for Psm {
    type Error = MemoryError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Psm::ALL
            .iter()
            .copied()
            .find(|psm| psm.id() == value)
            .ok_or(MemoryError::InvalidPsm(value))
    }
}

/// How stored bits become a pixel value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Full 32-bit word
    P32,
    /// Low 24 bits of a word
    P24,
    /// 16-bit halfword
    P16,
    /// Byte
    P8,
    /// Nibble
    P4,
    /// Bits 24..31 of a word
    P8H,
    /// Bits 24..27 of a word
    P4HL,
    /// Bits 28..31 of a word
    P4HH,
}

impl Access {
    /// Bits of local memory addressed by one element
    pub const fn element_bits(self) -> u32 {
        match self {
            Access::P32 | Access::P24 | Access::P8H | Access::P4HL | Access::P4HH => 32,
            Access::P16 => 16,
            Access::P8 => 8,
            Access::P4 => 4,
        }
    }

    /// Whether texel reads go through the palette
    pub const fn is_indexed(self) -> bool {
        matches!(self, Access::P8 | Access::P4 | Access::P8H | Access::P4HL | Access::P4HH)
    }
}

/// Size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub x: u32,
    pub y: u32,
}

impl Size {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Per-mode descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsmInfo {
    /// Storage bits per pixel
    pub bpp: u32,
    /// Bits per pixel in transfer streams
    pub trbpp: u32,
    /// Palette size (0, 16 or 256)
    pub pal: u32,
    /// Block size
    pub bs: Size,
    /// Page size
    pub pgs: Size,
    /// Byte mask of the written bits
    pub msk: u8,
    /// Depth buffer format
    pub depth: bool,
    /// Format class: 0 = 32, 1 = 24, 2 = 16, 3 = other
    pub fmt: u8,
    /// Address and block number functions
    pub swizzle: Swizzle,
    /// Pixel and texel access functions
    pub access: Access,
}

impl PsmInfo {
    const DEFAULT: PsmInfo = PsmInfo {
        bpp: 32,
        trbpp: 32,
        pal: 0,
        bs: Size::new(8, 8),
        pgs: Size::new(64, 32),
        msk: 0xff,
        depth: false,
        fmt: 3,
        swizzle: Swizzle::S32,
        access: Access::P32,
    };

    /// Element address of a pixel
    #[inline]
    pub fn pa(&self, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        self.swizzle.pixel_address(x, y, bp, bw)
    }

    /// Block number of a pixel
    #[inline]
    pub fn bn(&self, x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        self.swizzle.block_number(x, y, bp, bw)
    }

    /// Row offset table for row `y`
    #[inline]
    pub fn row_offset(&self, y: u32) -> &'static [i32] {
        self.swizzle.row_offset(y)
    }

    /// Shared block column table
    #[inline]
    pub fn block_offset(&self) -> &'static [i16; 256] {
        self.swizzle.block_offset()
    }
}

static PSM_TABLE: Lazy<[PsmInfo; 64]> = Lazy::new(build_table);

fn build_table() -> [PsmInfo; 64] {
    let mut table = [PsmInfo::DEFAULT; 64];

    let mut set = |psm: Psm, f: &dyn Fn(&mut PsmInfo)| f(&mut table[psm.id() as usize]);

    set(Psm::Ct32, &|p| p.fmt = 0);
    set(Psm::Ct24, &|p| {
        p.access = Access::P24;
        p.trbpp = 24;
        p.msk = 0x3f;
        p.fmt = 1;
    });
    set(Psm::Ct16, &|p| {
        p.swizzle = Swizzle::S16;
        p.access = Access::P16;
        p.bpp = 16;
        p.trbpp = 16;
        p.bs = Size::new(16, 8);
        p.pgs = Size::new(64, 64);
        p.fmt = 2;
    });
    set(Psm::Ct16S, &|p| {
        p.swizzle = Swizzle::S16S;
        p.access = Access::P16;
        p.bpp = 16;
        p.trbpp = 16;
        p.bs = Size::new(16, 8);
        p.pgs = Size::new(64, 64);
        p.fmt = 2;
    });
    // Addressed like 16-bit color, read and written through the 32-bit path
    set(Psm::Gpu24, &|p| {
        p.swizzle = Swizzle::S16;
        p.bpp = 16;
        p.trbpp = 16;
        p.bs = Size::new(16, 8);
        p.pgs = Size::new(64, 64);
    });
    set(Psm::T8, &|p| {
        p.swizzle = Swizzle::S8;
        p.access = Access::P8;
        p.bpp = 8;
        p.trbpp = 8;
        p.pal = 256;
        p.bs = Size::new(16, 16);
        p.pgs = Size::new(128, 64);
    });
    set(Psm::T4, &|p| {
        p.swizzle = Swizzle::S4;
        p.access = Access::P4;
        p.bpp = 4;
        p.trbpp = 4;
        p.pal = 16;
        p.bs = Size::new(32, 16);
        p.pgs = Size::new(128, 128);
    });
    set(Psm::T8H, &|p| {
        p.access = Access::P8H;
        p.trbpp = 8;
        p.pal = 256;
        p.msk = 0xc0;
    });
    set(Psm::T4HL, &|p| {
        p.access = Access::P4HL;
        p.trbpp = 4;
        p.pal = 16;
        p.msk = 0x40;
    });
    set(Psm::T4HH, &|p| {
        p.access = Access::P4HH;
        p.trbpp = 4;
        p.pal = 16;
        p.msk = 0x80;
    });
    set(Psm::Z32, &|p| {
        p.swizzle = Swizzle::S32Z;
        p.depth = true;
        p.fmt = 0;
    });
    set(Psm::Z24, &|p| {
        p.swizzle = Swizzle::S32Z;
        p.access = Access::P24;
        p.trbpp = 24;
        p.msk = 0x3f;
        p.depth = true;
        p.fmt = 1;
    });
    set(Psm::Z16, &|p| {
        p.swizzle = Swizzle::S16Z;
        p.access = Access::P16;
        p.bpp = 16;
        p.trbpp = 16;
        p.bs = Size::new(16, 8);
        p.pgs = Size::new(64, 64);
        p.depth = true;
        p.fmt = 2;
    });
    set(Psm::Z16S, &|p| {
        p.swizzle = Swizzle::S16SZ;
        p.access = Access::P16;
        p.bpp = 16;
        p.trbpp = 16;
        p.bs = Size::new(16, 8);
        p.pgs = Size::new(64, 64);
        p.depth = true;
        p.fmt = 2;
    });

    table
}

/// Descriptor for a raw 6-bit mode id
///
/// Undefined ids behave as 32-bit color.
#[inline]
pub fn psm_info(psm: u32) -> &'static PsmInfo {
    &PSM_TABLE[(psm & 0x3f) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_never_fails() {
        for id in 0..64 {
            let info = psm_info(id);
            assert!(info.bpp > 0);
            assert!(info.bs.x.is_power_of_two() && info.bs.y.is_power_of_two());
            assert!(info.pgs.x.is_power_of_two() && info.pgs.y.is_power_of_two());
        }
        assert_eq!(psm_info(0x40), psm_info(0));
    }

    #[test]
    fn test_undefined_ids_default_to_ct32() {
        let info = psm_info(0x05);
        assert_eq!(info.swizzle, Swizzle::S32);
        assert_eq!(info.access, Access::P32);
        assert_eq!(info.bpp, 32);
        assert_eq!(info.trbpp, 32);
        assert_eq!(info.fmt, 3);
        assert_eq!(info.msk, 0xff);
    }

    #[test]
    fn test_named_modes() {
        let ct24 = Psm::Ct24.info();
        assert_eq!(ct24.swizzle, Swizzle::S32);
        assert_eq!((ct24.bpp, ct24.trbpp, ct24.msk, ct24.fmt), (32, 24, 0x3f, 1));

        let t4 = Psm::T4.info();
        assert_eq!((t4.bpp, t4.pal), (4, 16));
        assert_eq!(t4.bs, Size::new(32, 16));
        assert_eq!(t4.pgs, Size::new(128, 128));

        let t8h = Psm::T8H.info();
        assert_eq!((t8h.bpp, t8h.trbpp, t8h.pal, t8h.msk), (32, 8, 256, 0xc0));

        let gpu24 = Psm::Gpu24.info();
        assert_eq!(gpu24.swizzle, Swizzle::S16);
        assert_eq!(gpu24.access, Access::P32);
        assert_eq!(gpu24.bs, Size::new(16, 8));

        assert!(Psm::Z16S.info().depth);
        assert!(!Psm::Ct16S.info().depth);
        assert_eq!(Psm::Z16S.info().swizzle, Swizzle::S16SZ);
    }

    #[test]
    fn test_signed_variants_differ_only_in_swizzle() {
        let a = *Psm::Ct16.info();
        let b = *Psm::Ct16S.info();
        assert_ne!(a.swizzle, b.swizzle);
        assert_eq!(PsmInfo { swizzle: a.swizzle, ..b }, a);
    }

    #[test]
    fn test_try_from() {
        assert_eq!(Psm::try_from(0x13), Ok(Psm::T8));
        assert_eq!(Psm::try_from(0x3a), Ok(Psm::Z16S));
        assert_eq!(Psm::try_from(0x03), Err(MemoryError::InvalidPsm(3)));
    }
}
