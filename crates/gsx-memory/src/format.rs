//! Per-format element access
//!
//! [`Access`] tags carry the read, write and texel-expansion rules. The
//! [`Format`] trait bundles a swizzle and an access tag into a zero-sized type
//! so generic transfer routines are monomorphized per pixel storage mode.

use crate::psm::{Access, Psm, PsmInfo};
use crate::regs::Texa;
use crate::swizzle::Swizzle;
use crate::vram::Vram;

/// Expand a 24-bit color using TEXA
#[inline]
pub fn expand24(c: u32, texa: &Texa) -> u32 {
    let rgb = c & 0x00ff_ffff;
    let alpha = if texa.aem && rgb == 0 { 0 } else { texa.ta0 };
    rgb | (alpha << 24)
}

/// Expand a 16-bit A1BGR5 color using TEXA
#[inline]
pub fn expand16(c: u32, texa: &Texa) -> u32 {
    let rgb = ((c & 0x001f) << 3) | ((c & 0x03e0) << 6) | ((c & 0x7c00) << 9);
    let alpha = if c & 0x8000 != 0 {
        texa.ta1
    } else if !texa.aem || c & 0x7fff != 0 {
        texa.ta0
    } else {
        0
    };
    rgb | (alpha << 24)
}

impl Access {
    /// Read the element at `addr`, widened to 32 bits
    #[inline]
    pub fn read(self, vram: &Vram, addr: u32) -> u32 {
        match self {
            Access::P32 => vram.read32(addr),
            Access::P24 => vram.read32(addr) & 0x00ff_ffff,
            Access::P16 => vram.read16(addr) as u32,
            Access::P8 => vram.read8(addr) as u32,
            Access::P4 => vram.read4(addr) as u32,
            Access::P8H => vram.read32(addr) >> 24,
            Access::P4HL => (vram.read32(addr) >> 24) & 0xf,
            Access::P4HH => vram.read32(addr) >> 28,
        }
    }

    /// Store `c` at `addr`, touching only the bits this access owns
    #[inline]
    pub fn write(self, vram: &mut Vram, addr: u32, c: u32) {
        match self {
            Access::P32 => vram.write32(addr, c),
            Access::P24 => vram.write32_masked(addr, c, 0x00ff_ffff),
            Access::P16 => vram.write16(addr, c as u16),
            Access::P8 => vram.write8(addr, c as u8),
            Access::P4 => vram.write4(addr, c as u8),
            Access::P8H => vram.write32_masked(addr, c << 24, 0xff00_0000),
            Access::P4HL => vram.write32_masked(addr, c << 24, 0x0f00_0000),
            Access::P4HH => vram.write32_masked(addr, c << 28, 0xf000_0000),
        }
    }

    /// Store `c` as element `index` of one block's words
    #[inline]
    pub fn write_block(self, block: &mut [u32], index: usize, c: u32) {
        let (word, shift, mask) = match self {
            Access::P32 => (index, 0, u32::MAX),
            Access::P24 => (index, 0, 0x00ff_ffff),
            Access::P16 => (index >> 1, (index & 1) << 4, 0xffff),
            Access::P8 => (index >> 2, (index & 3) << 3, 0xff),
            Access::P4 => (index >> 3, (index & 7) << 2, 0xf),
            Access::P8H => (index, 24, 0xff),
            Access::P4HL => (index, 24, 0xf),
            Access::P4HH => (index, 28, 0xf),
        };
        let w = &mut block[word];
        *w = (*w & !(mask << shift)) | ((c & mask) << shift);
    }

    /// Read the element at `addr` as a 32-bit RGBA texel
    #[inline]
    pub fn read_texel(self, vram: &Vram, addr: u32, clut: &[u32], texa: &Texa) -> u32 {
        match self {
            Access::P32 => vram.read32(addr),
            Access::P24 => expand24(vram.read32(addr), texa),
            Access::P16 => expand16(vram.read16(addr) as u32, texa),
            _ => clut[self.read(vram, addr) as usize],
        }
    }
}

/// Compile-time description of one pixel storage mode
pub trait Format {
    const PSM: Psm;
    const SWIZZLE: Swizzle;
    const ACCESS: Access;
    /// Bits per pixel in transfer streams
    const TRBPP: u32;
    /// Block width in pixels
    const BSX: u32;
    /// Block height in pixels
    const BSY: u32;

    #[inline(always)]
    fn info() -> &'static PsmInfo {
        Self::PSM.info()
    }

    #[inline(always)]
    fn pa(x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        Self::SWIZZLE.pixel_address(x, y, bp, bw)
    }

    #[inline(always)]
    fn bn(x: u32, y: u32, bp: u32, bw: u32) -> u32 {
        Self::SWIZZLE.block_number(x, y, bp, bw)
    }

    #[inline(always)]
    fn row_offset(y: u32) -> &'static [i32] {
        Self::SWIZZLE.row_offset(y)
    }

    #[inline(always)]
    fn read_pixel(vram: &Vram, addr: u32) -> u32 {
        Self::ACCESS.read(vram, addr)
    }

    #[inline(always)]
    fn write_pixel(vram: &mut Vram, addr: u32, c: u32) {
        Self::ACCESS.write(vram, addr, c)
    }

    #[inline(always)]
    fn read_texel(vram: &Vram, addr: u32, clut: &[u32], texa: &Texa) -> u32 {
        Self::ACCESS.read_texel(vram, addr, clut, texa)
    }
}

macro_rules! formats {
    ($($name:ident => $psm:ident, $swizzle:ident, $access:ident, $trbpp:expr, $bsx:expr, $bsy:expr;)*) => {
        $(
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $name;

            impl Format for $name {
                const PSM: Psm = Psm::$psm;
                const SWIZZLE: Swizzle = Swizzle::$swizzle;
                const ACCESS: Access = Access::$access;
                const TRBPP: u32 = $trbpp;
                const BSX: u32 = $bsx;
                const BSY: u32 = $bsy;
            }
        )*
    };
}

formats! {
    Ct32 => Ct32, S32, P32, 32, 8, 8;
    Ct24 => Ct24, S32, P24, 24, 8, 8;
    Ct16 => Ct16, S16, P16, 16, 16, 8;
    Ct16S => Ct16S, S16S, P16, 16, 16, 8;
    T8 => T8, S8, P8, 8, 16, 16;
    T4 => T4, S4, P4, 4, 32, 16;
    T8H => T8H, S32, P8H, 8, 8, 8;
    T4HL => T4HL, S32, P4HL, 4, 8, 8;
    T4HH => T4HH, S32, P4HH, 4, 8, 8;
    Z32 => Z32, S32Z, P32, 32, 8, 8;
    Z24 => Z24, S32Z, P24, 24, 8, 8;
    Z16 => Z16, S16Z, P16, 16, 16, 8;
    Z16S => Z16S, S16SZ, P16, 16, 16, 8;
}

/// Run `$body` with `$f` bound to the [`Format`] type of `$psm`
///
/// GPU24 and undefined ids run as [`Ct32`].
#[macro_export]
macro_rules! with_format {
    ($psm:expr, $f:ident => $body:expr) => {
        match $psm & 0x3f {
            0x01 => {
                type $f = $crate::format::Ct24;
                $body
            }
            0x02 => {
                type $f = $crate::format::Ct16;
                $body
            }
            0x0a => {
                type $f = $crate::format::Ct16S;
                $body
            }
            0x13 => {
                type $f = $crate::format::T8;
                $body
            }
            0x14 => {
                type $f = $crate::format::T4;
                $body
            }
            0x1b => {
                type $f = $crate::format::T8H;
                $body
            }
            0x24 => {
                type $f = $crate::format::T4HL;
                $body
            }
            0x2c => {
                type $f = $crate::format::T4HH;
                $body
            }
            0x30 => {
                type $f = $crate::format::Z32;
                $body
            }
            0x31 => {
                type $f = $crate::format::Z24;
                $body
            }
            0x32 => {
                type $f = $crate::format::Z16;
                $body
            }
            0x3a => {
                type $f = $crate::format::Z16S;
                $body
            }
            _ => {
                type $f = $crate::format::Ct32;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check<F: Format>() {
        let info = F::info();
        assert_eq!(F::SWIZZLE, info.swizzle, "{:?}", F::PSM);
        assert_eq!(F::ACCESS, info.access, "{:?}", F::PSM);
        assert_eq!(F::TRBPP, info.trbpp, "{:?}", F::PSM);
        assert_eq!((F::BSX, F::BSY), (info.bs.x, info.bs.y), "{:?}", F::PSM);
    }

    #[test]
    fn test_formats_match_descriptors() {
        check::<Ct32>();
        check::<Ct24>();
        check::<Ct16>();
        check::<Ct16S>();
        check::<T8>();
        check::<T4>();
        check::<T8H>();
        check::<T4HL>();
        check::<T4HH>();
        check::<Z32>();
        check::<Z24>();
        check::<Z16>();
        check::<Z16S>();
    }

    #[test]
    fn test_block_writes_match_addressed_writes() {
        let accesses = [
            (Access::P32, 64),
            (Access::P24, 64),
            (Access::P16, 128),
            (Access::P8, 256),
            (Access::P4, 512),
            (Access::P8H, 64),
            (Access::P4HL, 64),
            (Access::P4HH, 64),
        ];

        for (access, elements) in accesses {
            let mut addressed = Vram::new().unwrap();
            let mut blocks = Vram::new().unwrap();
            for w in 0..64 {
                addressed.write32(w, 0x5a5a_5a5a);
                blocks.write32(w, 0x5a5a_5a5a);
            }

            for i in 0..elements {
                let c = (i as u32).wrapping_mul(0x9e37_79b9);
                access.write(&mut addressed, i as u32, c);
                access.write_block(blocks.block_mut(0), i, c);
            }

            assert_eq!(addressed.block(0), blocks.block(0), "{:?}", access);
        }
    }

    #[test]
    fn test_dispatch() {
        for psm in Psm::ALL {
            let expected = if psm == Psm::Gpu24 { Psm::Ct32 } else { psm };
            let selected = with_format!(psm.id(), F => F::PSM);
            assert_eq!(selected, expected);
        }
        assert_eq!(with_format!(0x07u32, F => F::PSM), Psm::Ct32);
    }

    #[test]
    fn test_high_bit_accesses_share_a_word() {
        let mut vram = Vram::new().unwrap();
        Access::P24.write(&mut vram, 0, 0x00a0_b0c0);
        Access::P4HL.write(&mut vram, 0, 0x5);
        Access::P4HH.write(&mut vram, 0, 0xe);

        assert_eq!(vram.read32(0), 0xe5a0_b0c0);
        assert_eq!(Access::P24.read(&vram, 0), 0x00a0_b0c0);
        assert_eq!(Access::P8H.read(&vram, 0), 0xe5);
        assert_eq!(Access::P4HL.read(&vram, 0), 0x5);
        assert_eq!(Access::P4HH.read(&vram, 0), 0xe);

        Access::P8H.write(&mut vram, 0, 0x1234);
        assert_eq!(vram.read32(0), 0x34a0_b0c0);
    }

    #[test]
    fn test_expand24() {
        let texa = Texa {
            ta0: 0x80,
            aem: false,
            ta1: 0,
        };
        assert_eq!(expand24(0xff12_3456, &texa), 0x8012_3456);
        assert_eq!(expand24(0, &texa), 0x8000_0000);

        let aem = Texa { aem: true, ..texa };
        assert_eq!(expand24(0xff00_0000, &aem), 0);
        assert_eq!(expand24(1, &aem), 0x8000_0001);
    }

    #[test]
    fn test_expand16() {
        let texa = Texa {
            ta0: 0x40,
            aem: true,
            ta1: 0xc0,
        };
        // r = 31, g = 0, b = 1
        assert_eq!(expand16(0x041f, &texa), 0x4008_00f8);
        assert_eq!(expand16(0x8000, &texa), 0xc000_0000);
        assert_eq!(expand16(0, &texa), 0);

        let no_aem = Texa { aem: false, ..texa };
        assert_eq!(expand16(0, &no_aem), 0x4000_0000);
    }

    #[test]
    fn test_indexed_texels_use_clut() {
        let mut vram = Vram::new().unwrap();
        let clut: Vec<u32> = (0..256).map(|i| i * 0x0101_0101).collect();
        let texa = Texa::default();

        Access::P8.write(&mut vram, 5, 0x21);
        assert_eq!(Access::P8.read_texel(&vram, 5, &clut, &texa), 0x2121_2121);

        Access::P4HH.write(&mut vram, 9, 0x3);
        assert_eq!(Access::P4HH.read_texel(&vram, 9, &clut, &texa), 0x0303_0303);
    }
}
