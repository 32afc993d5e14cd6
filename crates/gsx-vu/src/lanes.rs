//! XYZW lane masks
//!
//! VU instructions name their destination lanes with a 4-bit field, X in the
//! high bit. In memory and in host registers X is lane 0.

use bitflags::bitflags;

bitflags! {
    /// Destination lane mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Xyzw: u8 {
        const X = 8;
        const Y = 4;
        const Z = 2;
        const W = 1;
    }
}

impl Xyzw {
    /// Mask from the raw instruction field; bits above 3 are dropped
    pub const fn from_field(field: u32) -> Self {
        Self::from_bits_truncate(field as u8)
    }

    /// Exactly one lane selected
    pub const fn is_single(self) -> bool {
        matches!(self.bits(), 1 | 2 | 4 | 8)
    }

    /// Nothing or everything selected
    pub const fn is_full(self) -> bool {
        matches!(self.bits(), 0 | 0xf)
    }

    /// Host lane of a single-lane mask
    pub const fn lane(self) -> Option<usize> {
        match self.bits() {
            8 => Some(0),
            4 => Some(1),
            2 => Some(2),
            1 => Some(3),
            _ => None,
        }
    }

    /// Per-host-lane selection, lane 0 first
    pub const fn host_lanes(self) -> [bool; 4] {
        let b = self.bits();
        [b & 8 != 0, b & 4 != 0, b & 2 != 0, b & 1 != 0]
    }

    /// Mask with host lane `i` in bit `i`, the layout `blendps` expects
    pub const fn blend_imm(self) -> u8 {
        let b = self.bits();
        ((b & 1) << 3) | ((b & 2) << 1) | ((b & 4) >> 1) | ((b & 8) >> 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_lanes() {
        assert_eq!(Xyzw::X.lane(), Some(0));
        assert_eq!(Xyzw::W.lane(), Some(3));
        assert!(Xyzw::Z.is_single());
        assert!(!(Xyzw::X | Xyzw::Y).is_single());
        assert_eq!((Xyzw::X | Xyzw::W).lane(), None);
    }

    #[test]
    fn test_full_masks() {
        assert!(Xyzw::all().is_full());
        assert!(Xyzw::empty().is_full());
        assert!(!Xyzw::from_field(7).is_full());
        assert_eq!(Xyzw::from_field(0x1f), Xyzw::all());
    }

    #[test]
    fn test_blend_imm_reverses_bits() {
        assert_eq!(Xyzw::X.blend_imm(), 0b0001);
        assert_eq!(Xyzw::W.blend_imm(), 0b1000);
        assert_eq!((Xyzw::X | Xyzw::Z).blend_imm(), 0b0101);
        assert_eq!(Xyzw::from_field(0b1101).host_lanes(), [true, true, false, true]);
    }
}
