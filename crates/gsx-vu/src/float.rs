//! Clamped float helpers
//!
//! VU floats have no infinities or NaNs. Operands are clamped to the largest
//! finite single before each operation and the result after it. Min and max
//! compare the raw bit patterns as signed magnitudes, which orders every bit
//! pattern the way the VU does.
//!
//! Helpers take optional temporaries. Missing ones come from the register
//! allocator and are released before returning.

use crate::lanes::Xyzw;
use crate::microvu::MicroVu;
use crate::xmm::{FloatOp, Xmm, XmmReg};
use gsx_core::error::VuError;

/// Largest finite single, sign cleared
pub const MAX_FLOAT: u32 = 0x7f7f_ffff;

const SIGN_MASK: Xmm = Xmm::splat(0x8000_0000);

/// Lanes 0 and 2 kept, lanes 1 and 3 reduced to their sign
const MIN_MAX_1: Xmm = Xmm([0xffff_ffff, 0x8000_0000, 0xffff_ffff, 0x8000_0000]);

/// Exponent bits making the high halves a normal double
const MIN_MAX_2: Xmm = Xmm([0x0000_0000, 0x4000_0000, 0x0000_0000, 0x4000_0000]);

/// Lane 0 reduced to its sign
const ADD_SS: Xmm = Xmm([0x8000_0000, 0xffff_ffff, 0xffff_ffff, 0xffff_ffff]);

/// Exponent difference past which the smaller addend is dropped
pub const TRIACE_EXPONENT_GAP: i32 = 25;

/// Saturate an infinity or NaN to the signed maximum
#[inline]
pub const fn clamp_lane(v: u32) -> u32 {
    if v & 0x7f80_0000 == 0x7f80_0000 {
        (v & 0x8000_0000) | MAX_FLOAT
    } else {
        v
    }
}

#[inline]
const fn exponent(v: u32) -> i32 {
    ((v >> 23) & 0xff) as i32
}

impl MicroVu {
    fn temp(&mut self, given: Option<XmmReg>) -> Result<(XmmReg, bool), VuError> {
        match given {
            Some(reg) => Ok((reg, false)),
            None => Ok((self.alloc_reg()?, true)),
        }
    }

    fn release(&mut self, (reg, allocated): (XmmReg, bool)) {
        if allocated {
            self.clear_needed(reg);
        }
    }

    /// Clamp the `xyzw` lanes of `reg`; `t1` receives the sign bits
    pub fn clamp(&mut self, reg: XmmReg, t1: XmmReg, xyzw: Xyzw) {
        self.xmm.movaps(t1, reg);
        self.xmm.pand_const(t1, &SIGN_MASK);

        let mut v = self.xmm.get(reg);
        for (lane, selected) in v.0.iter_mut().zip(xyzw.host_lanes()) {
            if selected {
                *lane = clamp_lane(*lane);
            }
        }
        self.xmm.set(reg, v);
    }

    /// Packed min or max by integer comparison
    ///
    /// Modifies both temporaries.
    pub fn min_max_ps(
        &mut self,
        to: XmmReg,
        from: XmmReg,
        t1: Option<XmmReg>,
        t2: Option<XmmReg>,
        min: bool,
    ) -> Result<(), VuError> {
        let a = self.temp(t1)?;
        let b = match self.temp(t2) {
            Ok(b) => b,
            Err(e) => {
                self.release(a);
                return Err(e);
            }
        };
        let (t1, t2) = (a.0, b.0);
        let (c1, c2) = if min { (t2, t1) } else { (t1, t2) };

        let x = &mut self.xmm;
        x.movaps(t1, to);
        x.psrad(t1, 31);
        x.psrld(t1, 1);
        x.pxor(t1, to);

        x.movaps(t2, from);
        x.psrad(t2, 31);
        x.psrld(t2, 1);
        x.pxor(t2, from);

        x.pcmpgtd(c1, c2);
        x.pand(to, c1);
        x.pandn(c1, from);
        x.por(to, c1);

        self.release(a);
        self.release(b);
        Ok(())
    }

    /// Lane 0 min or max through a double comparison
    ///
    /// Each single becomes the low half of a double whose high half carries
    /// its sign and a fixed exponent, so double order matches VU order.
    /// Modifies the upper lanes of `to` and `t1`.
    pub fn min_max_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>, min: bool) -> Result<(), VuError> {
        let a = self.temp(t1)?;
        let t1 = a.0;

        let x = &mut self.xmm;
        x.shufps(to, from, 0);
        x.pand_const(to, &MIN_MAX_1);
        x.por_const(to, &MIN_MAX_2);
        x.pshufd(t1, to, 0xee);
        if min {
            x.minpd(to, t1);
        } else {
            x.maxpd(to, t1);
        }

        self.release(a);
        Ok(())
    }

    /// Single-lane add dropping an addend 25 or more binades smaller
    ///
    /// Modifies lane 0 of `from`.
    pub fn add_ss_triace(&mut self, to: XmmReg, from: XmmReg) {
        let x = &mut self.xmm;
        let diff = exponent(x.get(from).0[0]) - exponent(x.get(to).0[0]);

        if diff <= -TRIACE_EXPONENT_GAP {
            x.pand_const(from, &ADD_SS);
        } else if diff >= TRIACE_EXPONENT_GAP {
            x.pand_const(to, &ADD_SS);
        }

        x.op_ss(FloatOp::Add, to, from);
    }

    /// Clamp both operands, apply `op`, clamp the result
    ///
    /// The single-lane form only touches lane 0.
    pub fn clamp_op(
        &mut self,
        op: FloatOp,
        to: XmmReg,
        from: XmmReg,
        t1: Option<XmmReg>,
        packed: bool,
    ) -> Result<(), VuError> {
        let a = self.temp(t1)?;
        let lanes = if packed { Xyzw::all() } else { Xyzw::X };

        self.clamp(to, a.0, lanes);
        self.clamp(from, a.0, lanes);
        if packed {
            self.xmm.op_ps(op, to, from);
        } else {
            self.xmm.op_ss(op, to, from);
        }
        self.clamp(to, a.0, lanes);

        self.release(a);
        Ok(())
    }

    pub fn max_ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>, t2: Option<XmmReg>) -> Result<(), VuError> {
        self.min_max_ps(to, from, t1, t2, false)
    }

    pub fn min_ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>, t2: Option<XmmReg>) -> Result<(), VuError> {
        self.min_max_ps(to, from, t1, t2, true)
    }

    pub fn max_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.min_max_ss(to, from, t1, false)
    }

    pub fn min_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.min_max_ss(to, from, t1, true)
    }

    pub fn add_ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Add, to, from, t1, true)
    }

    pub fn add_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Add, to, from, t1, false)
    }

    pub fn sub_ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Sub, to, from, t1, true)
    }

    pub fn sub_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Sub, to, from, t1, false)
    }

    pub fn mul_ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Mul, to, from, t1, true)
    }

    pub fn mul_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Mul, to, from, t1, false)
    }

    pub fn div_ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Div, to, from, t1, true)
    }

    pub fn div_ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.clamp_op(FloatOp::Div, to, from, t1, false)
    }

    /// Single-lane add, with the TriAce exponent quirk when enabled
    pub fn add2ss(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        if self.add_sub_hack {
            self.add_ss_triace(to, from);
            Ok(())
        } else {
            self.add_ss(to, from, t1)
        }
    }

    /// Packed add; the quirk only exists for the single-lane form
    pub fn add2ps(&mut self, to: XmmReg, from: XmmReg, t1: Option<XmmReg>) -> Result<(), VuError> {
        self.add_ps(to, from, t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsx_core::config::VuConfig;

    const TO: XmmReg = XmmReg(0);
    const FROM: XmmReg = XmmReg(1);

    fn vu(add_sub_hack: bool) -> MicroVu {
        let config = VuConfig {
            add_sub_hack,
            ..VuConfig::default()
        };
        let mut vu = MicroVu::new(0, &config);
        // Keep the operands out of the allocator's hands
        let a = vu.alloc_reg().unwrap();
        let b = vu.alloc_reg().unwrap();
        assert_eq!((a, b), (TO, FROM));
        vu
    }

    fn operands(vu: &mut MicroVu, to: [f32; 4], from: [f32; 4]) {
        vu.xmm.set(TO, Xmm::from_f32(to));
        vu.xmm.set(FROM, Xmm::from_f32(from));
    }

    #[test]
    fn test_clamp_lane() {
        assert_eq!(clamp_lane(0x7f80_0000), MAX_FLOAT);
        assert_eq!(clamp_lane(0xff80_0000), 0xff7f_ffff);
        assert_eq!(clamp_lane(0x7fc0_0001), MAX_FLOAT);
        assert_eq!(clamp_lane(0x3f80_0000), 0x3f80_0000);
    }

    #[test]
    fn test_min_max_ps() {
        let mut vu = vu(false);
        let to = [1.0, -2.0, -0.0, 3.0];
        let from = [2.0, -1.0, 0.0, -5.0];

        operands(&mut vu, to, from);
        vu.max_ps(TO, FROM, None, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm::from_f32([2.0, -1.0, 0.0, 3.0]));

        operands(&mut vu, to, from);
        vu.min_ps(TO, FROM, None, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm::from_f32([1.0, -2.0, -0.0, -5.0]));

        assert_eq!(vu.reg_alloc.in_use(), 2);
    }

    #[test]
    fn test_min_max_ps_orders_non_finite_patterns() {
        let mut vu = vu(false);
        vu.xmm.set(TO, Xmm([0x7f80_0000, 0xff80_0000, 0x7fc0_0000, 1]));
        vu.xmm.set(FROM, Xmm([MAX_FLOAT, 0xff7f_ffff, 0x7f80_0000, 0x8000_0001]));
        vu.max_ps(TO, FROM, None, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm([0x7f80_0000, 0xff7f_ffff, 0x7fc0_0000, 1]));
    }

    #[test]
    fn test_min_max_ss() {
        let mut vu = vu(false);

        operands(&mut vu, [3.0, 7.0, 7.0, 7.0], [-4.0, 9.0, 9.0, 9.0]);
        vu.min_ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[0], (-4.0f32).to_bits());

        operands(&mut vu, [-1.0, 0.0, 0.0, 0.0], [-2.0, 0.0, 0.0, 0.0]);
        vu.max_ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[0], (-1.0f32).to_bits());

        operands(&mut vu, [-1.0, 0.0, 0.0, 0.0], [-2.0, 0.0, 0.0, 0.0]);
        vu.min_ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[0], (-2.0f32).to_bits());

        // The source is left alone
        assert_eq!(vu.xmm.get(FROM), Xmm::from_f32([-2.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_clamped_add_ps() {
        let mut vu = vu(false);
        vu.xmm.set(TO, Xmm([0x7f80_0000, 0xff80_0000, 0x7fc0_0000, 1.0f32.to_bits()]));
        vu.xmm.set(FROM, Xmm::from_f32([1.0; 4]));
        vu.add_ps(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm([MAX_FLOAT, 0xff7f_ffff, MAX_FLOAT, 2.0f32.to_bits()]));
    }

    #[test]
    fn test_clamped_results() {
        let mut vu = vu(false);
        operands(&mut vu, [f32::MAX, -f32::MAX, 1.0, -1.0], [2.0, 2.0, 0.0, 0.0]);
        vu.mul_ps(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[..2], [MAX_FLOAT, 0xff7f_ffff]);

        operands(&mut vu, [1.0, -1.0, 6.0, 0.0], [0.0, 0.0, 2.0, 1.0]);
        vu.div_ps(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm([MAX_FLOAT, 0xff7f_ffff, 3.0f32.to_bits(), 0]));

        operands(&mut vu, [5.0, 1.0, 1.0, 1.0], [8.0, 1.0, 1.0, 1.0]);
        vu.sub_ps(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm::from_f32([-3.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_scalar_ops_leave_upper_lanes() {
        let mut vu = vu(false);
        vu.xmm.set(TO, Xmm([2.0f32.to_bits(), 0x7f80_0000, 0xff80_0000, 0x7fc0_0000]));
        vu.xmm.set(FROM, Xmm::from_f32([3.0, 1.0, 1.0, 1.0]));
        vu.mul_ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO), Xmm([6.0f32.to_bits(), 0x7f80_0000, 0xff80_0000, 0x7fc0_0000]));

        vu.sub_ss(TO, FROM, None).unwrap();
        vu.div_ss(TO, FROM, None).unwrap();
        vu.add_ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[0], 4.0f32.to_bits());
    }

    #[test]
    fn test_supplied_temp_receives_signs() {
        let mut vu = vu(false);
        let t = XmmReg(5);
        operands(&mut vu, [-1.0, 2.0, -3.0, 4.0], [1.0; 4]);
        vu.add_ps(TO, FROM, Some(t)).unwrap();
        // Signs of the clamped result [0.0, 3.0, -2.0, 5.0]
        assert_eq!(vu.xmm.get(t), Xmm([0, 0, 0x8000_0000, 0]));
        assert!(!vu.reg_alloc.is_needed(t));
    }

    #[test]
    fn test_triace_drops_tiny_addend() {
        // -1.5 * 2^-25, 25 binades below 1.0
        let tiny = 0xb340_0000;

        let mut hacked = vu(true);
        hacked.xmm.set(TO, Xmm([1.0f32.to_bits(), 0, 0, 0]));
        hacked.xmm.set(FROM, Xmm([tiny, 0, 0, 0]));
        hacked.add2ss(TO, FROM, None).unwrap();
        assert_eq!(hacked.xmm.get(TO).0[0], 0x3f80_0000);
        assert_eq!(hacked.xmm.get(FROM).0[0], 0x8000_0000);

        let mut plain = vu(false);
        plain.xmm.set(TO, Xmm([1.0f32.to_bits(), 0, 0, 0]));
        plain.xmm.set(FROM, Xmm([tiny, 0, 0, 0]));
        plain.add2ss(TO, FROM, None).unwrap();
        assert_eq!(plain.xmm.get(TO).0[0], 0x3f7f_ffff);
    }

    #[test]
    fn test_triace_keeps_addend_24_binades_down() {
        // -1.5 * 2^-24, one binade short of being dropped
        let small = 0xb3c0_0000;

        for hack in [true, false] {
            let mut vu = vu(hack);
            vu.xmm.set(TO, Xmm([1.0f32.to_bits(), 0, 0, 0]));
            vu.xmm.set(FROM, Xmm([small, 0, 0, 0]));
            vu.add2ss(TO, FROM, None).unwrap();
            assert_eq!(vu.xmm.get(TO).0[0], 0x3f7f_fffe, "hack={hack}");
            assert_eq!(vu.xmm.get(FROM).0[0], small, "hack={hack}");
        }
    }

    #[test]
    fn test_triace_drops_tiny_destination() {
        let mut vu = vu(true);
        vu.xmm.set(TO, Xmm([0xb340_0000, 0, 0, 0]));
        vu.xmm.set(FROM, Xmm([1.0f32.to_bits(), 0, 0, 0]));
        vu.add2ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[0], 0x3f80_0000);

        // Within the gap both addends count
        vu.xmm.set(TO, Xmm([2.0f32.to_bits(), 0, 0, 0]));
        vu.xmm.set(FROM, Xmm([1.0f32.to_bits(), 0, 0, 0]));
        vu.add2ss(TO, FROM, None).unwrap();
        assert_eq!(vu.xmm.get(TO).0[0], 3.0f32.to_bits());
    }

    #[test]
    fn test_add2ps_matches_add_ps() {
        let mut a = vu(true);
        let mut b = vu(true);
        for vu in [&mut a, &mut b] {
            operands(vu, [1.0, f32::MAX, -3.0, 0.5], [2.0, f32::MAX, 1.0, 0.25]);
        }
        a.add2ps(TO, FROM, None).unwrap();
        b.add_ps(TO, FROM, None).unwrap();
        assert_eq!(a.xmm.get(TO), b.xmm.get(TO));
    }

    #[test]
    fn test_temp_exhaustion_releases_first_temp() {
        let mut vu = vu(false);
        while vu.reg_alloc.in_use() < vu.reg_alloc.capacity() - 1 {
            vu.alloc_reg().unwrap();
        }
        let before = vu.reg_alloc.in_use();
        assert!(matches!(vu.max_ps(TO, FROM, None, None), Err(VuError::NoFreeRegister(15))));
        assert_eq!(vu.reg_alloc.in_use(), before);
    }
}
