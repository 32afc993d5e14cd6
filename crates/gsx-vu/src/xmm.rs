//! Simulated host vector registers
//!
//! [`XmmFile`] holds 16 128-bit registers and implements the handful of SSE
//! operations the microVU helpers are written in. Each method has the
//! register-to-register semantics of the instruction it is named after, so
//! helper sequences clobber their operands exactly as the emitted code would.

use bytemuck::{Pod, Zeroable};
use gsx_core::error::VuError;

/// Number of host vector registers
pub const XMM_COUNT: usize = 16;

/// One 128-bit register, lane 0 first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C, align(16))]
pub struct Xmm(pub [u32; 4]);

impl Xmm {
    pub const ZERO: Self = Self([0; 4]);

    pub const fn splat(v: u32) -> Self {
        Self([v; 4])
    }

    pub fn from_f32(v: [f32; 4]) -> Self {
        Self(v.map(f32::to_bits))
    }

    pub fn to_f32(self) -> [f32; 4] {
        self.0.map(f32::from_bits)
    }

    /// Lanes 0-1 or 2-3 as one double
    #[inline]
    fn f64_lane(self, i: usize) -> f64 {
        f64::from_bits(self.0[i * 2] as u64 | ((self.0[i * 2 + 1] as u64) << 32))
    }

    #[inline]
    fn set_f64_lane(&mut self, i: usize, v: f64) {
        let bits = v.to_bits();
        self.0[i * 2] = bits as u32;
        self.0[i * 2 + 1] = (bits >> 32) as u32;
    }
}

/// Host register index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmmReg(pub u8);

impl XmmReg {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize & (XMM_COUNT - 1)
    }
}

/// Scalar float operations with a packed and a single-lane form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FloatOp {
    #[inline]
    pub fn apply(self, a: u32, b: u32) -> u32 {
        let (a, b) = (f32::from_bits(a), f32::from_bits(b));
        match self {
            FloatOp::Add => a + b,
            FloatOp::Sub => a - b,
            FloatOp::Mul => a * b,
            FloatOp::Div => a / b,
        }
        .to_bits()
    }
}

fn check_range(mem: &[u8], addr: u32, len: usize) -> Result<usize, VuError> {
    let start = addr as usize;
    if start + len > mem.len() {
        return Err(VuError::OutOfRange {
            addr,
            size: mem.len(),
        });
    }
    Ok(start)
}

fn check_aligned(mem: &[u8], addr: u32) -> Result<usize, VuError> {
    if addr & 15 != 0 {
        return Err(VuError::Unaligned(addr));
    }
    check_range(mem, addr, 16)
}

/// Read a little-endian u32 from `mem`
pub fn read_u32(mem: &[u8], addr: u32) -> Result<u32, VuError> {
    let p = check_range(mem, addr, 4)?;
    Ok(bytemuck::pod_read_unaligned(&mem[p..p + 4]))
}

/// Write a little-endian u32 into `mem`
pub fn write_u32(mem: &mut [u8], addr: u32, v: u32) -> Result<(), VuError> {
    let p = check_range(mem, addr, 4)?;
    mem[p..p + 4].copy_from_slice(bytemuck::bytes_of(&v));
    Ok(())
}

/// Host register file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmmFile {
    regs: [Xmm; XMM_COUNT],
}

impl XmmFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, r: XmmReg) -> Xmm {
        self.regs[r.index()]
    }

    #[inline]
    pub fn set(&mut self, r: XmmReg, v: Xmm) {
        self.regs[r.index()] = v;
    }

    #[inline]
    fn lanes(&self, r: XmmReg) -> [u32; 4] {
        self.regs[r.index()].0
    }

    #[inline]
    fn lanes_mut(&mut self, r: XmmReg) -> &mut [u32; 4] {
        &mut self.regs[r.index()].0
    }

    pub fn all(&self) -> &[Xmm; XMM_COUNT] {
        &self.regs
    }

    pub fn all_mut(&mut self) -> &mut [Xmm; XMM_COUNT] {
        &mut self.regs
    }

    // Moves

    pub fn movaps(&mut self, dst: XmmReg, src: XmmReg) {
        self.set(dst, self.get(src));
    }

    /// Lane 0 from `src`
    pub fn movss(&mut self, dst: XmmReg, src: XmmReg) {
        let s = self.lanes(src);
        self.lanes_mut(dst)[0] = s[0];
    }

    /// Lanes 0-1 from `src`
    pub fn movsd(&mut self, dst: XmmReg, src: XmmReg) {
        let s = self.lanes(src);
        self.lanes_mut(dst)[..2].copy_from_slice(&s[..2]);
    }

    /// Lanes 0-1 from lanes 2-3 of `src`
    pub fn movhlps(&mut self, dst: XmmReg, src: XmmReg) {
        let s = self.lanes(src);
        self.lanes_mut(dst)[..2].copy_from_slice(&s[2..]);
    }

    pub fn pshufd(&mut self, dst: XmmReg, src: XmmReg, imm: u8) {
        let s = self.lanes(src);
        let d = self.lanes_mut(dst);
        for (i, lane) in d.iter_mut().enumerate() {
            *lane = s[((imm >> (i * 2)) & 3) as usize];
        }
    }

    /// Lanes 0-1 selected from `dst`, lanes 2-3 from `src`
    pub fn shufps(&mut self, dst: XmmReg, src: XmmReg, imm: u8) {
        let (d, s) = (self.lanes(dst), self.lanes(src));
        let sel = |i: usize| ((imm >> (i * 2)) & 3) as usize;
        self.set(dst, Xmm([d[sel(0)], d[sel(1)], s[sel(2)], s[sel(3)]]));
    }

    /// Lane `i` from `src` where bit `i` of `imm` is set
    pub fn blendps(&mut self, dst: XmmReg, src: XmmReg, imm: u8) {
        let s = self.lanes(src);
        let d = self.lanes_mut(dst);
        for (i, lane) in d.iter_mut().enumerate() {
            if imm & (1 << i) != 0 {
                *lane = s[i];
            }
        }
    }

    /// Copy lane `from` of `src` into lane `to` of `dst`, then zero the
    /// lanes in `zero_mask`
    pub fn insertps(&mut self, dst: XmmReg, src: XmmReg, from: usize, to: usize, zero_mask: u8) {
        let v = self.lanes(src)[from & 3];
        let d = self.lanes_mut(dst);
        d[to & 3] = v;
        for (i, lane) in d.iter_mut().enumerate() {
            if zero_mask & (1 << i) != 0 {
                *lane = 0;
            }
        }
    }

    // Bitwise

    fn zip(&mut self, dst: XmmReg, src: XmmReg, f: impl Fn(u32, u32) -> u32) {
        let s = self.lanes(src);
        let d = self.lanes_mut(dst);
        for (a, b) in d.iter_mut().zip(s) {
            *a = f(*a, b);
        }
    }

    pub fn pand(&mut self, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| a & b);
    }

    /// `dst = !dst & src`
    pub fn pandn(&mut self, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| !a & b);
    }

    pub fn por(&mut self, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| a | b);
    }

    pub fn pxor(&mut self, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| a ^ b);
    }

    pub fn pand_const(&mut self, dst: XmmReg, mask: &Xmm) {
        for (a, b) in self.lanes_mut(dst).iter_mut().zip(mask.0) {
            *a &= b;
        }
    }

    pub fn por_const(&mut self, dst: XmmReg, mask: &Xmm) {
        for (a, b) in self.lanes_mut(dst).iter_mut().zip(mask.0) {
            *a |= b;
        }
    }

    pub fn psrad(&mut self, dst: XmmReg, n: u32) {
        for a in self.lanes_mut(dst) {
            *a = ((*a as i32) >> n.min(31)) as u32;
        }
    }

    pub fn psrld(&mut self, dst: XmmReg, n: u32) {
        for a in self.lanes_mut(dst) {
            *a = a.checked_shr(n).unwrap_or(0);
        }
    }

    /// Signed compare, all ones where `dst > src`
    pub fn pcmpgtd(&mut self, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| if (a as i32) > (b as i32) { u32::MAX } else { 0 });
    }

    pub fn pcmpeqd(&mut self, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| if a == b { u32::MAX } else { 0 });
    }

    /// Sign bits of the four lanes, lane 0 in bit 0
    pub fn movmskps(&self, src: XmmReg) -> u32 {
        self.lanes(src)
            .iter()
            .enumerate()
            .fold(0, |m, (i, v)| m | ((v >> 31) << i))
    }

    // Arithmetic

    pub fn op_ps(&mut self, op: FloatOp, dst: XmmReg, src: XmmReg) {
        self.zip(dst, src, |a, b| op.apply(a, b));
    }

    pub fn op_ss(&mut self, op: FloatOp, dst: XmmReg, src: XmmReg) {
        let s = self.lanes(src);
        let d = self.lanes_mut(dst);
        d[0] = op.apply(d[0], s[0]);
    }

    /// Packed double minimum; `src` wins ties and unordered pairs
    pub fn minpd(&mut self, dst: XmmReg, src: XmmReg) {
        let (mut d, s) = (self.get(dst), self.get(src));
        for i in 0..2 {
            let (a, b) = (d.f64_lane(i), s.f64_lane(i));
            d.set_f64_lane(i, if a < b { a } else { b });
        }
        self.set(dst, d);
    }

    /// Packed double maximum; `src` wins ties and unordered pairs
    pub fn maxpd(&mut self, dst: XmmReg, src: XmmReg) {
        let (mut d, s) = (self.get(dst), self.get(src));
        for i in 0..2 {
            let (a, b) = (d.f64_lane(i), s.f64_lane(i));
            d.set_f64_lane(i, if a > b { a } else { b });
        }
        self.set(dst, d);
    }

    // Memory

    /// Zero-extending scalar load
    pub fn movss_load(&mut self, dst: XmmReg, mem: &[u8], addr: u32) -> Result<(), VuError> {
        let v = read_u32(mem, addr)?;
        self.set(dst, Xmm([v, 0, 0, 0]));
        Ok(())
    }

    pub fn movaps_load(&mut self, dst: XmmReg, mem: &[u8], addr: u32) -> Result<(), VuError> {
        let p = check_aligned(mem, addr)?;
        self.set(dst, bytemuck::pod_read_unaligned(&mem[p..p + 16]));
        Ok(())
    }

    pub fn movss_store(&self, mem: &mut [u8], addr: u32, src: XmmReg) -> Result<(), VuError> {
        write_u32(mem, addr, self.lanes(src)[0])
    }

    /// Store lanes 0-1
    pub fn movlps_store(&self, mem: &mut [u8], addr: u32, src: XmmReg) -> Result<(), VuError> {
        let p = check_range(mem, addr, 8)?;
        mem[p..p + 8].copy_from_slice(bytemuck::cast_slice(&self.lanes(src)[..2]));
        Ok(())
    }

    /// Store lanes 2-3
    pub fn movhps_store(&self, mem: &mut [u8], addr: u32, src: XmmReg) -> Result<(), VuError> {
        let p = check_range(mem, addr, 8)?;
        mem[p..p + 8].copy_from_slice(bytemuck::cast_slice(&self.lanes(src)[2..]));
        Ok(())
    }

    pub fn extractps_store(&self, mem: &mut [u8], addr: u32, src: XmmReg, lane: usize) -> Result<(), VuError> {
        write_u32(mem, addr, self.lanes(src)[lane & 3])
    }

    pub fn movaps_store(&self, mem: &mut [u8], addr: u32, src: XmmReg) -> Result<(), VuError> {
        let p = check_aligned(mem, addr)?;
        mem[p..p + 16].copy_from_slice(bytemuck::bytes_of(&self.regs[src.index()]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: XmmReg = XmmReg(0);
    const B: XmmReg = XmmReg(1);

    fn file(a: [u32; 4], b: [u32; 4]) -> XmmFile {
        let mut x = XmmFile::new();
        x.set(A, Xmm(a));
        x.set(B, Xmm(b));
        x
    }

    #[test]
    fn test_shuffles() {
        let mut x = file([0, 1, 2, 3], [4, 5, 6, 7]);
        x.pshufd(A, B, 0x1b);
        assert_eq!(x.get(A), Xmm([7, 6, 5, 4]));

        let mut x = file([0, 1, 2, 3], [4, 5, 6, 7]);
        x.shufps(A, B, 0xe4);
        assert_eq!(x.get(A), Xmm([0, 1, 6, 7]));

        let mut x = file([0, 1, 2, 3], [4, 5, 6, 7]);
        x.movhlps(A, B);
        assert_eq!(x.get(A), Xmm([6, 7, 2, 3]));

        let mut x = file([0, 1, 2, 3], [4, 5, 6, 7]);
        x.blendps(A, B, 0b1010);
        assert_eq!(x.get(A), Xmm([0, 5, 2, 7]));

        let mut x = file([0, 1, 2, 3], [4, 5, 6, 7]);
        x.insertps(A, B, 0, 3, 0);
        assert_eq!(x.get(A), Xmm([0, 1, 2, 4]));
    }

    #[test]
    fn test_integer_ops() {
        let mut x = file([0x8000_0000, 0x7fff_ffff, 5, 0xffff_fff0], [0, 0, 5, 1]);
        assert_eq!(x.movmskps(A), 0b1001);

        x.pcmpgtd(A, B);
        assert_eq!(x.get(A), Xmm([0, u32::MAX, 0, 0]));

        let mut x = file([0x8000_0000, 4, 0, 0], [0; 4]);
        x.psrad(A, 31);
        x.psrld(A, 1);
        assert_eq!(x.get(A), Xmm([0x7fff_ffff, 0, 0, 0]));
    }

    #[test]
    fn test_scalar_op_keeps_upper_lanes() {
        let mut x = XmmFile::new();
        x.set(A, Xmm::from_f32([1.0, 2.0, 3.0, 4.0]));
        x.set(B, Xmm::from_f32([0.5, 10.0, 10.0, 10.0]));
        x.op_ss(FloatOp::Add, A, B);
        assert_eq!(x.get(A).to_f32(), [1.5, 2.0, 3.0, 4.0]);
        x.op_ps(FloatOp::Mul, A, B);
        assert_eq!(x.get(A).to_f32(), [0.75, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_memory_access() {
        let mut mem = vec![0u8; 64];
        let mut x = file([0x11, 0x22, 0x33, 0x44], [0; 4]);

        x.movaps_store(&mut mem, 16, A).unwrap();
        assert_eq!(read_u32(&mem, 20).unwrap(), 0x22);

        x.movss_load(B, &mem, 28).unwrap();
        assert_eq!(x.get(B), Xmm([0x44, 0, 0, 0]));

        x.movhps_store(&mut mem, 0, A).unwrap();
        assert_eq!(&mem[..8], &[0x33, 0, 0, 0, 0x44, 0, 0, 0]);

        assert_eq!(x.movaps_load(B, &mem, 4), Err(VuError::Unaligned(4)));
        assert!(matches!(x.movss_store(&mut mem, 62, A), Err(VuError::OutOfRange { .. })));
    }
}
