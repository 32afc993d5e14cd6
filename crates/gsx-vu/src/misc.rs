//! Branch targets, VU0 address fixing, register backup and block search

use crate::microvu::{MicroVu, Vu1Sync};
use crate::regalloc::XMM_PQ;
use crate::xmm::Xmm;
use std::ops::{Deref, DerefMut};

/// Bytes compared by [`custom_search`]
pub const SEARCH_BYTES: usize = 0xa0;

/// Quadwords compared before the early exit
const SEARCH_EARLY_QUADS: usize = 2;

/// Resolved integer-unit memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VuAddress {
    /// Byte offset into the unit's own data memory
    Local(u32),
    /// Byte offset into VU1's register window, as mapped into VU0 space
    Vu1Regs(u32),
}

impl MicroVu {
    /// Byte address of a branch whose 11-bit signed offset is `imm11`,
    /// relative to the instruction at `ipc`
    pub fn branch_addr(&self, ipc: u32, imm11: i32) -> u32 {
        let target = (ipc as i32 + 2).wrapping_add(imm11.wrapping_mul(2)) as u32;
        (target & self.prog_mem_mask) * 4
    }

    /// Target of the branch one instruction pair later
    pub fn branch_addr_n(&self, ipc: u32, imm11: i32) -> u32 {
        let target = (ipc as i32 + 4).wrapping_add(imm11.wrapping_mul(2)) as u32;
        (target & self.prog_mem_mask) * 4
    }

    /// Map a quadword address from an integer register to a byte address
    ///
    /// VU0 addresses with bit 10 set reach VU1's registers. With VU1 on its
    /// own thread that access first waits for VU1, with every host register
    /// saved across the wait.
    pub fn addr_fix(&mut self, addr: u32, sync: &dyn Vu1Sync) -> VuAddress {
        if self.is_vu1() {
            return VuAddress::Local((addr & 0x3ff) << 4);
        }

        if addr & 0x400 != 0 {
            if self.mtvu {
                let _backup = ScopedXmmBackup::new(self, true);
                tracing::trace!("VU0 access to VU1 registers at 0x{:x}, waiting for VU1", addr);
                sync.wait_vu1();
            }
            VuAddress::Vu1Regs((addr & 0x3f) << 4)
        } else {
            VuAddress::Local((addr & 0xff) << 4)
        }
    }

    /// Save host registers
    ///
    /// `to_memory` saves the whole file. Otherwise dirty cached registers are
    /// flushed and only the P/Q register is kept.
    pub fn backup_regs(&mut self, to_memory: bool) {
        if to_memory {
            self.xmm_backup = *self.xmm.all();
        } else {
            self.reg_alloc.flush_all(&self.xmm, &mut self.regs.vf);
            self.xmm_backup[XMM_PQ.index()] = self.xmm.get(XMM_PQ);
        }
    }

    /// Inverse of [`MicroVu::backup_regs`]
    pub fn restore_regs(&mut self, from_memory: bool) {
        if from_memory {
            *self.xmm.all_mut() = self.xmm_backup;
        } else {
            self.xmm.set(XMM_PQ, self.xmm_backup[XMM_PQ.index()]);
        }
    }
}

/// Host registers saved for the guard's lifetime
pub struct ScopedXmmBackup<'a> {
    vu: &'a mut MicroVu,
    to_memory: bool,
}

impl<'a> ScopedXmmBackup<'a> {
    pub fn new(vu: &'a mut MicroVu, to_memory: bool) -> Self {
        vu.backup_regs(to_memory);
        Self { vu, to_memory }
    }
}

impl Deref for ScopedXmmBackup<'_> {
    type Target = MicroVu;

    fn deref(&self) -> &MicroVu {
        self.vu
    }
}

impl DerefMut for ScopedXmmBackup<'_> {
    fn deref_mut(&mut self) -> &mut MicroVu {
        self.vu
    }
}

impl Drop for ScopedXmmBackup<'_> {
    fn drop(&mut self) {
        self.vu.restore_regs(self.to_memory);
    }
}

fn quad(block: &[u8; SEARCH_BYTES], i: usize) -> Xmm {
    bytemuck::pod_read_unaligned(&block[i * 16..i * 16 + 16])
}

fn cmp_quads(a: &[u8; SEARCH_BYTES], b: &[u8; SEARCH_BYTES], i: usize) -> Xmm {
    let (x, y) = (quad(a, i), quad(b, i));
    Xmm(std::array::from_fn(|l| if x.0[l] == y.0[l] { u32::MAX } else { 0 }))
}

fn and(a: Xmm, b: Xmm) -> Xmm {
    Xmm(std::array::from_fn(|l| a.0[l] & b.0[l]))
}

fn mask(v: Xmm) -> u32 {
    v.0.iter().enumerate().fold(0, |m, (i, l)| m | ((l >> 31) << i))
}

/// Compare two cached program blocks
///
/// Returns a 4-bit lane mask, 0xf when the blocks are identical. A
/// difference in the first two quadwords returns their mask without
/// looking further.
pub fn custom_search(a: &[u8; SEARCH_BYTES], b: &[u8; SEARCH_BYTES]) -> u32 {
    let quads = SEARCH_BYTES / 16;

    let head = (0..SEARCH_EARLY_QUADS)
        .map(|i| cmp_quads(a, b, i))
        .fold(Xmm::splat(u32::MAX), and);
    let early = mask(head);
    if early < 0xf {
        return early;
    }

    let all = (SEARCH_EARLY_QUADS..quads)
        .map(|i| cmp_quads(a, b, i))
        .fold(head, and);
    mask(all)
}

/// True when both blocks hold the same bytes
pub fn blocks_match(a: &[u8; SEARCH_BYTES], b: &[u8; SEARCH_BYTES]) -> bool {
    custom_search(a, b) == 0xf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmm::XmmReg;
    use gsx_core::config::VuConfig;
    use std::cell::Cell;

    struct CountingSync(Cell<u32>);

    impl Vu1Sync for CountingSync {
        fn wait_vu1(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn unit(index: u32, mtvu: bool) -> MicroVu {
        let config = VuConfig {
            mtvu,
            ..VuConfig::default()
        };
        MicroVu::new(index, &config)
    }

    #[test]
    fn test_branch_addr() {
        let vu0 = unit(0, false);
        let vu1 = unit(1, false);

        assert_eq!(vu0.branch_addr(0x10, 3), (0x10 + 2 + 6) * 4);
        assert_eq!(vu0.branch_addr_n(0x10, 3), (0x10 + 4 + 6) * 4);
        assert_eq!(vu0.branch_addr(0, -1), 0);
        // Wraps within micro memory
        assert_eq!(vu0.branch_addr(0, -2), 0x3fe * 4);
        assert_eq!(vu0.branch_addr(0x3fe, 1), 2 * 4);
        assert_eq!(vu1.branch_addr(0x3fe, 1), 0x402 * 4);
    }

    #[test]
    fn test_addr_fix_vu1_is_local() {
        let mut vu1 = unit(1, true);
        let sync = CountingSync(Cell::new(0));
        assert_eq!(vu1.addr_fix(0x7ff, &sync), VuAddress::Local(0x3ff << 4));
        assert_eq!(sync.0.get(), 0);
    }

    #[test]
    fn test_addr_fix_vu0() {
        let mut vu0 = unit(0, false);
        let sync = CountingSync(Cell::new(0));

        assert_eq!(vu0.addr_fix(0x1ff, &sync), VuAddress::Local(0xff << 4));
        assert_eq!(vu0.addr_fix(0x421, &sync), VuAddress::Vu1Regs(0x21 << 4));
        assert_eq!(sync.0.get(), 0);
    }

    #[test]
    fn test_addr_fix_waits_under_mtvu() {
        let mut vu0 = unit(0, true);
        let sync = CountingSync(Cell::new(0));
        let regs: Vec<_> = (0..16u32).map(|i| Xmm::splat(i * 0x11)).collect();
        for (i, &v) in regs.iter().enumerate() {
            vu0.xmm.set(XmmReg(i as u8), v);
        }

        assert_eq!(vu0.addr_fix(0x43f, &sync), VuAddress::Vu1Regs(0x3f << 4));
        assert_eq!(sync.0.get(), 1);
        assert_eq!(vu0.xmm.all()[..], regs[..]);

        vu0.addr_fix(0x10, &sync);
        assert_eq!(sync.0.get(), 1);
    }

    #[test]
    fn test_scoped_backup_restores_everything() {
        let mut vu = unit(0, false);
        vu.xmm.set(XmmReg(2), Xmm::splat(2));
        vu.xmm.set(XMM_PQ, Xmm::splat(0x99));

        {
            let mut guard = ScopedXmmBackup::new(&mut vu, true);
            for i in 0..16 {
                guard.xmm.set(XmmReg(i), Xmm::splat(0xdead));
            }
        }
        assert_eq!(vu.xmm.get(XmmReg(2)), Xmm::splat(2));
        assert_eq!(vu.xmm.get(XMM_PQ), Xmm::splat(0x99));
    }

    #[test]
    fn test_register_backup_flushes_and_keeps_pq() {
        let mut vu = unit(0, false);
        let r = vu.alloc_vf(4, true).unwrap();
        vu.xmm.set(r, Xmm::splat(0x44));
        vu.xmm.set(XMM_PQ, Xmm::splat(0x99));

        {
            let mut guard = ScopedXmmBackup::new(&mut vu, false);
            assert_eq!(guard.regs.vf[4], Xmm::splat(0x44));
            assert_eq!(guard.reg_alloc.in_use(), 0);
            guard.xmm.set(XMM_PQ, Xmm::ZERO);
            guard.xmm.set(r, Xmm::ZERO);
        }

        assert_eq!(vu.xmm.get(XMM_PQ), Xmm::splat(0x99));
        // Only P/Q comes back
        assert_eq!(vu.xmm.get(r), Xmm::ZERO);
        assert_eq!(vu.regs.vf[4], Xmm::splat(0x44));
    }

    #[test]
    fn test_custom_search() {
        let a: [u8; SEARCH_BYTES] = std::array::from_fn(|i| i as u8);
        let mut b = a;
        assert_eq!(custom_search(&a, &b), 0xf);
        assert!(blocks_match(&a, &b));

        // Difference in the first quadword, lane 1
        b[4] ^= 1;
        assert_eq!(custom_search(&a, &b), 0b1101);

        // Difference past the early check, lane 3 of the last quadword
        let mut c = a;
        c[SEARCH_BYTES - 1] ^= 0x80;
        assert_eq!(custom_search(&a, &c), 0b0111);
        assert!(!blocks_match(&a, &c));
    }
}
