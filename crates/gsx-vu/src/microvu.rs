//! Per-unit microVU state

use crate::lanes::Xyzw;
use crate::regalloc::{RegAlloc, VF_COUNT};
use crate::transfer;
use crate::xmm::{Xmm, XmmFile, XmmReg, XMM_COUNT};
use gsx_core::config::VuConfig;
use gsx_core::error::VuError;
use parking_lot::{Condvar, Mutex};

/// VU0 data memory size (4 KB)
pub const VU0_MEM_SIZE: usize = 4 * 1024;

/// VU1 data memory size (16 KB)
pub const VU1_MEM_SIZE: usize = 16 * 1024;

/// VU0 micro memory size (4 KB)
pub const VU0_PROG_SIZE: usize = 4 * 1024;

/// VU1 micro memory size (16 KB)
pub const VU1_PROG_SIZE: usize = 16 * 1024;

/// Number of integer registers, including the special registers
pub const VI_COUNT: usize = 32;

/// Index of the I register among the integer registers
pub const REG_I: usize = 21;

/// Architectural VU registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VuRegs {
    pub vf: [Xmm; VF_COUNT],
    pub vi: [u32; VI_COUNT],
}

impl Default for VuRegs {
    fn default() -> Self {
        let mut vf = [Xmm::ZERO; VF_COUNT];
        vf[0] = Xmm::from_f32([0.0, 0.0, 0.0, 1.0]);
        Self { vf, vi: [0; VI_COUNT] }
    }
}

impl VuRegs {
    /// Quadword `index` of the register window: 32 VF registers, then the
    /// integer registers one per quadword
    pub fn quad(&self, index: u32) -> Xmm {
        let index = index as usize & 0x3f;
        if index < VF_COUNT {
            self.vf[index]
        } else {
            Xmm([self.vi[index - VF_COUNT], 0, 0, 0])
        }
    }

    pub fn set_quad(&mut self, index: u32, v: Xmm) {
        let index = index as usize & 0x3f;
        if index < VF_COUNT {
            self.vf[index] = v;
        } else {
            self.vi[index - VF_COUNT] = v.0[0];
        }
    }
}

/// Blocks until VU1 has finished its in-flight work
pub trait Vu1Sync {
    fn wait_vu1(&self);
}

/// Synchronization for a VU1 running on its own thread
#[derive(Debug, Default)]
pub struct Vu1Thread {
    busy: Mutex<bool>,
    idle: Condvar,
}

impl Vu1Thread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark VU1 as running a program
    pub fn begin(&self) {
        *self.busy.lock() = true;
    }

    /// Mark VU1 idle and wake waiters
    pub fn finish(&self) {
        *self.busy.lock() = false;
        self.idle.notify_all();
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.lock()
    }
}

impl Vu1Sync for Vu1Thread {
    fn wait_vu1(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.idle.wait(&mut busy);
        }
    }
}

/// One vector unit's recompiler context
pub struct MicroVu {
    /// 0 or 1
    pub index: u32,
    pub xmm: XmmFile,
    pub reg_alloc: RegAlloc,
    pub regs: VuRegs,
    /// Data memory
    pub mem: Box<[u8]>,
    /// Micro memory size in instruction words, minus one
    pub prog_mem_mask: u32,
    pub xmm_backup: [Xmm; XMM_COUNT],
    pub sse4: bool,
    pub add_sub_hack: bool,
    pub mtvu: bool,
}

impl MicroVu {
    pub fn new(index: u32, config: &VuConfig) -> Self {
        let index = index & 1;
        let (mem_size, prog_size) = if index == 1 {
            (VU1_MEM_SIZE, VU1_PROG_SIZE)
        } else {
            (VU0_MEM_SIZE, VU0_PROG_SIZE)
        };

        tracing::debug!(
            "microVU{} created: {} KB data, {} KB micro memory, sse4={}",
            index,
            mem_size / 1024,
            prog_size / 1024,
            config.sse4
        );

        Self {
            index,
            xmm: XmmFile::new(),
            reg_alloc: RegAlloc::new(),
            regs: VuRegs::default(),
            mem: vec![0; mem_size].into_boxed_slice(),
            prog_mem_mask: (prog_size / 4 - 1) as u32,
            xmm_backup: [Xmm::ZERO; XMM_COUNT],
            sse4: config.sse4,
            add_sub_hack: config.add_sub_hack,
            mtvu: config.mtvu,
        }
    }

    pub fn is_vu1(&self) -> bool {
        self.index == 1
    }

    /// Allocate a temporary host register
    pub fn alloc_reg(&mut self) -> Result<XmmReg, VuError> {
        self.reg_alloc.alloc_reg(&self.xmm, &mut self.regs.vf)
    }

    /// Allocate the host register caching VF `index`
    pub fn alloc_vf(&mut self, index: u8, write: bool) -> Result<XmmReg, VuError> {
        self.reg_alloc.alloc_vf(&mut self.xmm, &mut self.regs.vf, index, write)
    }

    pub fn clear_needed(&mut self, reg: XmmReg) {
        self.reg_alloc.clear_needed(reg);
    }

    pub fn load_reg(&mut self, reg: XmmReg, addr: u32, xyzw: Xyzw) -> Result<(), VuError> {
        transfer::load_reg(&mut self.xmm, reg, &self.mem, addr, xyzw)
    }

    pub fn load_i_reg(&mut self, reg: XmmReg, xyzw: Xyzw) {
        transfer::load_i_reg(&mut self.xmm, reg, self.regs.vi[REG_I], xyzw);
    }

    /// Store through the sequence selected by the `sse4` setting
    pub fn save_reg(&mut self, reg: XmmReg, addr: u32, xyzw: Xyzw, modify: bool) -> Result<(), VuError> {
        transfer::save_reg(&mut self.xmm, reg, &mut self.mem, addr, xyzw, modify, self.sse4)
    }

    pub fn merge_regs(&mut self, dest: XmmReg, src: XmmReg, xyzw: Xyzw, modify: bool) {
        transfer::merge_regs(&mut self.xmm, dest, src, xyzw, modify, self.sse4);
    }
}

impl std::fmt::Debug for MicroVu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicroVu")
            .field("index", &self.index)
            .field("mem_size", &self.mem.len())
            .field("prog_mem_mask", &self.prog_mem_mask)
            .field("sse4", &self.sse4)
            .field("add_sub_hack", &self.add_sub_hack)
            .field("mtvu", &self.mtvu)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_unit_sizes() {
        let config = VuConfig::default();
        let vu0 = MicroVu::new(0, &config);
        let vu1 = MicroVu::new(1, &config);

        assert_eq!(vu0.mem.len(), VU0_MEM_SIZE);
        assert_eq!(vu1.mem.len(), VU1_MEM_SIZE);
        assert_eq!(vu0.prog_mem_mask, 0x3ff);
        assert_eq!(vu1.prog_mem_mask, 0xfff);
        assert!(vu1.is_vu1());
        assert_eq!(vu0.regs.vf[0], Xmm::from_f32([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_register_window() {
        let mut regs = VuRegs::default();
        regs.set_quad(3, Xmm([1, 2, 3, 4]));
        regs.set_quad(VF_COUNT as u32 + REG_I as u32, Xmm([0x4000_0000, 9, 9, 9]));

        assert_eq!(regs.vf[3], Xmm([1, 2, 3, 4]));
        assert_eq!(regs.vi[REG_I], 0x4000_0000);
        assert_eq!(regs.quad(VF_COUNT as u32 + REG_I as u32), Xmm([0x4000_0000, 0, 0, 0]));
    }

    #[test]
    fn test_store_then_load_through_context() {
        let mut vu = MicroVu::new(0, &VuConfig::default());
        let r = vu.alloc_reg().unwrap();
        vu.xmm.set(r, Xmm([1, 2, 3, 4]));

        vu.save_reg(r, 0x20, Xyzw::all(), false).unwrap();
        vu.load_reg(r, 0x20, Xyzw::Y).unwrap();
        assert_eq!(vu.xmm.get(r), Xmm([2, 0, 0, 0]));

        vu.regs.vi[REG_I] = 0x3f80_0000;
        vu.load_i_reg(r, Xyzw::all());
        assert_eq!(vu.xmm.get(r), Xmm::splat(0x3f80_0000));

        assert!(vu.save_reg(r, VU0_MEM_SIZE as u32, Xyzw::X, false).is_err());
    }

    #[test]
    fn test_wait_blocks_until_finish() {
        let sync = Arc::new(Vu1Thread::new());
        sync.begin();
        assert!(sync.is_busy());

        let worker = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                sync.finish();
            })
        };

        sync.wait_vu1();
        assert!(!sync.is_busy());
        worker.join().unwrap();

        // Idle units return immediately
        sync.wait_vu1();
    }
}
