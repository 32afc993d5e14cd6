//! Host register allocator
//!
//! Host registers either hold a temporary or cache one VF register. A
//! register marked needed belongs to the current instruction and is never
//! handed out again until [`RegAlloc::clear_needed`] releases it. Released
//! registers keep their cached VF value until evicted or flushed.

use crate::xmm::{Xmm, XmmFile, XmmReg, XMM_COUNT};
use gsx_core::error::VuError;

/// Number of VF registers
pub const VF_COUNT: usize = 32;

/// Host register holding the P and Q pipeline state, never allocated
pub const XMM_PQ: XmmReg = XmmReg(XMM_COUNT as u8 - 1);

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    vf: Option<u8>,
    needed: bool,
    dirty: bool,
    age: u32,
}

#[derive(Debug, Clone)]
pub struct RegAlloc {
    slots: [Slot; XMM_COUNT],
    count: usize,
    counter: u32,
}

impl Default for RegAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl RegAlloc {
    /// Allocator over every host register except [`XMM_PQ`]
    pub fn new() -> Self {
        Self {
            slots: [Slot::default(); XMM_COUNT],
            count: XMM_PQ.index(),
            counter: 0,
        }
    }

    /// Registers the allocator may hand out
    pub fn capacity(&self) -> usize {
        self.count
    }

    /// Registers currently marked needed
    pub fn in_use(&self) -> usize {
        self.slots[..self.count].iter().filter(|s| s.needed).count()
    }

    pub fn is_needed(&self, reg: XmmReg) -> bool {
        self.slots[reg.index()].needed
    }

    /// VF register cached in `reg`, if any
    pub fn cached_vf(&self, reg: XmmReg) -> Option<u8> {
        self.slots[reg.index()].vf
    }

    fn write_back(slot: &mut Slot, value: Xmm, vf: &mut [Xmm; VF_COUNT]) {
        if let (Some(index), true) = (slot.vf, slot.dirty) {
            // VF0 is hardwired
            if index != 0 {
                vf[index as usize] = value;
            }
        }
        slot.vf = None;
        slot.dirty = false;
    }

    /// Pick a free register, evicting the least recently used cached value
    fn take(&mut self, xmm: &XmmFile, vf: &mut [Xmm; VF_COUNT]) -> Result<XmmReg, VuError> {
        let free = (0..self.count).filter(|&i| !self.slots[i].needed);

        let pick = free
            .min_by_key(|&i| (self.slots[i].vf.is_some(), self.slots[i].age))
            .ok_or(VuError::NoFreeRegister(self.count))?;

        let reg = XmmReg(pick as u8);
        let slot = &mut self.slots[pick];
        if let Some(index) = slot.vf {
            tracing::trace!("Evicting VF{:02} from xmm{}", index, pick);
        }
        Self::write_back(slot, xmm.get(reg), vf);

        self.counter += 1;
        slot.needed = true;
        slot.age = self.counter;
        Ok(reg)
    }

    /// Allocate a temporary
    pub fn alloc_reg(&mut self, xmm: &XmmFile, vf: &mut [Xmm; VF_COUNT]) -> Result<XmmReg, VuError> {
        self.take(xmm, vf)
    }

    /// Allocate the register caching VF `index`, loading it on first use
    ///
    /// With `write` set the cached value is written back on eviction or
    /// flush.
    pub fn alloc_vf(
        &mut self,
        xmm: &mut XmmFile,
        vf: &mut [Xmm; VF_COUNT],
        index: u8,
        write: bool,
    ) -> Result<XmmReg, VuError> {
        let index = index & (VF_COUNT as u8 - 1);

        if let Some(i) = (0..self.count).find(|&i| self.slots[i].vf == Some(index)) {
            self.counter += 1;
            let slot = &mut self.slots[i];
            slot.needed = true;
            slot.dirty |= write;
            slot.age = self.counter;
            return Ok(XmmReg(i as u8));
        }

        let reg = self.take(xmm, vf)?;
        xmm.set(reg, vf[index as usize]);

        let slot = &mut self.slots[reg.index()];
        slot.vf = Some(index);
        slot.dirty = write;
        Ok(reg)
    }

    /// Release `reg` for reuse
    pub fn clear_needed(&mut self, reg: XmmReg) {
        self.slots[reg.index()].needed = false;
    }

    /// Write back every dirty cached register and forget all cached values
    pub fn flush_all(&mut self, xmm: &XmmFile, vf: &mut [Xmm; VF_COUNT]) {
        let mut written = 0;

        for i in 0..self.count {
            let slot = &mut self.slots[i];
            if slot.dirty {
                written += 1;
            }
            Self::write_back(slot, xmm.get(XmmReg(i as u8)), vf);
            slot.needed = false;
        }

        tracing::trace!("Register flush wrote back {} VF registers", written);
    }
}
