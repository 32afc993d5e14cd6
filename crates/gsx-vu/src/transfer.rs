//! Lane-masked register loads, stores and merges
//!
//! Stores come in two sequences: one using `extractps` and a portable one
//! built from shuffles. Both write only the selected lanes to memory but
//! leave different garbage in the source register, and callers rely on the
//! exact leftovers.

use crate::lanes::Xyzw;
use crate::xmm::{Xmm, XmmFile, XmmReg};
use gsx_core::error::VuError;

/// Broadcast `lane` of `src` into every lane of `dst`
pub fn unpack_xyzw(xmm: &mut XmmFile, dst: XmmReg, src: XmmReg, lane: usize) {
    let imm = match lane & 3 {
        0 => 0x00,
        1 => 0x55,
        2 => 0xaa,
        _ => 0xff,
    };
    xmm.pshufd(dst, src, imm);
}

/// Load the lanes of `xyzw` from the quadword at `addr`
///
/// A single lane lands in lane 0 with the rest zeroed; any other mask is a
/// full 128-bit load.
pub fn load_reg(xmm: &mut XmmFile, reg: XmmReg, mem: &[u8], addr: u32, xyzw: Xyzw) -> Result<(), VuError> {
    match xyzw.lane() {
        Some(lane) => xmm.movss_load(reg, mem, addr + lane as u32 * 4),
        None => xmm.movaps_load(reg, mem, addr),
    }
}

/// Load the I register, broadcast unless a single lane is wanted
pub fn load_i_reg(xmm: &mut XmmFile, reg: XmmReg, i: u32, xyzw: Xyzw) {
    xmm.set(reg, Xmm([i, 0, 0, 0]));
    if !xyzw.is_single() {
        xmm.shufps(reg, reg, 0);
    }
}

/// Store the lanes of `xyzw` to the quadword at `addr`, clobbering `reg`
///
/// With `modify` set a single-lane value is taken from lane 0 instead of
/// its own lane.
pub fn save_reg(
    xmm: &mut XmmFile,
    reg: XmmReg,
    mem: &mut [u8],
    addr: u32,
    xyzw: Xyzw,
    modify: bool,
    sse4: bool,
) -> Result<(), VuError> {
    if sse4 {
        save_reg_sse4(xmm, reg, mem, addr, xyzw, modify)
    } else {
        save_reg_portable(xmm, reg, mem, addr, xyzw, modify)
    }
}

/// Stores shared by both sequences
fn save_common(
    xmm: &mut XmmFile,
    reg: XmmReg,
    mem: &mut [u8],
    addr: u32,
    xyzw: Xyzw,
    modify: bool,
) -> Result<(), VuError> {
    match xyzw.bits() {
        // YZ
        6 => {
            xmm.pshufd(reg, reg, 0xc9);
            xmm.movlps_store(mem, addr + 4, reg)
        }
        // XZW
        11 => {
            xmm.movss_store(mem, addr, reg)?;
            xmm.movhps_store(mem, addr + 8, reg)
        }
        4 | 2 | 1 => {
            let lane = xyzw.lane().unwrap_or(0);
            if !modify {
                unpack_xyzw(xmm, reg, reg, lane);
            }
            xmm.movss_store(mem, addr + lane as u32 * 4, reg)
        }
        8 => xmm.movss_store(mem, addr, reg),
        12 => xmm.movlps_store(mem, addr, reg),
        3 => xmm.movhps_store(mem, addr + 8, reg),
        _ => xmm.movaps_store(mem, addr, reg),
    }
}

pub fn save_reg_sse4(
    xmm: &mut XmmFile,
    reg: XmmReg,
    mem: &mut [u8],
    addr: u32,
    xyzw: Xyzw,
    modify: bool,
) -> Result<(), VuError> {
    match xyzw.bits() {
        // YW
        5 => {
            xmm.extractps_store(mem, addr + 4, reg, 1)?;
            xmm.extractps_store(mem, addr + 12, reg, 3)
        }
        // YZW
        7 => {
            xmm.movhps_store(mem, addr + 8, reg)?;
            xmm.extractps_store(mem, addr + 4, reg, 1)
        }
        // XW
        9 => {
            xmm.movss_store(mem, addr, reg)?;
            xmm.extractps_store(mem, addr + 12, reg, 3)
        }
        // XZ
        10 => {
            xmm.movss_store(mem, addr, reg)?;
            xmm.extractps_store(mem, addr + 8, reg, 2)
        }
        // XYW
        13 => {
            xmm.movlps_store(mem, addr, reg)?;
            xmm.extractps_store(mem, addr + 12, reg, 3)
        }
        // XYZ
        14 => {
            xmm.movlps_store(mem, addr, reg)?;
            xmm.extractps_store(mem, addr + 8, reg, 2)
        }
        _ => save_common(xmm, reg, mem, addr, xyzw, modify),
    }
}

pub fn save_reg_portable(
    xmm: &mut XmmFile,
    reg: XmmReg,
    mem: &mut [u8],
    addr: u32,
    xyzw: Xyzw,
    modify: bool,
) -> Result<(), VuError> {
    match xyzw.bits() {
        // YW
        5 => {
            xmm.pshufd(reg, reg, 0xe1);
            xmm.movss_store(mem, addr + 4, reg)?;
            xmm.pshufd(reg, reg, 0xff);
            xmm.movss_store(mem, addr + 12, reg)
        }
        // YZW
        7 => {
            xmm.pshufd(reg, reg, 0x93);
            xmm.movhps_store(mem, addr + 4, reg)?;
            xmm.movss_store(mem, addr + 12, reg)
        }
        // XW
        9 => {
            xmm.movss_store(mem, addr, reg)?;
            xmm.pshufd(reg, reg, 0xff);
            xmm.movss_store(mem, addr + 12, reg)
        }
        // XZ
        10 => {
            xmm.movss_store(mem, addr, reg)?;
            xmm.movhlps(reg, reg);
            xmm.movss_store(mem, addr + 8, reg)
        }
        // XYW
        13 => {
            xmm.pshufd(reg, reg, 0x4b);
            xmm.movhps_store(mem, addr, reg)?;
            xmm.movss_store(mem, addr + 12, reg)
        }
        // XYZ
        14 => {
            xmm.movlps_store(mem, addr, reg)?;
            xmm.movhlps(reg, reg);
            xmm.movss_store(mem, addr + 8, reg)
        }
        _ => save_common(xmm, reg, mem, addr, xyzw, modify),
    }
}

/// Replace the `xyzw` lanes of `dest` with those of `src`
///
/// `src` may be clobbered. With `modify` set a single-lane value is taken
/// from lane 0 of `src`.
pub fn merge_regs(xmm: &mut XmmFile, dest: XmmReg, src: XmmReg, xyzw: Xyzw, modify: bool, sse4: bool) {
    if dest == src || xyzw.is_empty() {
        return;
    }

    let mask = xyzw.bits();

    if sse4 && mask != 0x8 && mask != 0xf {
        if modify {
            if let (true, Some(lane)) = (xyzw.is_single(), xyzw.lane()) {
                xmm.insertps(dest, src, 0, lane, 0);
                return;
            }
        }
        xmm.blendps(dest, src, xyzw.blend_imm());
        return;
    }

    match mask {
        1 => {
            if modify {
                unpack_xyzw(xmm, src, src, 0);
            }
            xmm.movhlps(src, dest);
            xmm.shufps(dest, src, 0xc4);
        }
        2 => {
            if modify {
                unpack_xyzw(xmm, src, src, 0);
            }
            xmm.movhlps(src, dest);
            xmm.shufps(dest, src, 0x64);
        }
        3 => xmm.shufps(dest, src, 0xe4),
        4 => {
            if modify {
                unpack_xyzw(xmm, src, src, 0);
            }
            xmm.movss(src, dest);
            xmm.movsd(dest, src);
        }
        5 => {
            xmm.shufps(dest, src, 0xd8);
            xmm.pshufd(dest, dest, 0xd8);
        }
        6 => {
            xmm.shufps(dest, src, 0x9c);
            xmm.pshufd(dest, dest, 0x78);
        }
        7 => {
            xmm.movss(src, dest);
            xmm.movaps(dest, src);
        }
        8 => xmm.movss(dest, src),
        9 => {
            xmm.shufps(dest, src, 0xc9);
            xmm.pshufd(dest, dest, 0xd2);
        }
        10 => {
            xmm.shufps(dest, src, 0x8d);
            xmm.pshufd(dest, dest, 0x72);
        }
        11 => {
            xmm.movss(dest, src);
            xmm.shufps(dest, src, 0xe4);
        }
        12 => xmm.movsd(dest, src),
        13 => {
            xmm.movhlps(dest, src);
            xmm.shufps(src, dest, 0x64);
            xmm.movaps(dest, src);
        }
        14 => {
            xmm.movhlps(dest, src);
            xmm.shufps(src, dest, 0xc4);
            xmm.movaps(dest, src);
        }
        _ => xmm.movaps(dest, src),
    }
}
