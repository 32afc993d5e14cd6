//! microVU recompiler helpers for gsx
//!
//! Host register state is modeled as a sixteen-entry 128-bit register file.
//! The helpers here are the building blocks the recompiler emits: partial
//! lane loads, stores and merges, clamped float arithmetic, integer-compare
//! min/max, register allocation and VU0/VU1 address fixing.

pub mod float;
pub mod lanes;
pub mod microvu;
pub mod misc;
pub mod regalloc;
pub mod transfer;
pub mod xmm;

pub use float::{clamp_lane, MAX_FLOAT, TRIACE_EXPONENT_GAP};
pub use lanes::Xyzw;
pub use microvu::{MicroVu, Vu1Sync, Vu1Thread, VuRegs};
pub use misc::{blocks_match, custom_search, ScopedXmmBackup, VuAddress, SEARCH_BYTES};
pub use regalloc::{RegAlloc, VF_COUNT, XMM_PQ};
pub use xmm::{FloatOp, Xmm, XmmFile, XmmReg, XMM_COUNT};

pub use gsx_core::error::VuError;

pub type Result<T> = std::result::Result<T, VuError>;
