//! GS local memory for gsx
//!
//! This crate models the 4 MiB local memory of the Graphics Synthesizer:
//! the per-format block/column swizzles, the format descriptor table,
//! per-buffer offset tables, host image transfers and texture readback.

pub mod constants;
pub mod format;
pub mod local;
pub mod offset;
pub mod psm;
pub mod regs;
pub mod swizzle;
pub mod tables;
pub mod texture;
pub mod transfer;
pub mod vram;

pub use constants::*;
pub use format::Format;
pub use local::LocalMemory;
pub use offset::{FzOffset, GsOffset, Page2TileMap, PageBits, PixelOffset, PixelOffset4, PixelOffsetKey, Rect, TileRow};
pub use psm::{psm_info, Access, Psm, PsmInfo, Size};
pub use regs::{BitBltBuf, Frame, Tex0, Texa, TrxPos, TrxReg, Zbuf};
pub use swizzle::Swizzle;
pub use transfer::TransferCursor;
pub use vram::Vram;

pub use gsx_core::error::MemoryError;

pub type Result<T> = std::result::Result<T, MemoryError>;
