//! Error types for gsx

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("VU error: {0}")]
    Vu(#[from] VuError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Local memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Snapshot size mismatch: expected {expected} bytes, got {actual}")]
    SnapshotSize { expected: usize, actual: usize },

    #[error("Invalid pixel storage mode: 0x{0:02x}")]
    InvalidPsm(u32),
}

/// microVU helper errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VuError {
    #[error("Register allocation failed: all {0} xmm registers are in use")]
    NoFreeRegister(usize),

    #[error("Unaligned 128-bit access at 0x{0:x}")]
    Unaligned(u32),

    #[error("Access at 0x{addr:x} is outside the {size} byte window")]
    OutOfRange { addr: u32, size: usize },
}

pub type Result<T> = std::result::Result<T, GsError>;
