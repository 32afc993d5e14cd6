//! Core types for gsx
//!
//! This crate provides the error types, configuration and logging
//! bootstrap shared by the GS memory and microVU crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{GsError, MemoryError, Result, VuError};
