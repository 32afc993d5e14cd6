//! Configuration system for gsx

use crate::error::{GsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub memory: MemoryConfig,
    pub vu: VuConfig,
    pub debug: DebugConfig,
}

/// GS local memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Reads past the end of VRAM alias back to the start.
    ///
    /// Addresses are always wrapped by masking, so this only records the
    /// user's preference for backends that mirror the buffer.
    pub wrap_gs_mem: bool,
    /// Build all swizzle tables when the store is created instead of on first use
    pub prebuild_tables: bool,
}

/// microVU settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VuConfig {
    /// TriAce ADD/SUB exponent quirk for single-lane adds
    pub add_sub_hack: bool,
    /// VU1 runs on its own thread
    pub mtvu: bool,
    /// Use the SSE4 store/merge sequences
    pub sse4: bool,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    /// Log every image transfer chunk at trace level
    pub trace_transfers: bool,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            wrap_gs_mem: false,
            prebuild_tables: false,
        }
    }
}

impl Default for VuConfig {
    fn default() -> Self {
        Self {
            add_sub_hack: false,
            mtvu: false,
            sse4: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            trace_transfers: false,
        }
    }
}

impl Config {
    /// Load configuration from the default path, or create it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, writing defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| GsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gsx")
            .join("config.toml")
    }
}
