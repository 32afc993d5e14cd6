//! Logging bootstrap

use crate::config::DebugConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter used by [`init`]
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn filter(config: &DebugConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()))
}

/// Install the global fmt subscriber
///
/// Returns false if a subscriber was already installed.
pub fn init(config: &DebugConfig) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized at {:?}", config.log_level);
    }

    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_init_twice() {
        let config = DebugConfig {
            log_level: LogLevel::Warn,
            trace_transfers: false,
        };
        let first = init(&config);
        let second = init(&config);
        // Only one global subscriber may be set per process
        assert!(!(first && second));
        assert!(!second);
    }
}
