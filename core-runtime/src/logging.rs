//! Logging Setup
//!
//! One-time tracing subscriber installation for hosts that do not bring
//! their own. Libraries in this workspace only emit `tracing` events; the
//! subscriber is always owned by the binary.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::RuntimeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `core_auth=debug,info`.
    pub filter: String,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), RuntimeError> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| RuntimeError::InvalidConfig(format!("Bad log filter: {}", e)))?;

    let result = if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| RuntimeError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_bad_filter_rejected() {
        let config = LoggingConfig {
            filter: "not==valid==".to_string(),
            json: false,
        };
        assert!(matches!(
            init_logging(&config),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }
}
