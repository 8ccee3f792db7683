//! Tracing subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::errors::FilterflowError;

fn default_level() -> String {
    "info".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Sets the default level directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Builds the env filter, preferring `RUST_LOG` when set.
    pub fn env_filter(&self) -> Result<EnvFilter, FilterflowError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| FilterflowError::Config(format!("invalid log level '{}': {e}", self.level)))
    }
}

/// Installs a global `tracing` subscriber.
///
/// Fails if the level directive is invalid or a subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), FilterflowError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| FilterflowError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LoggingConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert_eq!(config, LoggingConfig::default().with_json(true));
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        let config = LoggingConfig::default().with_level("filterflow=debug,warn");
        assert!(config.env_filter().is_ok());
    }
}
