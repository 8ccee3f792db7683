//! Invoker configuration.

use serde::{Deserialize, Serialize};

use crate::errors::FilterflowError;
use crate::observability::LoggingConfig;

fn default_true() -> bool {
    true
}

/// Configuration for the invoker and the pipelines it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Call the request validation hook when the action stage starts.
    #[serde(default = "default_true")]
    pub validate_request: bool,
    /// Forward lifecycle events to the event sink.
    #[serde(default = "default_true")]
    pub emit_events: bool,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            validate_request: true,
            emit_events: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl InvokerConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, FilterflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Enables or disables request validation.
    #[must_use]
    pub fn with_validate_request(mut self, enabled: bool) -> Self {
        self.validate_request = enabled;
        self
    }

    /// Enables or disables event emission.
    #[must_use]
    pub fn with_emit_events(mut self, enabled: bool) -> Self {
        self.emit_events = enabled;
        self
    }

    /// Sets the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InvokerConfig::default();
        assert!(config.validate_request);
        assert!(config.emit_events);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_json_str() {
        let config = InvokerConfig::from_json_str(
            r#"{"validate_request": false, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        assert!(!config.validate_request);
        assert!(config.emit_events);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = InvokerConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, FilterflowError::Serialization(_)));
    }

    #[test]
    fn test_builder() {
        let config = InvokerConfig::default()
            .with_emit_events(false)
            .with_validate_request(false);

        assert!(!config.emit_events);
        assert!(!config.validate_request);
    }
}
