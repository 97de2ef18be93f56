//! Store Configuration

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid store config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Behavior switches for a [`Store`](crate::Store).
///
/// Missing fields take their default value, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Reject registrations whose dependencies would form a cycle.
    ///
    /// When disabled, cyclic registrations are accepted and propagation
    /// still terminates, but every member of a cycle stays dirty after its
    /// own evaluation.
    pub reject_cycles: bool,

    /// Serialize concurrent evaluations of the same name.
    ///
    /// Without it, two readers of the same pure or impure computation may
    /// both observe the same previous value and both write, and the last
    /// write wins.
    pub single_flight: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reject_cycles: true,
            single_flight: false,
        }
    }
}

impl StoreConfig {
    /// Parse a config from JSON.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn reject_cycles(mut self, enabled: bool) -> Self {
        self.reject_cycles = enabled;
        self
    }

    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        assert_eq!(StoreConfig::from_json("{}").unwrap(), StoreConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config = StoreConfig::from_json(r#"{ "single_flight": true }"#).unwrap();
        assert!(config.single_flight);
        assert!(config.reject_cycles);

        let config = StoreConfig::from_json(r#"{ "reject_cycles": false }"#).unwrap();
        assert!(!config.reject_cycles);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = StoreConfig::from_json(r#"{ "retries": 3 }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid store config"));
    }

    #[test]
    fn builder_setters() {
        let config = StoreConfig::default().reject_cycles(false).single_flight(true);
        assert!(!config.reject_cycles);
        assert!(config.single_flight);
    }
}
