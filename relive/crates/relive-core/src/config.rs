//! Swap and history tuning.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of generations kept for undo.
pub const DEFAULT_HISTORY_SIZE: usize = 16;

/// Swap coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Round-trip newly introduced instances through save/load/save and
    /// report properties that do not survive.
    ///
    /// Default: false
    pub self_verify: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self { self_verify: false }
    }
}

/// Generation history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum generations kept. The oldest is dropped when exceeded.
    ///
    /// Default: 16
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidHistorySize(
                "max_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert!(!SwapConfig::default().self_verify);
        assert_eq!(HistoryConfig::default().max_size, DEFAULT_HISTORY_SIZE);
        assert!(HistoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_history_is_rejected() {
        let config = HistoryConfig { max_size: 0 };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHistorySize(_))));
    }
}
