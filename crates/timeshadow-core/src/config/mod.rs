//! Configuration system for timeshadow.

use serde::{Deserialize, Serialize};

use crate::error::{ShadowError, ShadowResult};
use crate::schema::validate_identifier;

/// Default name of the log table's ordering column.
pub const DEFAULT_SEQ_COLUMN: &str = "shadow_seq";

/// Default name of the log table's append-time column.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "shadow_timestamp";

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Whether the plugin registers any hooks at all.
    pub enabled: bool,
    /// Column holding the auto-incremented snapshot sequence.
    pub seq_column: String,
    /// Column holding the snapshot append time.
    pub timestamp_column: String,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seq_column: DEFAULT_SEQ_COLUMN.to_string(),
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
        }
    }
}

impl ShadowConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ShadowResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ShadowError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ShadowError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| ShadowError::Configuration(e.to_string()))?,
            _ => {
                return Err(ShadowError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> ShadowResult<Self> {
        let mut config = Self::default();

        if let Ok(column) = std::env::var("TIMESHADOW_SEQ_COLUMN") {
            config.seq_column = column;
        }
        if let Ok(column) = std::env::var("TIMESHADOW_TIMESTAMP_COLUMN") {
            config.timestamp_column = column;
        }
        if let Ok(enabled) = std::env::var("TIMESHADOW_ENABLED") {
            config.enabled = !matches!(enabled.to_lowercase().as_str(), "0" | "false" | "no");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject column names that cannot be spliced into SQL safely.
    pub fn validate(&self) -> ShadowResult<()> {
        validate_identifier(&self.seq_column)
            .map_err(|e| ShadowError::Configuration(e.to_string()))?;
        validate_identifier(&self.timestamp_column)
            .map_err(|e| ShadowError::Configuration(e.to_string()))?;
        if self.seq_column == self.timestamp_column {
            return Err(ShadowError::Configuration(
                "seq_column and timestamp_column must differ".to_string(),
            ));
        }
        Ok(())
    }
}
