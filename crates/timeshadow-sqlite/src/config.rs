//! Connection settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use timeshadow_core::{ShadowError, ShadowResult};

/// Path used for in-memory databases.
pub const MEMORY_PATH: &str = ":memory:";

/// SQLite connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .map(|home| home.join(".timeshadow").join("timeshadow.db"))
            .unwrap_or_else(|| PathBuf::from("timeshadow.db"));
        Self {
            path,
            busy_timeout_ms: 5_000,
        }
    }
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(MEMORY_PATH),
            ..Default::default()
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    /// Load from `TIMESHADOW_DB_PATH` and `TIMESHADOW_BUSY_TIMEOUT_MS`.
    pub fn from_env() -> ShadowResult<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("TIMESHADOW_DB_PATH") {
            config.path = PathBuf::from(path);
        }
        if let Ok(timeout) = std::env::var("TIMESHADOW_BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = timeout.parse().map_err(|_| {
                ShadowError::Configuration(format!(
                    "TIMESHADOW_BUSY_TIMEOUT_MS must be a number of milliseconds, got '{}'",
                    timeout
                ))
            })?;
        }
        Ok(config)
    }
}
