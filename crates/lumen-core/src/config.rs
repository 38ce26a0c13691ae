//! Daemon configuration
//!
//! Loaded from TOML. Every section and field is optional:
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [housekeeping]
//! interval_ms = 1000
//!
//! [rdm]
//! discovery_interval_secs = 300
//!
//! [[universes]]
//! id = 1
//! name = "Stage Left"
//! merge_mode = "htp"
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::universe::MergeMode;
use crate::Result;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level filter; `RUST_LOG` overrides it
    pub level: String,
    /// Write log lines to stderr
    pub console_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
        }
    }
}

impl LogConfig {
    /// The configured level, INFO if it doesn't parse
    pub fn parse_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// Periodic maintenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Milliseconds between housekeeping runs
    pub interval_ms: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl HousekeepingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// RDM settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdmConfig {
    /// Seconds between incremental discoveries per universe; 0 disables
    pub discovery_interval_secs: u64,
}

impl RdmConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }
}

/// Settings applied when a universe is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseSettings {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub merge_mode: MergeMode,
}

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    pub log: LogConfig,
    pub housekeeping: HousekeepingConfig,
    pub rdm: RdmConfig,
    pub universes: Vec<UniverseSettings>,
}

impl LumenConfig {
    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde can't
    pub fn validate(&self) -> Result<()> {
        if self.housekeeping.interval_ms == 0 {
            return Err(CoreError::Config(
                "housekeeping.interval_ms must be greater than 0".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for universe in &self.universes {
            if !seen.insert(universe.id) {
                return Err(CoreError::Config(format!(
                    "universe {} is configured more than once",
                    universe.id
                )));
            }
        }
        Ok(())
    }
}
