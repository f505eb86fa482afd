//! Engine configuration loaded from `teamsync.toml`
//!
//! Every section and key is optional; missing values take their defaults.
//!
//! ```toml
//! [refresh]
//! interval_secs = 20
//! auto_reschedule = true
//! restart_on_cancel = false
//!
//! [collector]
//! batch_threshold = 10
//!
//! [protocol]
//! program = "cvs"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sync_protocol::ServerPrefixes;

use crate::{Error, Result};

/// Background refresh settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Delay between runs, in whole seconds
    pub interval_secs: u64,
    /// Schedule the next run when one finishes
    pub auto_reschedule: bool,
    /// Keep rescheduling after a cancellation
    pub restart_on_cancel: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 20,
            auto_reschedule: true,
            restart_on_cancel: false,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Pending results that trigger an early flush
    pub batch_threshold: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Server program name used in diagnostic prefixes
    pub program: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            program: "cvs".to_string(),
        }
    }
}

impl ProtocolConfig {
    pub fn prefixes(&self) -> ServerPrefixes {
        ServerPrefixes::for_program(&self.program)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub refresh: RefreshConfig,
    pub collector: CollectorConfig,
    pub protocol: ProtocolConfig,
}

impl SyncConfig {
    /// Parse configuration from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded configuration");
        Ok(config)
    }
}
