//! Configuration types

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{LeaseSetError, Result};

/// Lease set handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseSetConfig {
    /// Keep lease contents for received records (false tracks only
    /// validity and expiration)
    #[serde(default = "default_true")]
    pub store_leases: bool,

    /// Lifetime constants of local inbound tunnels
    #[serde(default)]
    pub tunnels: TunnelTimings,
}

impl Default for LeaseSetConfig {
    fn default() -> Self {
        Self {
            store_leases: true,
            tunnels: TunnelTimings::default(),
        }
    }
}

impl LeaseSetConfig {
    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| LeaseSetError::Config(format!("read {:?}: {}", path, e)))?;
        let config: LeaseSetConfig = serde_json::from_str(&content)
            .map_err(|e| LeaseSetError::Config(format!("parse {:?}: {}", path, e)))?;
        info!("Loaded lease set settings from {:?}", path);
        Ok(config)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LeaseSetError::Config(format!("create {:?}: {}", parent, e)))?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LeaseSetError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| LeaseSetError::Config(format!("write {:?}: {}", path, e)))?;
        info!("Saved lease set settings to {:?}", path);
        Ok(())
    }
}

/// Tunnel lifetime constants (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelTimings {
    /// How long an inbound tunnel lives after creation
    #[serde(default = "default_expiration_timeout")]
    pub expiration_timeout_secs: u64,

    /// Leases are published this long before the tunnel really expires
    #[serde(default = "default_expiration_threshold")]
    pub expiration_threshold_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_expiration_timeout() -> u64 {
    660
}

fn default_expiration_threshold() -> u64 {
    60
}

impl Default for TunnelTimings {
    fn default() -> Self {
        Self {
            expiration_timeout_secs: default_expiration_timeout(),
            expiration_threshold_secs: default_expiration_threshold(),
        }
    }
}

impl TunnelTimings {
    /// Seconds after creation at which a tunnel's lease should end
    pub fn lease_lifetime_secs(&self) -> u64 {
        self.expiration_timeout_secs
            .saturating_sub(self.expiration_threshold_secs)
    }
}
