/// Client configuration.
///
/// Loaded from an optional TOML file; every field has a default so an
/// empty file (or no file) yields a working client against public gateways.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cid::CidVersion;
use crate::client::FallbackPolicy;
use crate::error::{Result, StoreError};
use crate::gateway::{GatewayRegistry, DEFAULT_READ_GATEWAYS, DEFAULT_WRITE_GATEWAY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Read gateways, most preferred first.
    pub read_gateways: Vec<String>,
    pub write_gateway: String,
    /// Timeout for a single gateway attempt.
    pub attempt_timeout_secs: u64,
    /// Delay between upload progress stages.
    pub progress_delay_ms: u64,
    /// Directory holding the persisted usage stats.
    pub stats_path: PathBuf,
    pub policy: FallbackPolicy,
    pub cid_version: CidVersion,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_gateways: DEFAULT_READ_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            write_gateway: DEFAULT_WRITE_GATEWAY.to_string(),
            attempt_timeout_secs: 8,
            progress_delay_ms: 120,
            stats_path: PathBuf::from(".cidstore"),
            policy: FallbackPolicy::default(),
            cid_version: CidVersion::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| StoreError::Config(format!("invalid TOML: {e}")))?;
        config.check()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            StoreError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the client cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.attempt_timeout_secs == 0 {
            return Err(StoreError::Config(
                "attempt_timeout_secs must be positive".to_string(),
            ));
        }
        self.registry().map(|_| ())
    }

    pub fn registry(&self) -> Result<GatewayRegistry> {
        GatewayRegistry::new(self.read_gateways.iter().cloned(), self.write_gateway.clone())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn progress_delay(&self) -> Duration {
        Duration::from_millis(self.progress_delay_ms)
    }
}
