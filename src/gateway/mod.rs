/// Gateway registry.
///
/// Holds an ordered list of read gateways and a single write gateway.
/// Selection is static priority order: the first read gateway is the most
/// preferred and retrieval tries them in sequence. There is no health
/// tracking or reordering.
pub mod http;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cid::ContentIdentifier;
use crate::error::{Result, StoreError};

pub use http::{ContentInfo, FetchedContent, GatewayTransport, HttpTransport};

/// Public read gateways, most preferred first.
pub const DEFAULT_READ_GATEWAYS: [&str; 4] = [
    "https://ipfs.io/ipfs",
    "https://gateway.pinata.cloud/ipfs",
    "https://cloudflare-ipfs.com/ipfs",
    "https://dweb.link/ipfs",
];

pub const DEFAULT_WRITE_GATEWAY: &str = "https://api.pinata.cloud/pinning";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayRole {
    Read,
    Write,
}

/// A base URL plus its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub base: String,
    pub role: GatewayRole,
}

impl Gateway {
    pub fn read(base: impl Into<String>) -> Self {
        Self {
            base: normalize(base.into()),
            role: GatewayRole::Read,
        }
    }

    pub fn write(base: impl Into<String>) -> Self {
        Self {
            base: normalize(base.into()),
            role: GatewayRole::Write,
        }
    }

    /// `<base>/<identifier>`
    pub fn url_for(&self, identifier: &ContentIdentifier) -> String {
        format!("{}/{}", self.base, identifier)
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

fn normalize(base: String) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Ordered read gateways and one write gateway, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct GatewayRegistry {
    read: Vec<Gateway>,
    write: Gateway,
}

impl GatewayRegistry {
    /// Build a registry. At least one non-blank read gateway is required.
    pub fn new<I, S>(read: I, write: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let read: Vec<Gateway> = read.into_iter().map(Gateway::read).collect();

        if read.is_empty() {
            return Err(StoreError::Config(
                "at least one read gateway is required".to_string(),
            ));
        }
        if let Some(blank) = read.iter().position(|g| g.base.is_empty()) {
            return Err(StoreError::Config(format!(
                "read gateway #{blank} has an empty base URL"
            )));
        }

        let write = Gateway::write(write);
        if write.base.is_empty() {
            return Err(StoreError::Config(
                "write gateway has an empty base URL".to_string(),
            ));
        }

        Ok(Self { read, write })
    }

    /// Read gateways in priority order.
    pub fn ordered_read_gateways(&self) -> &[Gateway] {
        &self.read
    }

    pub fn read_gateway(&self, index: usize) -> Option<&Gateway> {
        self.read.get(index)
    }

    pub fn write_gateway(&self) -> &Gateway {
        &self.write
    }

    /// The most preferred read gateway.
    pub fn primary(&self) -> &Gateway {
        // Non-empty by construction.
        &self.read[0]
    }

    /// URL for an identifier on `gateway`, or on the primary read gateway.
    pub fn url_for(&self, identifier: &ContentIdentifier, gateway: Option<&Gateway>) -> String {
        gateway.unwrap_or_else(|| self.primary()).url_for(identifier)
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self {
            read: DEFAULT_READ_GATEWAYS.iter().map(|g| Gateway::read(*g)).collect(),
            write: Gateway::write(DEFAULT_WRITE_GATEWAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid() -> ContentIdentifier {
        ContentIdentifier::new("QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o")
    }

    #[test]
    fn test_default_order() {
        let registry = GatewayRegistry::default();
        let bases: Vec<_> = registry
            .ordered_read_gateways()
            .iter()
            .map(|g| g.base.as_str())
            .collect();
        assert_eq!(bases, DEFAULT_READ_GATEWAYS);
        assert_eq!(registry.write_gateway().role, GatewayRole::Write);
    }

    #[test]
    fn test_url_for_defaults_to_primary() {
        let registry = GatewayRegistry::default();
        assert_eq!(
            registry.url_for(&cid(), None),
            "https://ipfs.io/ipfs/QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o"
        );

        let second = registry.read_gateway(1).unwrap();
        assert_eq!(
            registry.url_for(&cid(), Some(second)),
            "https://gateway.pinata.cloud/ipfs/QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let registry = GatewayRegistry::new(["http://a.test/ipfs/"], "http://w.test/").unwrap();
        assert_eq!(registry.primary().base, "http://a.test/ipfs");
        assert_eq!(registry.write_gateway().base, "http://w.test");
    }

    #[test]
    fn test_empty_registry_rejected() {
        let err = GatewayRegistry::new(Vec::<String>::new(), "http://w.test").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        assert!(GatewayRegistry::new(["  "], "http://w.test").is_err());
        assert!(GatewayRegistry::new(["http://a.test"], "").is_err());
    }
}
