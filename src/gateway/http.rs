/// Gateway transport.
///
/// `GET <base>/<identifier>` fetches content, `HEAD <base>/<identifier>`
/// checks for it. Only a 200 response counts as success; any other status,
/// a transport error or a timeout fails the attempt.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Body and headers of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Size and type reported by a HEAD request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub gateway: String,
}

/// Fetches content from a gateway URL.
///
/// Failures are reported as [`StoreError::GatewayUnreachable`].
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;

    /// Headers only. `ContentInfo::gateway` is left empty for the caller to fill.
    async fn head(&self, url: &str) -> Result<ContentInfo>;
}

/// reqwest-backed transport with a per-attempt timeout.
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cidstore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }
}

fn gateway_err(url: &str, reason: impl ToString) -> StoreError {
    StoreError::GatewayUnreachable {
        gateway: url.to_string(),
        reason: reason.to_string(),
    }
}

fn header_str(resp: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn header_len(resp: &Response) -> Option<u64> {
    header_str(resp, CONTENT_LENGTH).and_then(|v| v.parse().ok())
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| gateway_err(url, e))?;

        if resp.status() != StatusCode::OK {
            return Err(gateway_err(url, format!("status {}", resp.status())));
        }

        let content_type = header_str(&resp, CONTENT_TYPE);
        let content_length = header_len(&resp);

        let bytes = resp.bytes().await.map_err(|e| gateway_err(url, e))?;

        Ok(FetchedContent {
            bytes,
            content_type,
            content_length,
        })
    }

    async fn head(&self, url: &str) -> Result<ContentInfo> {
        let resp = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| gateway_err(url, e))?;

        if resp.status() != StatusCode::OK {
            return Err(gateway_err(url, format!("status {}", resp.status())));
        }

        Ok(ContentInfo {
            size: header_len(&resp),
            content_type: header_str(&resp, CONTENT_TYPE),
            gateway: String::new(),
        })
    }
}
