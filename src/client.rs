/// Content client.
///
/// Orchestrates the two caller-facing flows:
/// - upload: derive identifier → report staged progress → record in ledger
/// - retrieve: try each read gateway in priority order → record download,
///   or record a single error once every gateway has failed
///
/// Per-gateway failures never surface as errors. They are collected in
/// [`RetrievalOutcome::attempts`] and the chain moves on to the next
/// gateway. Gateways are tried strictly one after another.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cid::derive::{self, DerivationMode, IdentifierDeriver};
use crate::cid::{self, CidVersion, ContentIdentifier, ValidationResult};
use crate::config::ClientConfig;
use crate::error::{Result, StoreError};
use crate::gateway::{ContentInfo, Gateway, GatewayRegistry, GatewayTransport, HttpTransport};
use crate::ledger::{FileStore, KeyValueStore, StatsReport, UsageLedger};

/// Progress values reported during an upload, in order.
pub const PROGRESS_STAGES: [f64; 8] = [0.0, 0.15, 0.30, 0.50, 0.70, 0.85, 0.95, 1.0];

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(8);

pub const DEFAULT_PROGRESS_DELAY: Duration = Duration::from_millis(120);

/// Upload progress callback, called with values in `[0, 1]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// How identifiers are produced on upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Real digest of the content (or metadata when content is unavailable).
    #[default]
    ContentAddressed,
    /// Identifiers come from a fixed demo pool. They are deterministic per
    /// content but do not address it, and distinct files may collide.
    Pooled,
}

/// A file handed to [`ContentClient::upload`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    /// Declared size. Ignored when `content` is present.
    pub size: u64,
    /// Raw bytes, if readable.
    pub content: Option<Bytes>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        let content = content.into();
        Self {
            mime_type: guess_mime(&name).to_string(),
            size: content.len() as u64,
            content: Some(content),
            name,
        }
    }

    /// A file whose bytes cannot be read; only name and size are known.
    pub fn metadata_only(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            content: None,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, data))
    }

    fn byte_size(&self) -> u64 {
        self.content
            .as_ref()
            .map(|c| c.len() as u64)
            .unwrap_or(self.size)
    }
}

/// MIME type from a file extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "json" => "application/json",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub identifier: ContentIdentifier,
    pub byte_size: u64,
    pub mime_type: String,
    pub file_name: String,
    /// Base URL of the gateway the upload is attributed to.
    pub source_gateway: String,
    /// Retrieval URL on the primary read gateway.
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub derivation: DerivationMode,
    /// False when the usage ledger could not write its snapshot.
    pub stats_persisted: bool,
}

/// One failed gateway attempt during retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayAttempt {
    pub gateway: String,
    pub error: String,
}

/// Terminal retrieval failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalError {
    #[error("not found on any of {attempts} configured gateways")]
    AllGatewaysExhausted { attempts: usize },

    #[error("malformed identifier: {reason}")]
    MalformedIdentifier { reason: String },
}

/// Result of [`ContentClient::retrieve`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalOutcome {
    pub success: bool,
    #[serde(skip)]
    pub bytes: Option<Bytes>,
    pub gateway_used: Option<String>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub error: Option<RetrievalError>,
    pub attempts: Vec<GatewayAttempt>,
    /// False when the ledger counted this retrieval but could not write the
    /// snapshot through. Rejected identifiers touch no counter and report
    /// true.
    pub stats_persisted: bool,
}

impl RetrievalOutcome {
    fn failed(
        error: RetrievalError,
        file_name: Option<&str>,
        attempts: Vec<GatewayAttempt>,
        stats_persisted: bool,
    ) -> Self {
        Self {
            success: false,
            bytes: None,
            gateway_used: None,
            content_type: None,
            file_name: file_name.map(str::to_string),
            error: Some(error),
            attempts,
            stats_persisted,
        }
    }

    /// Convert into the fetched bytes or a crate error.
    pub fn into_result(self, identifier: &ContentIdentifier) -> Result<Bytes> {
        match (self.bytes, self.error) {
            (Some(bytes), _) if self.success => Ok(bytes),
            (_, Some(RetrievalError::MalformedIdentifier { reason })) => {
                Err(StoreError::InvalidIdentifier(reason))
            }
            _ => Err(StoreError::AllGatewaysExhausted {
                identifier: identifier.to_string(),
                attempts: self.attempts.len(),
            }),
        }
    }
}

/// Content-addressed store client.
pub struct ContentClient {
    deriver: IdentifierDeriver,
    registry: GatewayRegistry,
    transport: Arc<dyn GatewayTransport>,
    ledger: UsageLedger,
    policy: FallbackPolicy,
    attempt_timeout: Duration,
    progress_delay: Duration,
}

impl ContentClient {
    pub fn new(
        registry: GatewayRegistry,
        transport: Arc<dyn GatewayTransport>,
        ledger: UsageLedger,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            deriver: IdentifierDeriver::default(),
            registry,
            transport,
            ledger,
            policy,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            progress_delay: DEFAULT_PROGRESS_DELAY,
        }
    }

    /// Build an HTTP-backed client with a file-backed ledger.
    pub async fn from_config(config: &ClientConfig) -> Result<Self> {
        let registry = config.registry()?;
        let transport = Arc::new(HttpTransport::new(config.attempt_timeout())?);
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.stats_path));
        let ledger = UsageLedger::load(store).await;

        info!(
            read_gateways = registry.ordered_read_gateways().len(),
            write_gateway = %registry.write_gateway(),
            policy = ?config.policy,
            "Content client ready"
        );

        Ok(Self::new(registry, transport, ledger, config.policy)
            .with_cid_version(config.cid_version)
            .with_attempt_timeout(config.attempt_timeout())
            .with_progress_delay(config.progress_delay()))
    }

    pub fn with_cid_version(mut self, version: CidVersion) -> Self {
        self.deriver = IdentifierDeriver::new(version);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_progress_delay(mut self, delay: Duration) -> Self {
        self.progress_delay = delay;
        self
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Derive an identifier for `file`, report progress, and count the upload.
    ///
    /// The only error is [`StoreError::HashDerivation`], raised when the file
    /// has neither readable content nor a name.
    pub async fn upload(
        &self,
        file: &UploadFile,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<UploadResult> {
        let byte_size = file.byte_size();

        let derivation = match self.deriver.derive_with_fallback(
            file.content.as_deref(),
            &file.name,
            byte_size,
        ) {
            Ok(d) => d,
            Err(e) => {
                self.ledger.record_error().await;
                error!(file_name = %file.name, error = %e, "Upload failed");
                return Err(e);
            }
        };

        let (identifier, mode, source) = match self.policy {
            FallbackPolicy::ContentAddressed => (
                derivation.identifier,
                derivation.mode,
                self.registry.write_gateway(),
            ),
            FallbackPolicy::Pooled => (
                derive::pooled(&derivation.digest),
                DerivationMode::Pooled,
                self.registry.primary(),
            ),
        };

        if let Some(report) = on_progress {
            self.report_progress(report).await;
        }

        let stats_persisted = self.ledger.record_upload(byte_size).await;

        info!(
            identifier = %identifier,
            file_name = %file.name,
            size = byte_size,
            mode = ?mode,
            "Upload complete"
        );

        Ok(UploadResult {
            url: self.registry.url_for(&identifier, None),
            identifier,
            byte_size,
            mime_type: file.mime_type.clone(),
            file_name: file.name.clone(),
            source_gateway: source.base.clone(),
            timestamp: Utc::now(),
            success: true,
            derivation: mode,
            stats_persisted,
        })
    }

    async fn report_progress(&self, report: ProgressFn<'_>) {
        for (i, stage) in PROGRESS_STAGES.iter().enumerate() {
            report(*stage);
            let last = i + 1 == PROGRESS_STAGES.len();
            if !last && !self.progress_delay.is_zero() {
                tokio::time::sleep(self.progress_delay).await;
            }
        }
    }

    /// Fetch content by trying each read gateway in priority order.
    ///
    /// Stops at the first gateway that answers. If all fail, exactly one
    /// error is recorded in the ledger. Malformed identifiers are rejected
    /// before any gateway is contacted.
    pub async fn retrieve(
        &self,
        identifier: &ContentIdentifier,
        file_name: Option<&str>,
    ) -> RetrievalOutcome {
        if let Err(e) = cid::classify(identifier.as_str()) {
            warn!(
                identifier = %identifier,
                error = %e,
                "Refusing to retrieve malformed identifier"
            );
            return RetrievalOutcome::failed(
                RetrievalError::MalformedIdentifier {
                    reason: e.to_string(),
                },
                file_name,
                Vec::new(),
                true,
            );
        }

        let mut attempts = Vec::new();

        for gateway in self.registry.ordered_read_gateways() {
            let url = gateway.url_for(identifier);

            let attempt = tokio::time::timeout(self.attempt_timeout, self.transport.fetch(&url));
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(StoreError::GatewayUnreachable {
                    gateway: url.clone(),
                    reason: format!("timed out after {:?}", self.attempt_timeout),
                }),
            };

            match result {
                Ok(fetched) => {
                    let stats_persisted = self.ledger.record_download().await;
                    info!(
                        identifier = %identifier,
                        gateway = %gateway,
                        size = fetched.bytes.len(),
                        failed_attempts = attempts.len(),
                        "Retrieved content"
                    );
                    return RetrievalOutcome {
                        success: true,
                        bytes: Some(fetched.bytes),
                        gateway_used: Some(gateway.base.clone()),
                        content_type: fetched.content_type,
                        file_name: file_name.map(str::to_string),
                        error: None,
                        attempts,
                        stats_persisted,
                    };
                }
                Err(e) => {
                    warn!(
                        identifier = %identifier,
                        gateway = %gateway,
                        error = %e,
                        "Gateway attempt failed, trying next"
                    );
                    attempts.push(GatewayAttempt {
                        gateway: gateway.base.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let stats_persisted = self.ledger.record_error().await;
        error!(
            identifier = %identifier,
            attempts = attempts.len(),
            "All gateways exhausted"
        );

        RetrievalOutcome::failed(
            RetrievalError::AllGatewaysExhausted {
                attempts: attempts.len(),
            },
            file_name,
            attempts,
            stats_persisted,
        )
    }

    /// HEAD the read gateways in order; first 200 wins.
    pub async fn info(&self, identifier: &ContentIdentifier) -> Option<ContentInfo> {
        for gateway in self.registry.ordered_read_gateways() {
            let url = gateway.url_for(identifier);
            match tokio::time::timeout(self.attempt_timeout, self.transport.head(&url)).await {
                Ok(Ok(mut info)) => {
                    info.gateway = gateway.base.clone();
                    return Some(info);
                }
                Ok(Err(e)) => warn!(gateway = %gateway, error = %e, "HEAD request failed"),
                Err(_) => warn!(gateway = %gateway, "HEAD request timed out"),
            }
        }
        None
    }

    pub fn validate(&self, identifier: &str) -> ValidationResult {
        cid::validate(identifier)
    }

    pub fn url_for(&self, identifier: &ContentIdentifier, gateway: Option<&Gateway>) -> String {
        self.registry.url_for(identifier, gateway)
    }

    pub async fn stats(&self) -> StatsReport {
        self.ledger.report().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cid::derive::DEMO_POOL;
    use crate::gateway::FetchedContent;
    use crate::ledger::MemoryStore;

    const CID: &str = "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o";

    #[derive(Clone)]
    enum Behavior {
        Serve(&'static [u8]),
        Fail,
        Hang,
    }

    /// Answers per gateway base and records every URL it is asked for.
    struct ScriptedTransport {
        script: HashMap<String, Behavior>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: &[(&str, Behavior)]) -> Arc<Self> {
            Arc::new(Self {
                script: script
                    .iter()
                    .map(|(base, b)| (base.to_string(), b.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn behave(&self, url: &str) -> Result<&'static [u8]> {
            self.calls.lock().unwrap().push(url.to_string());
            let behavior = self
                .script
                .iter()
                .find(|(base, _)| url.starts_with(base.as_str()))
                .map(|(_, b)| b.clone())
                .unwrap_or(Behavior::Fail);

            match behavior {
                Behavior::Serve(body) => Ok(body),
                Behavior::Fail => Err(StoreError::GatewayUnreachable {
                    gateway: url.to_string(),
                    reason: "status 502 Bad Gateway".to_string(),
                }),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn fetch(&self, url: &str) -> Result<FetchedContent> {
            let body = self.behave(url).await?;
            Ok(FetchedContent {
                bytes: Bytes::from_static(body),
                content_type: Some("text/plain".to_string()),
                content_length: Some(body.len() as u64),
            })
        }

        async fn head(&self, url: &str) -> Result<ContentInfo> {
            let body = self.behave(url).await?;
            Ok(ContentInfo {
                size: Some(body.len() as u64),
                content_type: Some("text/plain".to_string()),
                gateway: String::new(),
            })
        }
    }

    const G1: &str = "http://g1.test/ipfs";
    const G2: &str = "http://g2.test/ipfs";
    const G3: &str = "http://g3.test/ipfs";
    const G4: &str = "http://g4.test/ipfs";
    const W: &str = "http://write.test/api";

    async fn client_with(
        transport: Arc<ScriptedTransport>,
        store: MemoryStore,
        policy: FallbackPolicy,
    ) -> ContentClient {
        let registry = GatewayRegistry::new([G1, G2, G3, G4], W).unwrap();
        let ledger = UsageLedger::load(Arc::new(store)).await;
        ContentClient::new(registry, transport, ledger, policy)
            .with_progress_delay(Duration::ZERO)
            .with_attempt_timeout(Duration::from_millis(100))
    }

    async fn client(transport: Arc<ScriptedTransport>) -> ContentClient {
        client_with(transport, MemoryStore::new(), FallbackPolicy::ContentAddressed).await
    }

    #[tokio::test]
    async fn test_retrieve_falls_back_in_order() {
        let transport = ScriptedTransport::new(&[
            (G1, Behavior::Fail),
            (G2, Behavior::Fail),
            (G3, Behavior::Serve(b"from g3")),
            (G4, Behavior::Serve(b"from g4")),
        ]);
        let client = client(transport.clone()).await;

        let outcome = client
            .retrieve(&ContentIdentifier::new(CID), Some("notes.txt"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.gateway_used.as_deref(), Some(G3));
        assert_eq!(outcome.bytes.as_deref(), Some(&b"from g3"[..]));
        assert_eq!(outcome.file_name.as_deref(), Some("notes.txt"));
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].gateway, G1);

        assert_eq!(
            transport.calls(),
            vec![
                format!("{G1}/{CID}"),
                format!("{G2}/{CID}"),
                format!("{G3}/{CID}"),
            ]
        );

        let stats = client.ledger().snapshot().await;
        assert_eq!(stats.download_count, 1);
        assert_eq!(stats.error_count, 0);
    }

    #[tokio::test]
    async fn test_retrieve_exhaustion_records_one_error() {
        let transport = ScriptedTransport::new(&[]);
        let client = client(transport.clone()).await;

        let outcome = client.retrieve(&ContentIdentifier::new(CID), None).await;

        assert!(!outcome.success);
        assert!(outcome.bytes.is_none());
        assert_eq!(
            outcome.error,
            Some(RetrievalError::AllGatewaysExhausted { attempts: 4 })
        );
        assert_eq!(transport.calls().len(), 4);

        let stats = client.ledger().snapshot().await;
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.download_count, 0);
    }

    #[tokio::test]
    async fn test_retrieve_skips_hanging_gateway() {
        let transport = ScriptedTransport::new(&[
            (G1, Behavior::Hang),
            (G2, Behavior::Serve(b"ok")),
        ]);
        let client = client(transport).await;

        let outcome = client.retrieve(&ContentIdentifier::new(CID), None).await;
        assert!(outcome.success);
        assert_eq!(outcome.gateway_used.as_deref(), Some(G2));
        assert!(outcome.attempts[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_malformed_identifier() {
        let transport = ScriptedTransport::new(&[(G1, Behavior::Serve(b"x"))]);
        let client = client(transport.clone()).await;

        let outcome = client
            .retrieve(&ContentIdentifier::new("not-a-hash"), None)
            .await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(RetrievalError::MalformedIdentifier { .. })
        ));
        assert!(transport.calls().is_empty());
        assert_eq!(client.ledger().snapshot().await.error_count, 0);
        assert!(outcome.stats_persisted);
    }

    /// Accepts reads, refuses every write.
    struct ReadOnlyStore;

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(StoreError::StatsPersistence("disk full".to_string()))
        }
    }

    async fn read_only_client(transport: Arc<ScriptedTransport>) -> ContentClient {
        let registry = GatewayRegistry::new([G1, G2], W).unwrap();
        let ledger = UsageLedger::load(Arc::new(ReadOnlyStore)).await;
        ContentClient::new(registry, transport, ledger, FallbackPolicy::ContentAddressed)
            .with_attempt_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_retrieve_reports_unpersisted_stats() {
        let id = ContentIdentifier::new(CID);

        let client = read_only_client(ScriptedTransport::new(&[(G2, Behavior::Serve(b"ok"))])).await;
        let served = client.retrieve(&id, None).await;
        assert!(served.success);
        assert!(!served.stats_persisted);
        assert_eq!(client.stats().await.persist_failures, 1);

        let client = read_only_client(ScriptedTransport::new(&[])).await;
        let failed = client.retrieve(&id, None).await;
        assert!(!failed.success);
        assert!(!failed.stats_persisted);

        let report = client.stats().await;
        assert_eq!(report.stats.error_count, 1);
        assert_eq!(report.persist_failures, 1);
    }

    #[tokio::test]
    async fn test_retrieve_persists_stats() {
        let transport = ScriptedTransport::new(&[(G1, Behavior::Serve(b"ok"))]);
        let client = client(transport).await;

        let outcome = client.retrieve(&ContentIdentifier::new(CID), None).await;
        assert!(outcome.stats_persisted);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["statsPersisted"], true);
        assert_eq!(client.stats().await.persist_failures, 0);
    }

    #[tokio::test]
    async fn test_into_result() {
        let transport = ScriptedTransport::new(&[(G1, Behavior::Serve(b"body"))]);
        let client = client(transport).await;
        let id = ContentIdentifier::new(CID);

        let bytes = client.retrieve(&id, None).await.into_result(&id).unwrap();
        assert_eq!(&bytes[..], b"body");

        let bad = ContentIdentifier::new("nope");
        let err = client.retrieve(&bad, None).await.into_result(&bad).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_upload_reports_progress() {
        let client = client(ScriptedTransport::new(&[])).await;
        let seen = Mutex::new(Vec::new());
        let on_progress = |p: f64| seen.lock().unwrap().push(p);

        let file = UploadFile::new("report.pdf", b"%PDF-1.7".to_vec());
        let result = client.upload(&file, Some(&on_progress)).await.unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, PROGRESS_STAGES.to_vec());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&1.0));

        assert!(result.success);
        assert_eq!(result.byte_size, 8);
        assert_eq!(result.mime_type, "application/pdf");
        assert_eq!(result.source_gateway, W);
        assert_eq!(result.derivation, DerivationMode::Content);
        assert!(result.stats_persisted);
        assert_eq!(
            result.identifier,
            IdentifierDeriver::default().derive(b"%PDF-1.7", "report.pdf")
        );
        assert_eq!(result.url, format!("{G1}/{}", result.identifier));
    }

    #[tokio::test]
    async fn test_upload_accounting() {
        let client = client(ScriptedTransport::new(&[])).await;
        let sizes = [3usize, 40, 500];

        for (i, size) in sizes.iter().enumerate() {
            let file = UploadFile::new(format!("f{i}.bin"), vec![7u8; *size]);
            client.upload(&file, None).await.unwrap();
        }

        let report = client.stats().await;
        assert_eq!(report.stats.upload_count, 3);
        assert_eq!(report.stats.total_bytes, 543);
        assert_eq!(report.success_rate, 100);
    }

    #[tokio::test]
    async fn test_upload_metadata_only() {
        let client = client(ScriptedTransport::new(&[])).await;
        let file = UploadFile::metadata_only("scan.png", "image/png", 4096);

        let result = client.upload(&file, None).await.unwrap();
        assert_eq!(result.derivation, DerivationMode::Metadata);
        assert_eq!(result.byte_size, 4096);
        assert!(client.validate(result.identifier.as_str()).valid);
    }

    #[tokio::test]
    async fn test_upload_without_content_or_name_fails() {
        let client = client(ScriptedTransport::new(&[])).await;
        let file = UploadFile::metadata_only("", "application/octet-stream", 1);

        let err = client.upload(&file, None).await.unwrap_err();
        assert!(matches!(err, StoreError::HashDerivation(_)));

        let stats = client.ledger().snapshot().await;
        assert_eq!(stats.upload_count, 0);
        assert_eq!(stats.error_count, 1);
    }

    #[tokio::test]
    async fn test_pooled_policy() {
        let client = client_with(
            ScriptedTransport::new(&[]),
            MemoryStore::new(),
            FallbackPolicy::Pooled,
        )
        .await;

        let file = UploadFile::new("a.txt", b"alpha".to_vec());
        let first = client.upload(&file, None).await.unwrap();
        let second = client.upload(&file, None).await.unwrap();

        assert_eq!(client.policy(), FallbackPolicy::Pooled);
        assert!(DEMO_POOL.contains(&first.identifier.as_str()));
        assert_eq!(first.identifier, second.identifier);
        assert_eq!(first.derivation, DerivationMode::Pooled);
        assert_eq!(first.source_gateway, G1);
    }

    #[tokio::test]
    async fn test_stats_survive_restart() {
        let store = MemoryStore::new();
        {
            let client = client_with(
                ScriptedTransport::new(&[(G1, Behavior::Serve(b"x"))]),
                store.clone(),
                FallbackPolicy::ContentAddressed,
            )
            .await;
            client
                .upload(&UploadFile::new("a", b"12345".to_vec()), None)
                .await
                .unwrap();
            client.retrieve(&ContentIdentifier::new(CID), None).await;
        }

        let restarted = client_with(
            ScriptedTransport::new(&[]),
            store,
            FallbackPolicy::ContentAddressed,
        )
        .await;
        let stats = restarted.stats().await.stats;
        assert_eq!(stats.upload_count, 1);
        assert_eq!(stats.download_count, 1);
        assert_eq!(stats.total_bytes, 5);
    }

    #[tokio::test]
    async fn test_info_uses_first_answering_gateway() {
        let transport = ScriptedTransport::new(&[
            (G1, Behavior::Fail),
            (G2, Behavior::Serve(b"abcd")),
        ]);
        let client = client(transport).await;

        let info = client.info(&ContentIdentifier::new(CID)).await.unwrap();
        assert_eq!(info.gateway, G2);
        assert_eq!(info.size, Some(4));
        assert_eq!(client.ledger().snapshot().await.download_count, 0);

        let none = client_with(
            ScriptedTransport::new(&[]),
            MemoryStore::new(),
            FallbackPolicy::ContentAddressed,
        )
        .await;
        assert!(none.info(&ContentIdentifier::new(CID)).await.is_none());
    }

    #[tokio::test]
    async fn test_url_for() {
        let client = client(ScriptedTransport::new(&[])).await;
        let id = ContentIdentifier::new(CID);

        assert_eq!(client.url_for(&id, None), format!("{G1}/{CID}"));
        let third = client.registry().read_gateway(2).cloned();
        assert_eq!(client.url_for(&id, third.as_ref()), format!("{G3}/{CID}"));
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("a.PDF"), "application/pdf");
        assert_eq!(guess_mime("photo.jpeg"), "image/jpeg");
        assert_eq!(guess_mime("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, 5);
    }
}
