/// Identifier derivation.
///
/// The preimage binds the content length, the file name and the raw bytes:
/// `len (u64 LE) || name || 0x00 || content`. Its BLAKE3 digest is then
/// encoded either as a fixed-width v0 string or as a CIDv1 (raw codec,
/// BLAKE3 multihash, base32).
///
/// When content bytes are unavailable the deriver falls back to a
/// metadata-only digest (declared size + name). That identifier is still
/// deterministic but does not address the content itself.
use ::cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::hash;
use super::{CidVersion, ContentIdentifier, V0_BODY_LEN, V0_PREFIX};
use crate::error::{Result, StoreError};

/// Multicodec code for raw binary content.
const RAW_CODEC: u64 = 0x55;

const METADATA_CONTEXT: &str = "cidstore v1 metadata-only identifier";

/// Fixed identifiers handed out under the pooled policy.
pub const DEMO_POOL: [&str; 5] = [
    "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
    "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o",
    "QmPZ9gcCEpqKTo6aq61g2nXGUhM4iCL3ewB6LDXZCtioEB",
    "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn",
    "QmbWqxBEKC3P8tqsKc98xmWNzrzDtRLMiMPL8wBuTGsMnR",
];

/// How an identifier was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationMode {
    /// Digest over length, name and full content.
    Content,
    /// Content unavailable; digest over declared size and name only.
    Metadata,
    /// Taken from [`DEMO_POOL`]; does not address the content.
    Pooled,
}

/// A derived identifier together with the digest it was encoded from.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub identifier: ContentIdentifier,
    pub digest: [u8; 32],
    pub mode: DerivationMode,
}

/// Turns bytes and metadata into content identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierDeriver {
    version: CidVersion,
}

impl IdentifierDeriver {
    pub fn new(version: CidVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> CidVersion {
        self.version
    }

    /// Derive an identifier from full content. Never fails: if the
    /// configured encoding cannot be produced the v0 encoding is used.
    pub fn derive(&self, bytes: &[u8], name: &str) -> ContentIdentifier {
        let digest = content_digest(bytes, name);
        self.encode(&digest).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to v0 encoding");
            encode_v0(&digest)
        })
    }

    /// Derive from content when present, otherwise from declared size and name.
    ///
    /// Fails with [`StoreError::HashDerivation`] only when there is neither
    /// content nor a name to derive from.
    pub fn derive_with_fallback(
        &self,
        content: Option<&[u8]>,
        name: &str,
        declared_size: u64,
    ) -> Result<Derivation> {
        let (digest, mode) = match content {
            Some(bytes) => (content_digest(bytes, name), DerivationMode::Content),
            None if name.is_empty() => {
                return Err(StoreError::HashDerivation(
                    "content unavailable and no name to derive from".to_string(),
                ));
            }
            None => {
                warn!(
                    file_name = name,
                    declared_size,
                    "Content unavailable, deriving from metadata"
                );
                (metadata_digest(declared_size, name), DerivationMode::Metadata)
            }
        };

        let identifier = match self.encode(&digest) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Falling back to v0 encoding");
                encode_v0(&digest)
            }
        };

        debug!(
            identifier = %identifier,
            digest = %hex::encode(digest),
            ?mode,
            "Identifier derived"
        );

        Ok(Derivation {
            identifier,
            digest,
            mode,
        })
    }

    fn encode(&self, digest: &[u8; 32]) -> Result<ContentIdentifier> {
        match self.version {
            CidVersion::V0 => Ok(encode_v0(digest)),
            CidVersion::V1 => encode_v1(digest),
        }
    }
}

/// Pick a pool identifier for a digest.
pub fn pooled(digest: &[u8; 32]) -> ContentIdentifier {
    ContentIdentifier::new(DEMO_POOL[hash::index_for(digest, DEMO_POOL.len())])
}

/// Encode a digest as `Qm` + exactly 44 base58 symbols.
///
/// The digest is read as a big-endian integer and written in base58,
/// left-padded with the zero symbol `1`. A 256-bit value never needs
/// more than 44 symbols.
pub fn encode_v0(digest: &[u8; 32]) -> ContentIdentifier {
    let body = bs58::encode(digest).into_string();
    let mut out = String::with_capacity(V0_PREFIX.len() + V0_BODY_LEN);
    out.push_str(V0_PREFIX);
    for _ in body.len()..V0_BODY_LEN {
        out.push('1');
    }
    out.push_str(&body);
    ContentIdentifier::new(out)
}

/// Encode a BLAKE3 digest as a CIDv1 with the raw codec.
pub fn encode_v1(digest: &[u8; 32]) -> Result<ContentIdentifier> {
    let mh = Code::Blake3_256
        .wrap(digest)
        .map_err(|e| StoreError::HashDerivation(format!("multihash wrap failed: {e}")))?;
    Ok(ContentIdentifier::new(Cid::new_v1(RAW_CODEC, mh).to_string()))
}

fn content_digest(bytes: &[u8], name: &str) -> [u8; 32] {
    let len = (bytes.len() as u64).to_le_bytes();
    hash::hash_parts(&[&len[..], name.as_bytes(), &[0u8][..], bytes])
}

fn metadata_digest(declared_size: u64, name: &str) -> [u8; 32] {
    let mut material = Vec::with_capacity(8 + name.len());
    material.extend_from_slice(&declared_size.to_le_bytes());
    material.extend_from_slice(name.as_bytes());
    hash::derive_key(METADATA_CONTEXT, &material)
}
