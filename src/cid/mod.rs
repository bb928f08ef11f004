/// Content identifiers.
///
/// Identifiers name content rather than location. Two formats are produced
/// and recognised:
/// - v0: the legacy `Qm` tag followed by exactly 44 base58 symbols
/// - v1: a multibase base32 CID, at least 59 lowercase alphanumerics
pub mod derive;
pub mod hash;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base58 alphabet: no `0`, `O`, `I` or `l`.
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Version tag carried by every v0 identifier.
pub const V0_PREFIX: &str = "Qm";

/// Number of base58 symbols following the v0 tag.
pub const V0_BODY_LEN: usize = 44;

/// Minimum length of a v1 identifier.
pub const V1_MIN_LEN: usize = 59;

/// An opaque identifier derived from content bytes and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    /// Wrap an identifier string. No format check is performed; use
    /// [`validate`] for that.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Format version, if the identifier is well formed.
    pub fn version(&self) -> Option<CidVersion> {
        validate(&self.0).version
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CidVersion {
    #[default]
    V0,
    V1,
}

impl fmt::Display for CidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CidVersion::V0 => f.write_str("v0"),
            CidVersion::V1 => f.write_str("v1"),
        }
    }
}

/// Why an identifier string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("identifier is empty")]
    Empty,

    #[error("v0 identifier must have 44 symbols after the Qm tag, found {0}")]
    V0Length(usize),

    #[error("v0 identifier contains symbol {0:?} outside the base58 alphabet")]
    V0Symbol(char),

    #[error("not a v0 (Qm + 44 base58) or v1 (59+ lowercase alphanumeric) identifier")]
    Unrecognized,
}

/// Outcome of [`validate`]. Never an error: malformed input is reported here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<CidVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    fn ok(version: CidVersion) -> Self {
        Self {
            valid: true,
            version: Some(version),
            reason: None,
        }
    }

    fn rejected(err: FormatError) -> Self {
        Self {
            valid: false,
            version: None,
            reason: Some(err.to_string()),
        }
    }
}

/// Check an identifier string against the v0 and v1 formats.
pub fn validate(identifier: &str) -> ValidationResult {
    match classify(identifier) {
        Ok(version) => ValidationResult::ok(version),
        Err(e) => ValidationResult::rejected(e),
    }
}

/// Like [`validate`], but returns the failure as a typed error.
pub fn classify(identifier: &str) -> std::result::Result<CidVersion, FormatError> {
    if identifier.is_empty() {
        return Err(FormatError::Empty);
    }

    if let Some(body) = identifier.strip_prefix(V0_PREFIX) {
        let len = body.chars().count();
        if len != V0_BODY_LEN {
            return Err(FormatError::V0Length(len));
        }
        if let Some(bad) = body.chars().find(|c| !is_base58(*c)) {
            return Err(FormatError::V0Symbol(bad));
        }
        return Ok(CidVersion::V0);
    }

    if identifier.len() >= V1_MIN_LEN
        && identifier
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Ok(CidVersion::V1);
    }

    Err(FormatError::Unrecognized)
}

fn is_base58(c: char) -> bool {
    c.is_ascii() && BASE58_ALPHABET.contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_excludes_ambiguous_symbols() {
        assert_eq!(BASE58_ALPHABET.len(), 58);
        for c in ['0', 'O', 'I', 'l'] {
            assert!(!BASE58_ALPHABET.contains(c));
        }
    }

    #[test]
    fn test_validate_v0() {
        let id = format!("Qm{}", "a".repeat(V0_BODY_LEN));
        let result = validate(&id);
        assert!(result.valid);
        assert_eq!(result.version, Some(CidVersion::V0));
        assert!(result.reason.is_none());

        let known = "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o";
        assert_eq!(validate(known).version, Some(CidVersion::V0));
    }

    #[test]
    fn test_validate_v1() {
        let id = format!("bafkr4i{}", "a2".repeat(30));
        let result = validate(&id);
        assert!(result.valid);
        assert_eq!(result.version, Some(CidVersion::V1));
    }

    #[test]
    fn test_validate_rejects_empty_and_garbage() {
        let empty = validate("");
        assert!(!empty.valid);
        assert!(empty.reason.is_some());

        assert!(!validate("not-a-hash").valid);
        assert_eq!(classify("not-a-hash"), Err(FormatError::Unrecognized));
    }

    #[test]
    fn test_validate_v0_wrong_length() {
        let id = format!("Qm{}", "a".repeat(43));
        assert_eq!(classify(&id), Err(FormatError::V0Length(43)));
    }

    #[test]
    fn test_validate_v0_ambiguous_symbol() {
        let id = format!("Qm{}0", "a".repeat(43));
        assert_eq!(classify(&id), Err(FormatError::V0Symbol('0')));
        assert!(!validate(&id).valid);
    }

    #[test]
    fn test_validate_v1_rejects_uppercase() {
        let id = format!("bafkr4i{}", "A".repeat(60));
        assert!(!validate(&id).valid);
    }

    #[test]
    fn test_identifier_version() {
        let id = ContentIdentifier::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
        assert_eq!(id.version(), Some(CidVersion::V0));
        assert_eq!(ContentIdentifier::new("nope").version(), None);
    }
}
