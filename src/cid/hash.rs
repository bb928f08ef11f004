//! BLAKE3 helpers for identifier derivation.

/// Hash a sequence of byte slices as if they were concatenated.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Domain-separated digest of `material`. Distinct contexts give unrelated
/// digests for the same material.
pub fn derive_key(context: &str, material: &[u8]) -> [u8; 32] {
    blake3::derive_key(context, material)
}

/// Map a digest onto an index in `0..len`. `len` must be non-zero.
pub fn index_for(digest: &[u8; 32], len: usize) -> usize {
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(head) % len as u64) as usize
}
