//! BLAKE3 hashing, plus SHA-256/SHA-512 for the handful of interop points
//! that demand them (HKDF's underlying hash, other specs that hardcode
//! SHA-512). BLAKE3 is the primary hash used throughout the protocol.

use sha2::Digest;

/// `BLAKE3(data)`, 32 bytes.
pub fn hash(data: &[u8]) -> [u8; 32] {
    blake3::hash(data).into()
}

/// Keyed BLAKE3 — used where a key differentiates independent domains
/// (e.g. separating two MACs derived from the same root material).
pub fn keyed_hash(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    blake3::keyed_hash(key, data).into()
}

/// Context-labelled KDF mode of BLAKE3: `derive_key(context, ikm) -> dk_len`.
pub fn kdf(ikm: &[u8], context: &str, dk_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; dk_len];
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(ikm);
    hasher.finalize_xof().fill(&mut out);
    out
}

/// SHA-256, for interop points that specifically require it.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(data).into()
}

/// SHA-512, for interop points (e.g. Ed25519-to-X25519 conversion) that
/// specifically require it.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    sha2::Sha512::digest(data).into()
}
