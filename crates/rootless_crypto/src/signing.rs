//! Ed25519 signing.
//!
//! Public keys are 32 bytes, signatures 64 bytes. The "full" private-key
//! form used on the wire and in export envelopes is 64 bytes
//! (seed‖public) — `sign`/`verify` accept either a bare 32-byte seed or the
//! 64-byte full form and use only the first 32 bytes either way.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::hash;

/// An Ed25519 key pair. The private half is zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)]
    public: [u8; 32],
    seed: [u8; 32],
}

impl SigningKeyPair {
    pub fn generate() -> Result<Self, CryptoError> {
        let seed = crate::random::bytes_32()?;
        Self::from_seed(&seed)
    }

    /// Derive a key pair from a 32-byte seed (the seed IS the Ed25519 secret
    /// scalar seed, as in RFC 8032).
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_bytes(seed);
        let public = signing_key.verifying_key().to_bytes();
        Ok(Self { public, seed: *seed })
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public
    }

    /// The 64-byte "full" private form (seed‖public) used on export.
    pub fn to_full_private(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.seed);
        out[32..].copy_from_slice(&self.public);
        out
    }

    /// Reconstruct from either a 32-byte seed or a 64-byte full private
    /// (seed‖public) form.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(bytes);
                Self::from_seed(&seed)
            }
            64 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes[..32]);
                Self::from_seed(&seed)
            }
            n => Err(CryptoError::input(format!(
                "Ed25519 private key must be 32 or 64 bytes, got {n}"
            ))),
        }
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }

    /// Raw Ed25519 signature over `msg`.
    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key().sign(msg).to_bytes()
    }

    /// `BLAKE3(data)` then sign — the composition used for content objects
    /// and identity documents.
    pub fn sign_hash(&self, data: &[u8]) -> [u8; 64] {
        self.sign(&hash::hash(data))
    }
}

/// Verify a raw signature with a bare public key. Never panics: malformed
/// input (wrong-length key or signature) simply returns `false`.
pub fn verify(public: &[u8], msg: &[u8], signature: &[u8]) -> bool {
    let Ok(pub_bytes) = <[u8; 32]>::try_from(public) else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_bytes(&pub_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_bytes);
    vk.verify(msg, &sig).is_ok()
}

/// `BLAKE3(data)` then verify — matches `sign_hash`.
pub fn verify_hash(public: &[u8], data: &[u8], signature: &[u8]) -> bool {
    verify(public, &hash::hash(data), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = SigningKeyPair::generate().unwrap();
        let sig = kp.sign(b"message");
        assert!(verify(&kp.public_bytes(), b"message", &sig));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let kp = SigningKeyPair::generate().unwrap();
        let sig = kp.sign(b"message");
        assert!(!verify(&kp.public_bytes(), b"other", &sig));
    }

    #[test]
    fn verify_never_panics_on_malformed_input() {
        assert!(!verify(b"short", b"msg", b"short"));
        assert!(!verify(&[0u8; 32], b"msg", &[0u8; 10]));
    }

    #[test]
    fn seed_roundtrips_through_full_private_form() {
        let kp = SigningKeyPair::generate().unwrap();
        let full = kp.to_full_private();
        let kp2 = SigningKeyPair::from_private_bytes(&full).unwrap();
        assert_eq!(kp.public_bytes(), kp2.public_bytes());
    }

    #[test]
    fn sign_hash_matches_verify_hash() {
        let kp = SigningKeyPair::generate().unwrap();
        let sig = kp.sign_hash(b"content bytes");
        assert!(verify_hash(&kp.public_bytes(), b"content bytes", &sig));
    }
}
