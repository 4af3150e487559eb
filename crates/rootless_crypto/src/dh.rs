//! X25519 Diffie-Hellman.
//!
//! A raw DH output is never used directly as an AEAD key — every caller
//! routes it through HKDF (see `kdf.rs`). `SharedSecret` has no public
//! accessor beyond `as_bytes`, so that discipline is a convention, not an
//! enforced type boundary; the crate has no call site that skips it.

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// An X25519 key pair.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKeyPair {
    #[zeroize(skip)]
    public: [u8; 32],
    secret: [u8; 32],
}

impl EncryptionKeyPair {
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = crate::random::bytes_32()?;
        Self::from_scalar(&secret)
    }

    pub fn from_scalar(secret: &[u8; 32]) -> Result<Self, CryptoError> {
        let static_secret = StaticSecret::from(*secret);
        let public = PublicKey::from(&static_secret);
        Ok(Self {
            public: *public.as_bytes(),
            secret: *secret,
        })
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> SharedSecret {
        let secret = StaticSecret::from(self.secret);
        let public = PublicKey::from(*their_public);
        SharedSecret(secret.diffie_hellman(&public).to_bytes())
    }
}

/// Raw X25519 scalar multiplication between two byte arrays, for callers
/// holding ephemeral scalars that don't warrant a full `EncryptionKeyPair`.
pub fn agree(scalar: &[u8; 32], point: &[u8; 32]) -> SharedSecret {
    let secret = StaticSecret::from(*scalar);
    let public = PublicKey::from(*point);
    SharedSecret(secret.diffie_hellman(&public).to_bytes())
}

/// A 32-byte DH output. Zeroized on drop; callers must feed it to HKDF.
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dh_agreement_is_symmetric() {
        let a = EncryptionKeyPair::generate().unwrap();
        let b = EncryptionKeyPair::generate().unwrap();
        let ab = a.diffie_hellman(&b.public_bytes());
        let ba = b.diffie_hellman(&a.public_bytes());
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }
}
