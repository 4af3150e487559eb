//! X3DH: asynchronous session establishment from a published prekey
//! bundle (spec §4.5).
//!
//! Kept close to the teacher's `x3dh.rs`, which already implements this
//! subsystem end to end (prekey generation, initiator, responder,
//! Ed25519→X25519 identity-key reuse, OTP consumption); generalized to
//! this crate's `Did`/`KeySet` types and to a taxonomy of distinct
//! `Protocol` errors in place of the teacher's single `PrekeyError(String)`.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::dh::{self, EncryptionKeyPair};
use crate::error::CryptoError;
use crate::identity::KeySet;
use crate::kdf::{self, info};
use crate::random;
use crate::signing::{self, SigningKeyPair};
use crate::time;

/// Default number of one-time prekeys generated per bundle.
pub const DEFAULT_ONE_TIME_PREKEY_COUNT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPrekey {
    pub id: u32,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub public_key: [u8; 32],
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub private_key: [u8; 32],
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub signature: [u8; 64],
    pub created: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimePrekey {
    pub id: u32,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub public_key: [u8; 32],
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub private_key: [u8; 32],
    pub used: bool,
}

/// An identity's full prekey material, including private halves. Held by
/// the owning identity; never transmitted as-is (see `PrekeyBundle`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrekeySet {
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub identity_key: [u8; 32],
    pub signed_prekey: SignedPrekey,
    pub one_time_prekeys: Vec<OneTimePrekey>,
}

impl PrekeySet {
    /// Generate a fresh signed prekey and `count` one-time prekeys for
    /// `keys`'s identity.
    pub fn generate(keys: &KeySet, count: usize) -> Result<Self, CryptoError> {
        let signed_prekey = generate_signed_prekey(&keys.signing)?;
        let one_time_prekeys = generate_one_time_prekeys(count)?;
        Ok(Self {
            identity_key: keys.encryption.public_bytes(),
            signed_prekey,
            one_time_prekeys,
        })
    }

    pub fn needs_signed_prekey_rotation(&self) -> bool {
        time::now_ms() - self.signed_prekey.created > time::SIGNED_PREKEY_ROTATION_MS
    }

    pub fn rotate_signed_prekey(&mut self, signing: &SigningKeyPair) -> Result<(), CryptoError> {
        self.signed_prekey = generate_signed_prekey(signing)?;
        Ok(())
    }

    pub fn replenish_one_time_prekeys(&mut self, count: usize) -> Result<(), CryptoError> {
        self.one_time_prekeys.extend(generate_one_time_prekeys(count)?);
        Ok(())
    }

    /// Atomically consume the one-time prekey with the given id. A
    /// repeated lookup fails, enforcing single-use.
    fn take_one_time_prekey(&mut self, id: u32) -> Result<OneTimePrekey, CryptoError> {
        let entry = self
            .one_time_prekeys
            .iter_mut()
            .find(|otp| otp.id == id)
            .ok_or_else(|| CryptoError::protocol("unknown one-time prekey id"))?;
        if entry.used {
            return Err(CryptoError::protocol("unknown one-time prekey id"));
        }
        entry.used = true;
        Ok(OneTimePrekey {
            id: entry.id,
            public_key: entry.public_key,
            private_key: entry.private_key,
            used: true,
        })
    }

    pub fn public_bundle(&self) -> PrekeyBundle {
        PrekeyBundle {
            identity_key: self.identity_key,
            signed_prekey_id: self.signed_prekey.id,
            signed_prekey_public: self.signed_prekey.public_key,
            signed_prekey_signature: self.signed_prekey.signature,
            signed_prekey_created: self.signed_prekey.created,
            one_time_prekeys: self
                .one_time_prekeys
                .iter()
                .filter(|otp| !otp.used)
                .map(|otp| BundledOneTimePrekey { id: otp.id, public_key: otp.public_key })
                .collect(),
        }
    }
}

/// The public projection of a `PrekeySet`, fetched by an initiator —
/// private keys never appear here, and used one-time prekeys are excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrekeyBundle {
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub identity_key: [u8; 32],
    pub signed_prekey_id: u32,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub signed_prekey_public: [u8; 32],
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub signed_prekey_signature: [u8; 64],
    pub signed_prekey_created: i64,
    pub one_time_prekeys: Vec<BundledOneTimePrekey>,
}

/// An unused one-time prekey's public half, as it appears in a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundledOneTimePrekey {
    pub id: u32,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub public_key: [u8; 32],
}

impl PrekeyBundle {
    fn take_one_time_prekey(&mut self) -> Option<BundledOneTimePrekey> {
        if self.one_time_prekeys.is_empty() {
            None
        } else {
            Some(self.one_time_prekeys.remove(0))
        }
    }
}

fn generate_signed_prekey(signing: &SigningKeyPair) -> Result<SignedPrekey, CryptoError> {
    let pair = EncryptionKeyPair::generate()?;
    let id = random_u32()?;
    let signature = signing.sign(&pair.public_bytes());
    Ok(SignedPrekey {
        id,
        public_key: pair.public_bytes(),
        private_key: *pair.secret_bytes(),
        signature,
        created: time::now_ms(),
    })
}

fn generate_one_time_prekeys(count: usize) -> Result<Vec<OneTimePrekey>, CryptoError> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let pair = EncryptionKeyPair::generate()?;
        out.push(OneTimePrekey {
            id: random_u32()?,
            public_key: pair.public_bytes(),
            private_key: *pair.secret_bytes(),
            used: false,
        });
    }
    Ok(out)
}

fn random_u32() -> Result<u32, CryptoError> {
    let bytes = random::bytes_32()?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// What an initiator hands back after computing a shared secret, and what
/// a responder needs to reproduce it.
#[derive(Debug, Clone)]
pub struct X3dhResult {
    pub shared_secret: [u8; 32],
    pub ephemeral_public: [u8; 32],
    pub used_signed_prekey_id: u32,
    pub used_one_time_prekey_id: Option<u32>,
}

fn x3dh_kdf(dh1: &[u8; 32], dh2: &[u8; 32], dh3: &[u8; 32], dh4: Option<&[u8; 32]>) -> Result<[u8; 32], CryptoError> {
    let mut transcript = Vec::with_capacity(128);
    transcript.extend_from_slice(dh1);
    transcript.extend_from_slice(dh2);
    transcript.extend_from_slice(dh3);
    if let Some(dh4) = dh4 {
        transcript.extend_from_slice(dh4);
    }
    let result = kdf::derive_32(&transcript, None, info::X3DH);
    transcript.zeroize();
    result
}

/// Initiate a session: verify the peer's signed prekey, generate an
/// ephemeral key, and derive the shared secret.
pub fn initiate(
    my_identity: &KeySet,
    peer_bundle: &mut PrekeyBundle,
    peer_signing_public: &[u8; 32],
) -> Result<X3dhResult, CryptoError> {
    if !signing::verify(peer_signing_public, &peer_bundle.signed_prekey_public, &peer_bundle.signed_prekey_signature) {
        return Err(CryptoError::auth("peer signed prekey signature does not verify"));
    }

    let ephemeral = EncryptionKeyPair::generate()?;

    let dh1 = my_identity.encryption.diffie_hellman(&peer_bundle.signed_prekey_public);
    let dh2 = ephemeral.diffie_hellman(&peer_bundle.identity_key);
    let dh3 = ephemeral.diffie_hellman(&peer_bundle.signed_prekey_public);

    let used_otp = peer_bundle.take_one_time_prekey();
    let dh4 = used_otp.as_ref().map(|otp| ephemeral.diffie_hellman(&otp.public_key));

    let shared_secret = x3dh_kdf(dh1.as_bytes(), dh2.as_bytes(), dh3.as_bytes(), dh4.as_ref().map(|s| s.as_bytes()))?;

    Ok(X3dhResult {
        shared_secret,
        ephemeral_public: ephemeral.public_bytes(),
        used_signed_prekey_id: peer_bundle.signed_prekey_id,
        used_one_time_prekey_id: used_otp.map(|otp| otp.id),
    })
}

/// Respond to an initiator's handshake: verify the declared signed-prekey
/// id, consume the declared one-time prekey (if any), and derive the same
/// shared secret via the mirrored DH computation.
pub fn respond(
    my_identity: &KeySet,
    my_prekeys: &mut PrekeySet,
    initiator_identity_key: &[u8; 32],
    initiator_ephemeral_key: &[u8; 32],
    used_signed_prekey_id: u32,
    used_one_time_prekey_id: Option<u32>,
) -> Result<X3dhResult, CryptoError> {
    if my_prekeys.signed_prekey.id != used_signed_prekey_id {
        return Err(CryptoError::protocol("unknown signed prekey id"));
    }
    if my_prekeys.needs_signed_prekey_rotation() {
        return Err(CryptoError::freshness("signed prekey is past its rotation window"));
    }

    let spk_priv = &my_prekeys.signed_prekey.private_key;
    let dh1 = dh::agree(spk_priv, initiator_identity_key);
    let dh2 = dh::agree(my_identity.encryption.secret_bytes(), initiator_ephemeral_key);
    let dh3 = dh::agree(spk_priv, initiator_ephemeral_key);

    let dh4 = match used_one_time_prekey_id {
        Some(id) => {
            let otp = my_prekeys.take_one_time_prekey(id)?;
            Some(dh::agree(&otp.private_key, initiator_ephemeral_key))
        }
        None => None,
    };

    let shared_secret = x3dh_kdf(dh1.as_bytes(), dh2.as_bytes(), dh3.as_bytes(), dh4.as_ref().map(|s| s.as_bytes()))?;

    Ok(X3dhResult {
        shared_secret,
        ephemeral_public: *initiator_ephemeral_key,
        used_signed_prekey_id,
        used_one_time_prekey_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::KeySet;

    fn fresh_keyset() -> KeySet {
        KeySet::generate().unwrap()
    }

    #[test]
    fn x3dh_roundtrip_without_otp() {
        let alice = fresh_keyset();
        let bob = fresh_keyset();
        let mut prekeys = PrekeySet::generate(&bob, 0).unwrap();
        let mut bundle = prekeys.public_bundle();

        let result = initiate(&alice, &mut bundle, &bob.signing.public_bytes()).unwrap();
        assert!(result.used_one_time_prekey_id.is_none());

        let response = respond(
            &bob,
            &mut prekeys,
            &alice.encryption.public_bytes(),
            &result.ephemeral_public,
            result.used_signed_prekey_id,
            result.used_one_time_prekey_id,
        )
        .unwrap();

        assert_eq!(result.shared_secret, response.shared_secret);
    }

    #[test]
    fn x3dh_roundtrip_with_otp() {
        let alice = fresh_keyset();
        let bob = fresh_keyset();
        let mut prekeys = PrekeySet::generate(&bob, 5).unwrap();
        let mut bundle = prekeys.public_bundle();
        assert_eq!(bundle.one_time_prekeys.len(), 5);

        let result = initiate(&alice, &mut bundle, &bob.signing.public_bytes()).unwrap();
        assert!(result.used_one_time_prekey_id.is_some());

        let response = respond(
            &bob,
            &mut prekeys,
            &alice.encryption.public_bytes(),
            &result.ephemeral_public,
            result.used_signed_prekey_id,
            result.used_one_time_prekey_id,
        )
        .unwrap();

        assert_eq!(result.shared_secret, response.shared_secret);

        let reuse = respond(
            &bob,
            &mut prekeys,
            &alice.encryption.public_bytes(),
            &result.ephemeral_public,
            result.used_signed_prekey_id,
            result.used_one_time_prekey_id,
        );
        assert!(reuse.is_err());
    }

    #[test]
    fn rejects_invalid_signed_prekey_signature() {
        let alice = fresh_keyset();
        let bob = fresh_keyset();
        let mallory = fresh_keyset();
        let prekeys = PrekeySet::generate(&bob, 0).unwrap();
        let mut bundle = prekeys.public_bundle();

        let err = initiate(&alice, &mut bundle, &mallory.signing.public_bytes()).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication(_)));
    }

    #[test]
    fn rejects_unknown_signed_prekey_id() {
        let alice = fresh_keyset();
        let bob = fresh_keyset();
        let mut prekeys = PrekeySet::generate(&bob, 0).unwrap();
        let mut bundle = prekeys.public_bundle();
        let result = initiate(&alice, &mut bundle, &bob.signing.public_bytes()).unwrap();

        let err = respond(&bob, &mut prekeys, &alice.encryption.public_bytes(), &result.ephemeral_public, 0, None).unwrap_err();
        assert!(matches!(err, CryptoError::Protocol(_)));
    }

    #[test]
    fn signed_prekey_rotation_is_due_after_seven_days() {
        let bob = fresh_keyset();
        let mut prekeys = PrekeySet::generate(&bob, 0).unwrap();
        assert!(!prekeys.needs_signed_prekey_rotation());
        prekeys.signed_prekey.created -= time::SIGNED_PREKEY_ROTATION_MS + 1;
        assert!(prekeys.needs_signed_prekey_rotation());
    }

    #[test]
    fn respond_rejects_an_expired_signed_prekey() {
        let alice = fresh_keyset();
        let bob = fresh_keyset();
        let mut prekeys = PrekeySet::generate(&bob, 0).unwrap();
        let mut bundle = prekeys.public_bundle();
        let result = initiate(&alice, &mut bundle, &bob.signing.public_bytes()).unwrap();

        prekeys.signed_prekey.created -= time::SIGNED_PREKEY_ROTATION_MS + 1;

        let err = respond(
            &bob,
            &mut prekeys,
            &alice.encryption.public_bytes(),
            &result.ephemeral_public,
            result.used_signed_prekey_id,
            result.used_one_time_prekey_id,
        )
        .unwrap_err();
        assert!(matches!(err, CryptoError::Freshness(_)));
    }
}
