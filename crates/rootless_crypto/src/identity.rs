//! KeySets, identity documents, and encrypted export/import.
//!
//! Grounded on the teacher's `identity::DeviceCert::issue`/`verify` pattern
//! (canonical build, Ed25519-sign over the canonical bytes, re-verify by
//! rebuilding the same canonical form) generalized to a variable-length
//! document and the dedicated `canonical` module instead of a hand-built
//! `serde_json::json!()`.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::aead;
use crate::canonical;
use crate::dh::EncryptionKeyPair;
use crate::did::Did;
use crate::error::CryptoError;
use crate::kdf::info;
use crate::password_kdf::{self, PasswordKdfParams};
use crate::signing::{self, SigningKeyPair};
use crate::time;

const DOCUMENT_VERSION: u32 = 2;
const ENVELOPE_VERSION: u32 = 2;

/// A signing + encryption key pair, generated together or derived from a
/// single 32-byte seed (spec §4.3 step 1).
pub struct KeySet {
    pub signing: SigningKeyPair,
    pub encryption: EncryptionKeyPair,
}

impl KeySet {
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self {
            signing: SigningKeyPair::generate()?,
            encryption: EncryptionKeyPair::generate()?,
        })
    }

    /// Each private half is `HKDF(seed, info=purpose-v2, 32)`; the
    /// intermediate derived material is zeroized immediately after the key
    /// pair is built from it.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let mut signing_material = crate::kdf::derive_32(seed, None, info::SIGNING_KEY)?;
        let signing = SigningKeyPair::from_seed(&signing_material)?;
        signing_material.zeroize();

        let mut encryption_material = crate::kdf::derive_32(seed, None, info::ENCRYPTION_KEY)?;
        let encryption = EncryptionKeyPair::from_scalar(&encryption_material)?;
        encryption_material.zeroize();

        Ok(Self { signing, encryption })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Ephemeral,
    Persistent,
    Recoverable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPurpose {
    Signing,
    Encryption,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    pub id: String,
    pub purpose: KeyPurpose,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub public_key: [u8; 32],
    pub created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub verification_method: String,
    pub created: i64,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub signature: [u8; 64],
}

/// The signed, canonically-serializable identity document (spec §3/§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDocument {
    pub version: u32,
    pub did: Did,
    #[serde(rename = "type")]
    pub kind: IdentityKind,
    pub public_keys: Vec<PublicKeyEntry>,
    pub created: i64,
    pub updated: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

/// A failure found while verifying an `IdentityDocument`. Verification
/// accumulates every applicable issue rather than stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentIssue {
    VersionMismatch,
    MissingSigningKey,
    DidKeyMismatch,
    InvalidSignature,
    FutureCreationTime,
    KeyExpired(String),
    KeyRevoked(String),
}

fn sign_document(document: &mut IdentityDocument, signing: &SigningKeyPair) -> Result<(), CryptoError> {
    document.proof = None;
    let bytes = canonical::to_canonical_bytes(document)?;
    let signature = signing.sign_hash(&bytes);
    document.proof = Some(Proof {
        proof_type: "Ed25519Signature2020".to_string(),
        verification_method: format!("{}#key-1", document.did),
        created: time::now_ms(),
        signature,
    });
    Ok(())
}

/// Verify an `IdentityDocument`'s internal consistency: version, DID-key
/// binding, signature, freshness, and key lifecycle. Returns every issue
/// found; an empty list means the document is valid.
pub fn verify_identity_document(document: &IdentityDocument) -> Vec<DocumentIssue> {
    let mut issues = Vec::new();

    if document.version != DOCUMENT_VERSION {
        issues.push(DocumentIssue::VersionMismatch);
    }

    let signing_entry = document
        .public_keys
        .iter()
        .find(|k| k.purpose == KeyPurpose::Signing);

    let Some(signing_entry) = signing_entry else {
        issues.push(DocumentIssue::MissingSigningKey);
        return issues;
    };

    if Did::from_signing_key(&signing_entry.public_key) != document.did {
        issues.push(DocumentIssue::DidKeyMismatch);
    }

    match &document.proof {
        None => issues.push(DocumentIssue::InvalidSignature),
        Some(proof) => {
            let mut unsigned = document.clone();
            unsigned.proof = None;
            match canonical::to_canonical_bytes(&unsigned) {
                Ok(bytes) if signing::verify_hash(&signing_entry.public_key, &bytes, &proof.signature) => {}
                _ => issues.push(DocumentIssue::InvalidSignature),
            }
        }
    }

    let now = time::now_ms();
    if document.created > now + time::FUTURE_TOLERANCE_MS {
        issues.push(DocumentIssue::FutureCreationTime);
    }

    for entry in &document.public_keys {
        if let Some(expires) = entry.expires {
            if expires < now {
                issues.push(DocumentIssue::KeyExpired(entry.id.clone()));
            }
        }
        if entry.revoked.is_some() {
            issues.push(DocumentIssue::KeyRevoked(entry.id.clone()));
        }
    }

    issues
}

/// Options for `Identity::create`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateIdentityOptions {
    pub kind: IdentityKindOrDefault,
    pub seed: Option<[u8; 32]>,
}

/// Wrapper so `CreateIdentityOptions` can derive `Default` while defaulting
/// to `Persistent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKindOrDefault(pub IdentityKind);

impl Default for IdentityKindOrDefault {
    fn default() -> Self {
        IdentityKindOrDefault(IdentityKind::Persistent)
    }
}

/// A self-sovereign identity: its DID, its current signed document, and
/// the private key material that backs it.
pub struct Identity {
    pub did: Did,
    pub kind: IdentityKind,
    pub document: IdentityDocument,
    pub key_set: KeySet,
    pub created: i64,
}

impl Identity {
    pub fn create(options: CreateIdentityOptions) -> Result<Self, CryptoError> {
        let key_set = match options.seed {
            Some(seed) => KeySet::from_seed(&seed)?,
            None => KeySet::generate()?,
        };
        let did = Did::from_signing_key(&key_set.signing.public_bytes());
        let now = time::now_ms();

        let public_keys = vec![
            PublicKeyEntry {
                id: format!("{did}#key-1"),
                purpose: KeyPurpose::Signing,
                public_key: key_set.signing.public_bytes(),
                created: now,
                expires: None,
                revoked: None,
            },
            PublicKeyEntry {
                id: format!("{did}#key-2"),
                purpose: KeyPurpose::Encryption,
                public_key: key_set.encryption.public_bytes(),
                created: now,
                expires: None,
                revoked: None,
            },
        ];

        let mut document = IdentityDocument {
            version: DOCUMENT_VERSION,
            did: did.clone(),
            kind: options.kind.0,
            public_keys,
            created: now,
            updated: now,
            proof: None,
        };
        sign_document(&mut document, &key_set.signing)?;

        Ok(Self {
            did,
            kind: options.kind.0,
            document,
            key_set,
            created: now,
        })
    }

    /// Replace the encryption key with a fresh one, revoke the old
    /// encryption entry, append the new one, and re-sign the document with
    /// the (unchanged) signing key — the DID never moves, since it is
    /// derived from the signing key alone.
    pub fn rotate_encryption_key(&mut self) -> Result<(), CryptoError> {
        let new_encryption = EncryptionKeyPair::generate()?;
        let now = time::now_ms();

        for entry in self.document.public_keys.iter_mut() {
            if entry.purpose == KeyPurpose::Encryption && entry.revoked.is_none() {
                entry.revoked = Some(now);
            }
        }

        let next_index = self.document.public_keys.len() + 1;
        self.document.public_keys.push(PublicKeyEntry {
            id: format!("{}#key-{next_index}", self.did),
            purpose: KeyPurpose::Encryption,
            public_key: new_encryption.public_bytes(),
            created: now,
            expires: None,
            revoked: None,
        });
        self.document.updated = now;
        self.key_set.encryption = new_encryption;
        sign_document(&mut self.document, &self.key_set.signing)?;
        Ok(())
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.key_set.signing.sign_hash(data)
    }

    /// Seal the identity (DID, kind, document, both private key halves,
    /// created timestamp) under a passphrase-derived key.
    pub fn export(&self, password: &[u8]) -> Result<ExportedIdentity, CryptoError> {
        let snapshot = IdentitySnapshot {
            did: self.did.clone(),
            kind: self.kind,
            document: self.document.clone(),
            key_set: KeySetSnapshot {
                signing: KeyPairSnapshot {
                    public: self.key_set.signing.public_bytes().to_vec(),
                    private: self.key_set.signing.to_full_private().to_vec(),
                },
                encryption: KeyPairSnapshot {
                    public: self.key_set.encryption.public_bytes().to_vec(),
                    private: self.key_set.encryption.secret_bytes().to_vec(),
                },
            },
            created: self.created,
        };
        let plaintext = canonical::to_canonical_bytes(&snapshot)?;

        let params = PasswordKdfParams::generate()?;
        let mut wrap_key = password_kdf::derive_wrap_key(password, &params)?;
        let data = aead::encrypt(&wrap_key, &plaintext, b"");
        wrap_key.zeroize();

        Ok(ExportedIdentity {
            version: ENVELOPE_VERSION,
            encrypted: true,
            data: data?,
            kdf: params,
        })
    }

    /// Re-derive the wrap key, decrypt, parse, and re-verify the
    /// document. A wrong passphrase surfaces as an `Authentication` error
    /// from the AEAD tag, not a decode error.
    pub fn import(exported: &ExportedIdentity, password: &[u8]) -> Result<Self, CryptoError> {
        if exported.version != ENVELOPE_VERSION || !exported.encrypted {
            return Err(CryptoError::protocol("unsupported export envelope version"));
        }
        let mut wrap_key = password_kdf::derive_wrap_key(password, &exported.kdf)?;
        let plaintext = aead::decrypt(&wrap_key, &exported.data, b"");
        wrap_key.zeroize();
        let plaintext = plaintext?;

        let snapshot: IdentitySnapshot = serde_json::from_slice(&plaintext)?;

        let signing = SigningKeyPair::from_private_bytes(&snapshot.key_set.signing.private)?;
        let encryption_secret = <[u8; 32]>::try_from(snapshot.key_set.encryption.private.as_slice())
            .map_err(|_| CryptoError::input("encryption private key is not 32 bytes"))?;
        let encryption = EncryptionKeyPair::from_scalar(&encryption_secret)?;

        let issues = verify_identity_document(&snapshot.document);
        if !issues.is_empty() {
            return Err(CryptoError::protocol(format!(
                "imported document failed verification: {issues:?}"
            )));
        }

        Ok(Self {
            did: snapshot.did,
            kind: snapshot.kind,
            document: snapshot.document,
            key_set: KeySet { signing, encryption },
            created: snapshot.created,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentitySnapshot {
    did: Did,
    #[serde(rename = "type")]
    kind: IdentityKind,
    document: IdentityDocument,
    key_set: KeySetSnapshot,
    created: i64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeySetSnapshot {
    signing: KeyPairSnapshot,
    encryption: KeyPairSnapshot,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPairSnapshot {
    #[serde(with = "crate::encoding::bytes")]
    public: Vec<u8>,
    #[serde(with = "crate::encoding::bytes")]
    private: Vec<u8>,
}

/// The portable, password-encrypted identity envelope (spec §3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedIdentity {
    pub version: u32,
    pub encrypted: bool,
    #[serde(with = "crate::encoding::bytes")]
    pub data: Vec<u8>,
    pub kdf: PasswordKdfParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(byte: u8) -> [u8; 32] {
        let mut s = [0u8; 32];
        for (i, b) in s.iter_mut().enumerate() {
            *b = byte.wrapping_add(i as u8);
        }
        s
    }

    #[test]
    fn identity_from_same_seed_is_deterministic() {
        let a = Identity::create(CreateIdentityOptions { seed: Some(seed(1)), ..Default::default() }).unwrap();
        let b = Identity::create(CreateIdentityOptions { seed: Some(seed(1)), ..Default::default() }).unwrap();
        assert_eq!(a.did, b.did);
        assert!(verify_identity_document(&a.document).is_empty());
        assert!(verify_identity_document(&b.document).is_empty());
    }

    #[test]
    fn document_self_consistency() {
        let identity = Identity::create(CreateIdentityOptions::default()).unwrap();
        assert!(verify_identity_document(&identity.document).is_empty());

        let mut tampered = identity.document.clone();
        tampered.public_keys[0].public_key[0] ^= 0x01;
        let issues = verify_identity_document(&tampered);
        assert!(issues.contains(&DocumentIssue::InvalidSignature) || issues.contains(&DocumentIssue::DidKeyMismatch));
    }

    #[test]
    fn rotate_encryption_key_revokes_old_entry_and_keeps_did() {
        let mut identity = Identity::create(CreateIdentityOptions::default()).unwrap();
        let old_did = identity.did.clone();
        let old_encryption_pub = identity.key_set.encryption.public_bytes();

        identity.rotate_encryption_key().unwrap();

        assert_eq!(identity.did, old_did);
        assert_ne!(identity.key_set.encryption.public_bytes(), old_encryption_pub);
        assert!(verify_identity_document(&identity.document).is_empty());
        let revoked_count = identity
            .document
            .public_keys
            .iter()
            .filter(|k| k.purpose == KeyPurpose::Encryption && k.revoked.is_some())
            .count();
        assert_eq!(revoked_count, 1);
    }

    #[test]
    fn export_import_roundtrip_same_password() {
        let identity = Identity::create(CreateIdentityOptions { seed: Some(seed(5)), ..Default::default() }).unwrap();
        let exported = identity.export(b"correct horse").unwrap();
        let imported = Identity::import(&exported, b"correct horse").unwrap();
        assert_eq!(imported.did, identity.did);
    }

    #[test]
    fn import_with_wrong_password_fails_authentication() {
        let identity = Identity::create(CreateIdentityOptions { seed: Some(seed(6)), ..Default::default() }).unwrap();
        let exported = identity.export(b"correct horse").unwrap();
        let result = Identity::import(&exported, b"staple");
        assert!(matches!(result, Err(CryptoError::Authentication(_))));
    }
}
