//! Content objects: canonical serialization, payload encryption, hash
//! binding, signing, verification, decryption (spec §3/§4.4).
//!
//! Grounded on the teacher's `dl_proto::message::MessageContent` tagged-
//! union idiom for the payload shape, and on `dl_crypto::x3dh`'s
//! "ephemeral X25519 + HKDF-wrapped key" pattern, reused here for both the
//! multi-recipient and sealed-box payload variants.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::aead;
use crate::canonical;
use crate::cid::Cid;
use crate::ct;
use crate::dh::{self, EncryptionKeyPair};
use crate::did::{Did, KeyKind};
use crate::error::CryptoError;
use crate::hash;
use crate::identity::Identity;
use crate::kdf::{self, info};
use crate::signing;
use crate::time;

const CONTENT_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncryptionKind {
    None,
    Zone,
    Recipients,
    #[serde(rename = "self")]
    SelfSealed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientEntry {
    pub did: Did,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub recipient_public_key: [u8; 32],
    #[serde(with = "crate::encoding::bytes")]
    pub encrypted_key: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Clear {
        #[serde(with = "crate::encoding::bytes")]
        data: Vec<u8>,
    },
    Recipients {
        #[serde(with = "crate::encoding::fixed_bytes")]
        ephemeral_public: [u8; 32],
        recipients: Vec<RecipientEntry>,
        #[serde(with = "crate::encoding::bytes")]
        ciphertext: Vec<u8>,
    },
    #[serde(rename = "self")]
    SelfSealed {
        #[serde(with = "crate::encoding::fixed_bytes")]
        ephemeral_public: [u8; 32],
        #[serde(with = "crate::encoding::bytes")]
        ciphertext: Vec<u8>,
    },
    Zone {
        #[serde(with = "crate::encoding::fixed_bytes")]
        ephemeral_public: [u8; 32],
        #[serde(with = "crate::encoding::bytes")]
        ciphertext: Vec<u8>,
    },
}

/// A signed, content-addressed message (spec §3's `ContentObject`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentObject {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Cid>,
    pub author: Did,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Cid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Cid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Did>,
    pub content_type: String,
    pub payload_encryption: PayloadEncryptionKind,
    pub payload: Payload,
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub payload_hash: [u8; 32],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::encoding::option_fixed_bytes")]
    pub signature: Option<[u8; 64]>,
}

/// One recipient's encryption public key, keyed by DID, for `recipients`
/// encryption.
#[derive(Debug, Clone)]
pub struct RecipientKey {
    pub did: Did,
    pub encryption_public_key: [u8; 32],
}

/// The plaintext payload and how it should be encrypted at creation time.
pub enum PayloadInput<'a> {
    None(&'a [u8]),
    Recipients { plaintext: &'a [u8], recipients: &'a [RecipientKey] },
    SelfSealed(&'a [u8]),
    Zone(&'a [u8]),
}

#[derive(Debug, Clone, Default)]
pub struct CreateContentOptions {
    pub zone: String,
    pub content_type: String,
    pub expires_at: Option<i64>,
    pub parent: Option<Cid>,
    pub thread: Option<Cid>,
    pub mentions: Vec<Did>,
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub extensions: Option<serde_json::Value>,
}

fn build_aad(version: u32, author: &Did, content_type: &str) -> Vec<u8> {
    let mut aad = Vec::new();
    aad.extend_from_slice(&version.to_be_bytes());
    aad.extend_from_slice(author.as_str().as_bytes());
    aad.extend_from_slice(content_type.as_bytes());
    aad
}

/// Build, sign, and identify a new content object (spec §4.4 Create).
pub fn create_content(
    identity: &Identity,
    options: CreateContentOptions,
    payload_input: PayloadInput,
) -> Result<ContentObject, CryptoError> {
    let aad = build_aad(CONTENT_VERSION, &identity.did, &options.content_type);

    let (payload_hash, payload_encryption, payload) = match payload_input {
        PayloadInput::None(plaintext) => (
            hash::hash(plaintext),
            PayloadEncryptionKind::None,
            Payload::Clear { data: plaintext.to_vec() },
        ),
        PayloadInput::Recipients { plaintext, recipients } => {
            if recipients.is_empty() {
                return Err(CryptoError::protocol("recipients encryption requires at least one recipient"));
            }
            let payload_hash = hash::hash(plaintext);
            let ephemeral = EncryptionKeyPair::generate()?;
            let mut content_key = crate::random::bytes_32()?;

            let mut entries = Vec::with_capacity(recipients.len());
            for recipient in recipients {
                let shared = ephemeral.diffie_hellman(&recipient.encryption_public_key);
                let mut wrap_key = kdf::derive_32(shared.as_bytes(), None, info::MULTI_RECIPIENT_WRAP)?;
                let encrypted_key = aead::encrypt(&wrap_key, &content_key, &aad)?;
                wrap_key.zeroize();
                entries.push(RecipientEntry {
                    did: recipient.did.clone(),
                    recipient_public_key: recipient.encryption_public_key,
                    encrypted_key,
                });
            }

            let ciphertext = aead::encrypt(&content_key, plaintext, &aad)?;
            content_key.zeroize();

            (
                payload_hash,
                PayloadEncryptionKind::Recipients,
                Payload::Recipients { ephemeral_public: ephemeral.public_bytes(), recipients: entries, ciphertext },
            )
        }
        PayloadInput::SelfSealed(plaintext) => {
            let payload_hash = hash::hash(plaintext);
            let ephemeral = EncryptionKeyPair::generate()?;
            let shared = ephemeral.diffie_hellman(&identity.key_set.encryption.public_bytes());
            let mut key = kdf::derive_32(shared.as_bytes(), None, info::SEALED_BOX)?;
            let ciphertext = aead::encrypt(&key, plaintext, &aad)?;
            key.zeroize();

            (
                payload_hash,
                PayloadEncryptionKind::SelfSealed,
                Payload::SelfSealed { ephemeral_public: ephemeral.public_bytes(), ciphertext },
            )
        }
        PayloadInput::Zone(_) => return Err(CryptoError::protocol("zone key required")),
    };

    let mut object = ContentObject {
        version: CONTENT_VERSION,
        id: None,
        author: identity.did.clone(),
        timestamp: time::now_ms(),
        expires_at: options.expires_at,
        zone: options.zone,
        parent: options.parent,
        thread: options.thread,
        mentions: options.mentions,
        content_type: options.content_type,
        payload_encryption,
        payload,
        payload_hash,
        tags: options.tags,
        language: options.language,
        extensions: options.extensions,
        signature: None,
    };

    let unsigned_bytes = canonical::to_canonical_bytes(&object)?;
    object.signature = Some(identity.sign(&unsigned_bytes));

    let signed_bytes = canonical::to_canonical_bytes(&object)?;
    object.id = Some(Cid::of(&signed_bytes));

    Ok(object)
}

/// A verification failure. `verify_content` reports every applicable
/// issue rather than stopping at the first (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentIssue {
    InvalidVersion,
    InvalidCid,
    InvalidAuthorDid,
    AuthorKeyNotFound,
    InvalidSignature,
    FutureTimestamp,
    Expired,
    InvalidPayloadHash,
}

/// Maps a DID to the signing public key it names. The default (no
/// resolver) only understands the `key` method, whose public key is
/// embedded in the DID itself; other methods require a resolver to be
/// supplied.
pub trait DidResolver {
    fn resolve_signing_key(&self, did: &Did) -> Option<[u8; 32]>;
}

fn resolve_signing_key(author: &Did, resolver: Option<&dyn DidResolver>) -> Option<[u8; 32]> {
    match resolver {
        Some(r) => r.resolve_signing_key(author),
        None if author.kind() == KeyKind::Ed25519 => Some(*author.public_key()),
        None => None,
    }
}

/// Verify a content object's version, CID, signature, and freshness.
pub fn verify_content(object: &ContentObject, resolver: Option<&dyn DidResolver>) -> Vec<ContentIssue> {
    let mut issues = Vec::new();

    if object.version != CONTENT_VERSION {
        issues.push(ContentIssue::InvalidVersion);
    }

    let mut without_id = object.clone();
    without_id.id = None;
    match canonical::to_canonical_bytes(&without_id) {
        Ok(bytes) => {
            let recomputed = Cid::of(&bytes);
            if object.id.as_ref() != Some(&recomputed) {
                issues.push(ContentIssue::InvalidCid);
            }
        }
        Err(_) => issues.push(ContentIssue::InvalidCid),
    }

    match resolve_signing_key(&object.author, resolver) {
        None => {
            if resolver.is_some() {
                issues.push(ContentIssue::AuthorKeyNotFound);
            } else {
                issues.push(ContentIssue::InvalidAuthorDid);
            }
        }
        Some(pub_key) => {
            let mut without_sig = object.clone();
            without_sig.id = None;
            without_sig.signature = None;
            let verifies = match (&object.signature, canonical::to_canonical_bytes(&without_sig)) {
                (Some(sig), Ok(bytes)) => signing::verify_hash(&pub_key, &bytes, sig),
                _ => false,
            };
            if !verifies {
                issues.push(ContentIssue::InvalidSignature);
            }
        }
    }

    let now = time::now_ms();
    if object.timestamp > now + time::FUTURE_TOLERANCE_MS {
        issues.push(ContentIssue::FutureTimestamp);
    }
    if let Some(expires_at) = object.expires_at {
        if expires_at < now {
            issues.push(ContentIssue::Expired);
        }
    }

    if object.payload_encryption == PayloadEncryptionKind::None {
        if let Payload::Clear { data } = &object.payload {
            if hash::hash(data) != object.payload_hash {
                issues.push(ContentIssue::InvalidPayloadHash);
            }
        }
    }

    issues
}

/// Decrypt a content object's payload under `identity`'s encryption key.
pub fn decrypt_content(object: &ContentObject, identity: &Identity) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let aad = build_aad(object.version, &object.author, &object.content_type);

    match &object.payload {
        Payload::Clear { data } => Ok(Zeroizing::new(data.clone())),
        Payload::SelfSealed { ephemeral_public, ciphertext } => {
            let shared = dh::agree(identity.key_set.encryption.secret_bytes(), ephemeral_public);
            let key = kdf::derive_32(shared.as_bytes(), None, info::SEALED_BOX)?;
            aead::decrypt(&key, ciphertext, &aad)
        }
        Payload::Recipients { ephemeral_public, recipients, ciphertext } => {
            let my_pub = identity.key_set.encryption.public_bytes();
            let matched = ct::find_constant_time(recipients, &my_pub, |entry| &entry.recipient_public_key[..]);
            let entry = recipients.get(matched.ok_or(CryptoError::NotRecipient)?).expect("index from find_constant_time is in range");

            let shared = dh::agree(identity.key_set.encryption.secret_bytes(), ephemeral_public);
            let mut wrap_key = kdf::derive_32(shared.as_bytes(), None, info::MULTI_RECIPIENT_WRAP)?;
            let content_key = aead::decrypt(&wrap_key, &entry.encrypted_key, &aad)?;
            wrap_key.zeroize();
            let content_key = <[u8; 32]>::try_from(content_key.as_slice())
                .map_err(|_| CryptoError::input("unwrapped content key is not 32 bytes"))?;

            aead::decrypt(&content_key, ciphertext, &aad)
        }
        Payload::Zone { .. } => Err(CryptoError::protocol("zone key required")),
    }
}

/// Decrypt (if needed) and interpret a content object's payload as UTF-8
/// text.
pub fn read_text(object: &ContentObject, identity: Option<&Identity>) -> Result<String, CryptoError> {
    let bytes: Zeroizing<Vec<u8>> = match &object.payload {
        Payload::Clear { data } => Zeroizing::new(data.clone()),
        _ => {
            let identity = identity.ok_or_else(|| CryptoError::protocol("identity required to decrypt payload"))?;
            decrypt_content(object, identity)?
        }
    };
    String::from_utf8(bytes.to_vec()).map_err(|_| CryptoError::input("payload is not valid UTF-8"))
}
