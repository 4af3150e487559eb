//! Decentralized Identifiers.
//!
//! `DID(pub, kind) = "did:rootless:key:" || base58btc(codec || 0x01 || pub)`
//! where `codec` is `0xed` for Ed25519 or `0xec` for X25519.

use crate::error::CryptoError;

const PREFIX: &str = "did:rootless:key:";
const CODEC_ED25519: u8 = 0xed;
const CODEC_X25519: u8 = 0xec;

/// Which key type a DID's embedded public key is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyKind {
    Ed25519,
    X25519,
}

impl KeyKind {
    fn codec(self) -> u8 {
        match self {
            KeyKind::Ed25519 => CODEC_ED25519,
            KeyKind::X25519 => CODEC_X25519,
        }
    }

    fn from_codec(codec: u8) -> Option<Self> {
        match codec {
            CODEC_ED25519 => Some(KeyKind::Ed25519),
            CODEC_X25519 => Some(KeyKind::X25519),
            _ => None,
        }
    }
}

/// A parsed/constructed `did:rootless:key:...` identifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    text: String,
    kind: KeyKind,
    public_key: [u8; 32],
}

impl Did {
    pub fn from_signing_key(public: &[u8; 32]) -> Self {
        Self::build(KeyKind::Ed25519, public)
    }

    pub fn from_encryption_key(public: &[u8; 32]) -> Self {
        Self::build(KeyKind::X25519, public)
    }

    fn build(kind: KeyKind, public: &[u8; 32]) -> Self {
        let mut raw = Vec::with_capacity(34);
        raw.push(kind.codec());
        raw.push(0x01);
        raw.extend_from_slice(public);
        let text = format!("{PREFIX}{}", bs58::encode(&raw).into_string());
        Self {
            text,
            kind,
            public_key: *public,
        }
    }

    /// Parse `did:rootless:key:<base58btc>`, validating the exact
    /// `method:method-specific-id` shape and the embedded codec byte.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 4 || parts[0] != "did" || parts[1] != "rootless" || parts[2] != "key" {
            return Err(CryptoError::input("malformed DID: expected did:rootless:key:<id>"));
        }
        let raw = bs58::decode(parts[3])
            .into_vec()
            .map_err(|_| CryptoError::input("DID method-specific-id is not valid base58btc"))?;
        if raw.len() != 34 {
            return Err(CryptoError::input("DID has the wrong decoded length"));
        }
        let kind = KeyKind::from_codec(raw[0])
            .ok_or_else(|| CryptoError::input("DID uses an unrecognised key codec"))?;
        if raw[1] != 0x01 {
            return Err(CryptoError::input("DID multicodec varint byte must be 0x01"));
        }
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&raw[2..]);
        Ok(Self {
            text: text.to_string(),
            kind,
            public_key,
        })
    }

    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl TryFrom<String> for Did {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Did::parse(&value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_signing_did() {
        let pub_key = [42u8; 32];
        let did = Did::from_signing_key(&pub_key);
        assert!(did.as_str().starts_with(PREFIX));
        let parsed = Did::parse(did.as_str()).unwrap();
        assert_eq!(parsed.kind(), KeyKind::Ed25519);
        assert_eq!(parsed.public_key(), &pub_key);
    }

    #[test]
    fn roundtrips_encryption_did() {
        let pub_key = [7u8; 32];
        let did = Did::from_encryption_key(&pub_key);
        let parsed = Did::parse(did.as_str()).unwrap();
        assert_eq!(parsed.kind(), KeyKind::X25519);
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert!(!Did::is_valid("did:rootless:abcdef"));
        assert!(!Did::is_valid("did:other:key:abcdef"));
    }

    #[test]
    fn rejects_bad_base58() {
        assert!(!Did::is_valid("did:rootless:key:not-base58!!!"));
    }
}
