//! Content Identifiers: self-describing, content-addressed names.
//!
//! `CID(bytes) = base32lower(0x01 || 0x55 || 0x1e || 0x20 || BLAKE3(bytes))`
//! — CIDv1, raw codec (`0x55`), BLAKE3 multihash (code `0x1e`, length 32).

use data_encoding::{Encoding, Specification};

use crate::ct;
use crate::error::CryptoError;
use crate::hash;

const CIDV1: u8 = 0x01;
const CODEC_RAW: u8 = 0x55;
const MULTIHASH_BLAKE3: u8 = 0x1e;
const MULTIHASH_LEN: u8 = 0x20;

fn base32_lower() -> Encoding {
    let mut spec = Specification::new();
    spec.symbols.push_str("abcdefghijklmnopqrstuvwxyz234567");
    spec.encoding().expect("static base32 spec is valid")
}

/// A CIDv1/raw/BLAKE3 content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Cid(String);

impl Cid {
    /// Compute the CID of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = hash::hash(bytes);
        let mut raw = Vec::with_capacity(4 + 32);
        raw.push(CIDV1);
        raw.push(CODEC_RAW);
        raw.push(MULTIHASH_BLAKE3);
        raw.push(MULTIHASH_LEN);
        raw.extend_from_slice(&digest);
        Self(base32_lower().encode(&raw))
    }

    /// Parse a CID's text form, validating that the decoded bytes have
    /// exactly the CIDv1/raw/BLAKE3 shape this protocol requires.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let raw = base32_lower()
            .decode(text.as_bytes())
            .map_err(|_| CryptoError::input("CID is not valid base32-lower"))?;
        if raw.len() != 36 {
            return Err(CryptoError::input("CID has the wrong decoded length"));
        }
        if raw[0] != CIDV1 || raw[1] != CODEC_RAW || raw[2] != MULTIHASH_BLAKE3 || raw[3] != MULTIHASH_LEN
        {
            return Err(CryptoError::input("CID is not CIDv1/raw/BLAKE3"));
        }
        Ok(Self(text.to_string()))
    }

    /// Recompute the CID of `bytes` and compare to `self` in constant time.
    pub fn verify(&self, bytes: &[u8]) -> bool {
        let recomputed = Self::of(bytes);
        ct::eq(recomputed.0.as_bytes(), self.0.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(Cid::of(b"hello"), Cid::of(b"hello"));
    }

    #[test]
    fn distinct_bytes_give_distinct_cids() {
        assert_ne!(Cid::of(b"hello"), Cid::of(b"hellp"));
    }

    #[test]
    fn roundtrips_through_text_form() {
        let cid = Cid::of(b"some content");
        let parsed = Cid::parse(cid.as_str()).unwrap();
        assert_eq!(cid, parsed);
        assert!(parsed.verify(b"some content"));
        assert!(!parsed.verify(b"other content"));
    }

    #[test]
    fn rejects_garbage_text() {
        assert!(Cid::parse("not a cid at all!!").is_err());
    }
}
