use thiserror::Error;

/// Unified error type for `rootless_crypto`.
///
/// Variants map directly onto the error kinds of the protocol design: wrong
/// lengths and unparsable identifiers are `InputValidation`; AEAD/signature/
/// password failures are `Authentication`; structural protocol violations
/// (wrong version, unknown prekey id, ratchet not ready) are `Protocol`;
/// clock-related rejections are `Freshness`; a multi-recipient payload with
/// no matching entry is `NotRecipient`.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("freshness check failed: {0}")]
    Freshness(String),

    #[error("no recipient entry matches this identity")]
    NotRecipient,

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl CryptoError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn freshness(msg: impl Into<String>) -> Self {
        Self::Freshness(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }
}
