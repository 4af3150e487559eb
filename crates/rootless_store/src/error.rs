use thiserror::Error;

/// Errors surfaced by a `StateStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] rootless_crypto::error::CryptoError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
