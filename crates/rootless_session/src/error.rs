use thiserror::Error;

/// Errors surfaced by `SessionManager`. Wraps the three lower layers it
/// composes plus the handful of violations that only make sense at the
/// conversation level (unknown conversation, wrong message kind).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("crypto error: {0}")]
    Crypto(#[from] rootless_crypto::error::CryptoError),

    #[error("protocol error: {0}")]
    Proto(#[from] rootless_proto::error::ProtoError),

    #[error("store error: {0}")]
    Store(#[from] rootless_store::error::StoreError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("no conversation with id {0}")]
    UnknownConversation(String),

    #[error("message has expired")]
    MessageExpired,
}
