use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("wire validation failed: {0}")]
    Validation(String),
}

impl ProtoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
