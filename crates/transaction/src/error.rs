#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Schema error at {path}: {reason}")]
    Schema { path: String, reason: String },
    #[error("Invalid payload: {}", .0.join("; "))]
    InvalidPayload(Vec<String>),
    #[error("Non-canonical input: {0}")]
    NonCanonical(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Signature error: {0}")]
    Signature(String),
    #[error("Key error: {0}")]
    Key(String),
    #[error("Encryption error: {0}")]
    Crypto(String),
    #[error("Internal error: {0}")]
    Eyre(#[from] eyre::Report),
}
