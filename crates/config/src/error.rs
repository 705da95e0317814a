//! Error types for the configuration module

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A generic error with a message
    #[error("Error: {0}")]
    Generic(String),

    /// An error that occurred during parsing
    #[error("Parse error: {0}")]
    ParseError(String),

    /// An attempt to read or update a key the configuration does not have
    #[error("invalid key: '{0}' is not a valid configuration key.")]
    InvalidKey(String),
}
