/// Errors of the standard module. Only reading a target can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic internal error
    #[error("Internal error: {0}")]
    Eyre(#[from] eyre::Report),
}
