#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Generic(String),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Decompile error: {0}")]
    DecompileError(#[from] xian_core::xian_decompiler::Error),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] xian_core::xian_transaction::Error),
}
