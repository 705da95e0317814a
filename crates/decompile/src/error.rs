use std::fmt;

/// A failure to tokenize or parse contract source, with the 1-based position it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

/// Errors of the decompile operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source could not be parsed. Only returned by the strict operations.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// The source parsed, but its rewrite has no spelling the contract runtime accepts.
    #[error("Unprintable source: {0}")]
    Unprintable(String),
    /// The source is larger than the configured limit.
    #[error("Source too large: {size} bytes exceeds the limit of {limit} bytes")]
    SourceTooLarge {
        /// size of the source, in bytes
        size: usize,
        /// the configured limit, in bytes
        limit: usize,
    },
    /// The source could not be read or fetched.
    #[error("Fetch error: {0}")]
    FetchError(String),
    /// Generic internal error
    #[error("Internal error: {0}")]
    Eyre(#[from] eyre::Report),
}
