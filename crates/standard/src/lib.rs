//! Structural checks of Xian contracts against the token standards.
//!
//! A contract is parsed with the decompiler's parser and its declarations are compared with
//! what the standard requires. Violations are returned as messages; nothing here fails.

/// Error types for the standard module
mod error;

mod core;
mod interfaces;

// re-export the public interface
pub use core::{validate_target, validate_token_standard, TokenStandard};
pub use error::Error;
pub use interfaces::{StandardArgs, StandardArgsBuilder};
