//! Decompiles compiled Xian contracts back to readable source.
//!
//! The contract compiler mangles names (`__balances`), turns the constructor into `____`,
//! wraps float literals in `decimal("…")` and fills in ORM keywords. This crate parses the
//! compiled source, undoes those rewrites and prints it again.

/// Error types for the decompiler module
mod error;

mod core;
mod interfaces;
mod ir;

// re-export the public interface
pub use core::{
    decompile, decompile_contract, decompile_strict, decompile_target, ContractSourceFetcher,
    DecompileResult,
};
pub use error::{Error, ParseError};
pub use interfaces::{DecompilerArgs, DecompilerArgsBuilder};
pub use ir::{parse_source, types as syntax};
