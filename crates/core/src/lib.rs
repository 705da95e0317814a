//! The Core module serves as the central integration point for the Xian client toolkit,
//! giving access to transaction building and signing, contract decompiling and token standard
//! checks.
//!
//! This module re-exports the public interfaces of all the tool-specific crates,
//! making it easier to use them in other projects.

// Re-export all tool-specific modules
pub use xian_decompiler;
pub use xian_standard;
pub use xian_transaction;
