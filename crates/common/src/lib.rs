//! Common utilities and constants used across the xian toolkit.
//!
//! This crate provides shared functionality for the xian crates: identifier
//! and key-format checks, hex helpers, and file input/output.

/// Constants used throughout the xian codebase.
pub mod constants;

/// General utility functions and types for common tasks.
pub mod utils;
