/// Input/output utilities for file manipulation.
pub mod io;

/// String manipulation, hex, and format-checking utilities.
pub mod strings;
