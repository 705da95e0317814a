use fancy_regex::Regex;
use lazy_static::lazy_static;

/// The number of hex characters in a serialized ed25519 public or private key.
pub const KEY_HEX_LENGTH: usize = 64;

/// The prefix the contract compiler adds to private and storage names.
pub const MANGLE_PREFIX: &str = "__";

/// The name the contract compiler gives to the constructor function.
pub const CONSTRUCTOR_MARKER: &str = "____";

lazy_static! {
    /// The shape of contract names, function names, and kwargs keys.
    pub static ref IDENTIFIER_REGEX: Regex =
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("invalid identifier regex");
}
