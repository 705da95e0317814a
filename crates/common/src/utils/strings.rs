use eyre::{bail, eyre, Result};
use std::fmt::Write;

use crate::constants::{IDENTIFIER_REGEX, KEY_HEX_LENGTH};

/// Decodes a hex string into a vector of bytes
///
/// ```
/// use xian_common::utils::strings::decode_hex;
///
/// let hex = "48656c6c6f20576f726c64"; // "Hello World" in hex
/// let result = decode_hex(hex).expect("should decode hex");
/// assert_eq!(result, vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100]);
/// ```
pub fn decode_hex(mut s: &str) -> Result<Vec<u8>> {
    // normalize
    s = s.trim().trim_start_matches("0x");

    if s.is_empty() {
        return Ok(vec![]);
    }
    if s.len() % 2 != 0 || !s.is_ascii() {
        bail!("invalid hex string: {}", s);
    }

    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| eyre!("invalid hex string: {}", s))
}

/// Encodes a vector of bytes into a lowercase hex string
///
/// ```
/// use xian_common::utils::strings::encode_hex;
///
/// let bytes = vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100];
/// let result = encode_hex(&bytes);
/// assert_eq!(result, "48656c6c6f20576f726c64");
/// ```
pub fn encode_hex(s: &[u8]) -> String {
    s.iter().fold(String::with_capacity(s.len() * 2), |mut acc, b| {
        write!(acc, "{b:02x}").expect("unable to write");
        acc
    })
}

/// Checks whether a string is a valid contract identifier: an ASCII letter
/// followed by letters, digits, or underscores.
///
/// ```
/// use xian_common::utils::strings::is_identifier;
///
/// assert!(is_identifier("con_token"));
/// assert!(!is_identifier("123bad"));
/// assert!(!is_identifier("_private"));
/// ```
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER_REGEX.is_match(s).unwrap_or(false)
}

/// Checks whether a string is a 64 character hex key.
///
/// ```
/// use xian_common::utils::strings::is_hex_key;
///
/// assert!(is_hex_key(&"a".repeat(64)));
/// assert!(!is_hex_key(&"g".repeat(64)));
/// assert!(!is_hex_key("abcd"));
/// ```
pub fn is_hex_key(s: &str) -> bool {
    s.len() == KEY_HEX_LENGTH && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// An extension trait for [`String`] and [`str`].
pub trait StringExt {
    /// Truncates a string to a maximum length, adding an ellipsis if necessary.
    ///
    /// # Arguments
    ///
    /// * `max_length` - The maximum length of the returned string, in characters
    ///
    /// # Returns
    ///
    /// * `String` - The truncated string with ellipsis if needed
    fn truncate(&self, max_length: usize) -> String;
}

/// Truncates a string to a maximum length, adding an ellipsis ("...") if the string is truncated.
/// Note: the ellipsis *is* counted towards the maximum length.
///
/// ```
/// use xian_common::utils::strings::StringExt;
///
/// let s = "Hello, world!";
/// let result = s.truncate(11);
/// assert_eq!(result, "Hell...rld!");
/// ```
impl StringExt for str {
    fn truncate(&self, max_length: usize) -> String {
        let length = self.chars().count();
        if length <= max_length || max_length < 8 {
            return self.to_string();
        }

        let head = self.chars().take(max_length - 7).collect::<String>();
        let tail = self.chars().skip(length - 4).collect::<String>();
        head + "..." + &tail
    }
}

impl StringExt for String {
    fn truncate(&self, max_length: usize) -> String {
        self.as_str().truncate(max_length)
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::strings::*;

    #[test]
    fn test_decode_hex() {
        let hex = "48656c6c6f20776f726c64"; // "Hello world"
        let result = decode_hex(hex).expect("should decode hex");
        assert_eq!(result, vec![72, 101, 108, 108, 111, 32, 119, 111, 114, 108, 100]);

        let hex = "0xabcdef";
        let result = decode_hex(hex).expect("should decode hex");
        assert_eq!(result, vec![171, 205, 239]);

        let hex = "012345";
        let result = decode_hex(hex).expect("should decode hex");
        assert_eq!(result, vec![1, 35, 69]);
    }

    #[test]
    fn test_decode_hex_invalid() {
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
        assert!(decode_hex("éé").is_err());
    }

    #[test]
    fn test_encode_hex() {
        let bytes = vec![72, 101, 108, 108, 111, 32, 119, 111, 114, 108, 100]; // "Hello world"
        let result = encode_hex(&bytes);
        assert_eq!(result, "48656c6c6f20776f726c64");

        let bytes = vec![171, 205, 239];
        let result = encode_hex(&bytes);
        assert_eq!(result, "abcdef");

        assert_eq!(encode_hex(&[]), "");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("currency"));
        assert!(is_identifier("transfer_from"));
        assert!(is_identifier("A1_b2"));

        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("with space"));
        assert!(!is_identifier("dash-ed"));
        assert!(!is_identifier("trailing\n"));
    }

    #[test]
    fn test_is_hex_key() {
        assert!(is_hex_key(&"0123456789abcdef".repeat(4)));
        assert!(is_hex_key(&"ABCDEF0123456789".repeat(4)));

        assert!(!is_hex_key(&"a".repeat(63)));
        assert!(!is_hex_key(&"a".repeat(65)));
        assert!(!is_hex_key(&format!("{}g", "a".repeat(63))));
    }

    #[test]
    fn test_truncate() {
        let s = String::from("Hello, world!");
        assert_eq!(s.truncate(11), "Hell...rld!");
        assert_eq!(s.truncate(64), "Hello, world!");

        let s = "äöüäöüäöüäöüäöü";
        assert_eq!(s.truncate(11).chars().count(), 11);
    }
}
