use std::fmt;

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use xian_common::utils::strings::{decode_hex, encode_hex, is_hex_key};

use crate::error::Error;

/// Something that can sign messages on behalf of a public key.
pub trait Signer {
    /// The public key that verifies this signer's signatures, as lowercase hex.
    fn public_key_hex(&self) -> String;

    /// Signs `message`, returning the raw signature bytes.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Something that can check a signature against a public key.
pub trait Verifier {
    /// Returns `true` if `signature_hex` is a valid signature of `message` by `public_key_hex`.
    /// Malformed keys or signatures are simply invalid.
    fn verify(&self, public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool;
}

/// An ed25519 key pair.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Generates a wallet from a fresh random seed.
    pub fn new() -> Self {
        let seed: [u8; 32] = rand::random();
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    /// Restores a wallet from its 32 byte seed, as 64 hex characters.
    pub fn from_private_key(private_key: &str) -> Result<Self, Error> {
        let bytes = decode_hex(private_key)
            .map_err(|e| Error::Key(format!("private key is not hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| Error::Key(format!("private key is {} bytes, not 32", b.len())))?;

        Ok(Self { signing_key: SigningKey::from_bytes(&seed) })
    }

    /// Returns `true` if `key` looks like a public or private key: 64 hex characters.
    pub fn is_valid_key(key: &str) -> bool {
        is_hex_key(key)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The private seed, as lowercase hex.
    pub fn private_key(&self) -> String {
        encode_hex(&self.signing_key.to_bytes())
    }

    /// The public key, as lowercase hex. This is the wallet's address.
    pub fn public_key(&self) -> String {
        encode_hex(self.signing_key.verifying_key().as_bytes())
    }

    /// Signs `message` and returns the signature as lowercase hex.
    pub fn sign_msg(&self, message: &[u8]) -> String {
        encode_hex(&Signer::sign(self, message))
    }

    /// Checks a hex signature of `message` against this wallet's public key.
    pub fn verify_msg(&self, message: &[u8], signature_hex: &str) -> bool {
        Ed25519Verifier.verify(&self.public_key(), message, signature_hex)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("public_key", &self.public_key()).finish_non_exhaustive()
    }
}

impl Signer for Wallet {
    fn public_key_hex(&self) -> String {
        self.public_key()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        ed25519_dalek::Signer::sign(&self.signing_key, message).to_bytes().to_vec()
    }
}

/// Verifies ed25519 signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Verifier for Ed25519Verifier {
    fn verify(&self, public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
        let Some(public_key) = decode_hex(public_key_hex)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .and_then(|bytes| VerifyingKey::from_bytes(&bytes).ok())
        else {
            return false;
        };
        let Some(signature) = decode_hex(signature_hex)
            .ok()
            .and_then(|bytes| <[u8; 64]>::try_from(bytes).ok())
            .map(|bytes| Signature::from_bytes(&bytes))
        else {
            return false;
        };

        public_key.verify_strict(message, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8032, test 1
    const SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const SIGNATURE: &str = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155\
                             5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b";

    #[test]
    fn test_known_key_pair() {
        let wallet = Wallet::from_private_key(SEED).expect("seed should load");
        assert_eq!(wallet.public_key(), PUBLIC);
        assert_eq!(wallet.private_key(), SEED);
        assert_eq!(wallet.sign_msg(b""), SIGNATURE);
    }

    #[test]
    fn test_sign_and_verify() {
        let wallet = Wallet::new();
        let signature = wallet.sign_msg(b"hello");

        assert!(wallet.verify_msg(b"hello", &signature));
        assert!(!wallet.verify_msg(b"hello!", &signature));
        assert!(Ed25519Verifier.verify(&wallet.public_key(), b"hello", &signature));
        assert!(!Ed25519Verifier.verify(&Wallet::new().public_key(), b"hello", &signature));
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let wallet = Wallet::new();
        let signature = wallet.sign_msg(b"m");

        assert!(!Ed25519Verifier.verify("zz", b"m", &signature));
        assert!(!Ed25519Verifier.verify(&wallet.public_key(), b"m", "abcd"));
        assert!(!Ed25519Verifier.verify(&wallet.public_key()[..62], b"m", &signature));
    }

    #[test]
    fn test_from_private_key_rejects_bad_seeds() {
        assert!(matches!(Wallet::from_private_key("abc"), Err(Error::Key(_))));
        assert!(matches!(Wallet::from_private_key("abcd"), Err(Error::Key(_))));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(Wallet::is_valid_key(SEED));
        assert!(Wallet::is_valid_key(&PUBLIC.to_uppercase()));
        assert!(Wallet::is_valid_key(&Wallet::new().private_key()));
        assert!(!Wallet::is_valid_key(&PUBLIC[..62]));
        assert!(!Wallet::is_valid_key(&format!("{}g", &PUBLIC[..63])));
        assert!(!Wallet::is_valid_key(""));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let wallet = Wallet::from_private_key(SEED).expect("seed should load");
        let debug = format!("{wallet:?}");
        assert!(debug.contains(PUBLIC));
        assert!(!debug.contains(SEED));
    }
}
