//! Authenticated messages between wallets.
//!
//! Both ed25519 keys are mapped onto curve25519 and the message is sealed in a NaCl box
//! (X25519, XSalsa20 and Poly1305). The box key is shared by the two parties, so the sender can
//! read back what it sent and the receiver can tell who sent it. A sealed message is the
//! 24 byte nonce followed by the ciphertext, as lowercase hex.

use crypto_box::{
    aead::{generic_array::GenericArray, Aead},
    PublicKey, SalsaBox, SecretKey,
};
use ed25519_dalek::VerifyingKey;
use tracing::debug;
use xian_common::utils::strings::{decode_hex, encode_hex};

use crate::{error::Error, wallet::Wallet};

const NONCE_LENGTH: usize = 24;

/// Encrypts `message` from the holder of `sender_private_key` to the owner of
/// `receiver_public_key`.
pub fn encrypt(
    sender_private_key: &str,
    receiver_public_key: &str,
    message: &str,
) -> Result<String, Error> {
    let salsa_box = SalsaBox::new(
        &curve_public_key(receiver_public_key)?,
        &curve_secret_key(sender_private_key)?,
    );

    let nonce: [u8; NONCE_LENGTH] = rand::random();
    let ciphertext = salsa_box
        .encrypt(GenericArray::from_slice(&nonce), message.as_bytes())
        .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;
    debug!("sealed {} bytes for {}", message.len(), receiver_public_key);

    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(encode_hex(&sealed))
}

/// Decrypts a message addressed to the holder of `receiver_private_key`, checking that it
/// came from `sender_public_key`.
pub fn decrypt_as_receiver(
    sender_public_key: &str,
    receiver_private_key: &str,
    encrypted: &str,
) -> Result<String, Error> {
    let salsa_box = SalsaBox::new(
        &curve_public_key(sender_public_key)?,
        &curve_secret_key(receiver_private_key)?,
    );
    open(&salsa_box, encrypted)
}

/// Decrypts a message the holder of `sender_private_key` sent to `receiver_public_key`.
pub fn decrypt_as_sender(
    sender_private_key: &str,
    receiver_public_key: &str,
    encrypted: &str,
) -> Result<String, Error> {
    let salsa_box = SalsaBox::new(
        &curve_public_key(receiver_public_key)?,
        &curve_secret_key(sender_private_key)?,
    );
    open(&salsa_box, encrypted)
}

fn open(salsa_box: &SalsaBox, encrypted: &str) -> Result<String, Error> {
    let sealed = decode_hex(encrypted)
        .map_err(|e| Error::Crypto(format!("encrypted message is not hex: {e}")))?;
    if sealed.len() < NONCE_LENGTH {
        return Err(Error::Crypto(format!(
            "encrypted message is {} bytes, shorter than its nonce",
            sealed.len()
        )));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
    let plaintext = salsa_box
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Crypto("message could not be authenticated".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| Error::Crypto(format!("decrypted message is not utf-8: {e}")))
}

/// The curve25519 secret of an ed25519 seed: the clamped low half of the seed's SHA-512.
fn curve_secret_key(private_key: &str) -> Result<SecretKey, Error> {
    let wallet = Wallet::from_private_key(private_key)?;

    let mut scalar = wallet.signing_key().to_scalar_bytes();
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;

    Ok(SecretKey::from(scalar))
}

/// The curve25519 point birationally equivalent to an ed25519 public key.
fn curve_public_key(public_key: &str) -> Result<PublicKey, Error> {
    let bytes = decode_hex(public_key)
        .map_err(|e| Error::Key(format!("public key is not hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Key(format!("public key is {} bytes, not 32", b.len())))?;
    let key = VerifyingKey::from_bytes(&bytes)
        .map_err(|e| Error::Key(format!("public key is not a curve point: {e}")))?;

    Ok(PublicKey::from(key.to_montgomery().to_bytes()))
}
