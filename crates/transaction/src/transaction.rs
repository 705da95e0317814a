use std::time::Instant;

use tracing::{debug, info};
use xian_common::utils::strings::encode_hex;

use crate::{
    canonical::canonicalize,
    encode::{encode_for_signing, encode_with, Layout},
    error::Error,
    payload::TransactionPayload,
    validate::validate_payload,
    value::Value,
    wallet::{Signer, Verifier},
};

/// The metadata attached to a signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetadata {
    /// The signature over the payload's canonical encoding, as lowercase hex.
    pub signature: String,
}

/// A signed transaction, ready to be broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// What the transaction does.
    pub payload: TransactionPayload,
    /// The signature proving the sender authorized it.
    pub metadata: TransactionMetadata,
}

impl Transaction {
    /// The wire shape of the transaction, canonicalized:
    /// `{"metadata":{"signature":…},"payload":{…}}`.
    pub fn to_value(&self) -> Result<Value, Error> {
        canonicalize(&Value::map([
            ("payload", self.payload.to_value()),
            (
                "metadata",
                Value::map([("signature", Value::from(self.metadata.signature.as_str()))]),
            ),
        ]))
    }

    /// The JSON of the wire shape, as it is broadcast. Laid out like the signed payload, except
    /// that integers beyond 64 bits are wrapped as `__big_int__` so they read back exactly.
    pub fn to_json(&self) -> Result<String, Error> {
        encode_with(&self.to_value()?, Layout::Wire)
    }

    /// Reads a transaction from its wire JSON. The payload is validated; the signature is not
    /// checked, see [`verify_transaction`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let value = Value::from(serde_json::from_str::<serde_json::Value>(json)?);

        let payload = value
            .get("payload")
            .ok_or_else(|| Error::InvalidPayload(vec!["payload: missing field".to_string()]))?;
        let signature = value
            .get("metadata")
            .and_then(|metadata| metadata.get("signature"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Signature("metadata.signature is missing".to_string()))?;

        Ok(Transaction {
            payload: TransactionPayload::try_from(payload)?,
            metadata: TransactionMetadata { signature: signature.to_string() },
        })
    }
}

/// Signs a payload: canonicalize, validate, encode, sign.
///
/// Fails with [`Error::InvalidPayload`] if the payload breaks the schema, and with
/// [`Error::Signature`] if the payload's sender isn't the signer's public key.
pub fn create_transaction<S: Signer + ?Sized>(
    payload: &TransactionPayload,
    signer: &S,
) -> Result<Transaction, Error> {
    let start_time = Instant::now();

    let public_key = signer.public_key_hex();
    if !payload.sender.eq_ignore_ascii_case(&public_key) {
        return Err(Error::Signature(format!(
            "payload sender '{}' is not the signing key '{}'",
            payload.sender, public_key
        )));
    }

    let canonical = canonicalize(&payload.to_value())?;
    validate_payload(&canonical)?;
    let message = encode_for_signing(&canonical)?;
    debug!("encoding payload took {:?}", start_time.elapsed());

    let signature = encode_hex(&signer.sign(&message));
    info!(
        "signed {}.{} (nonce {}) in {:?}",
        payload.contract,
        payload.function,
        payload.nonce,
        start_time.elapsed()
    );

    Ok(Transaction { payload: payload.clone(), metadata: TransactionMetadata { signature } })
}

/// Checks that a transaction's signature was made by its payload's sender over the payload's
/// canonical encoding.
pub fn verify_transaction<V: Verifier + ?Sized>(
    transaction: &Transaction,
    verifier: &V,
) -> Result<bool, Error> {
    let canonical = canonicalize(&transaction.payload.to_value())?;
    let message = encode_for_signing(&canonical)?;

    let valid =
        verifier.verify(&transaction.payload.sender, &message, &transaction.metadata.signature);
    debug!(
        "signature by {} is {}",
        transaction.payload.sender,
        if valid { "valid" } else { "invalid" }
    );

    Ok(valid)
}
