//! Canonical payload encoding and transaction signing.
//!
//! A payload is canonicalized (maps sorted by key), validated against the fixed payload schema,
//! and encoded to the exact byte string that gets signed. Any compliant implementation must
//! produce the same bytes for the same logical payload, so the encoder's layout is protocol.

/// Error types for the transaction module
mod error;

mod canonical;
mod crypto;
mod encode;
mod payload;
mod transaction;
mod validate;
mod value;
mod wallet;

// re-export the public interface
pub use canonical::canonicalize;
pub use crypto::{decrypt_as_receiver, decrypt_as_sender, encrypt};
pub use encode::{encode, encode_compact, encode_for_signing};
pub use error::Error;
pub use payload::{TransactionPayload, TransactionPayloadBuilder, PAYLOAD_FIELDS};
pub use transaction::{create_transaction, verify_transaction, Transaction, TransactionMetadata};
pub use validate::{check_format_of_payload, payload_violations, validate_payload};
pub use value::{Key, Value};
pub use wallet::{Ed25519Verifier, Signer, Verifier, Wallet};
