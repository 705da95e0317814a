use derive_builder::Builder;

use crate::{
    error::Error,
    validate::validate_payload,
    value::{Key, Value},
};

/// The seven payload fields, in canonical order.
pub const PAYLOAD_FIELDS: [&str; 7] =
    ["chain_id", "contract", "function", "kwargs", "nonce", "sender", "stamps_supplied"];

/// The payload of a transaction: which function of which contract to call, with what arguments,
/// on behalf of whom.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct TransactionPayload {
    /// The network the transaction is meant for.
    pub chain_id: String,

    /// The contract to call.
    pub contract: String,

    /// The function of `contract` to call.
    pub function: String,

    /// The keyword arguments of the call. Order is irrelevant; canonicalization sorts them.
    #[builder(default)]
    pub kwargs: Vec<(String, Value)>,

    /// The sender's next unused nonce.
    pub nonce: u64,

    /// The sender's public key, as 64 hex characters.
    pub sender: String,

    /// The most stamps the sender is willing to spend.
    pub stamps_supplied: u64,
}

impl TransactionPayloadBuilder {
    /// Appends a single keyword argument.
    pub fn kwarg(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.kwargs.get_or_insert_with(Vec::new).push((name.into(), value.into()));
        self
    }
}

impl TransactionPayload {
    /// Converts the payload into a [`Value`] map, in field order. The result still has to be
    /// canonicalized before it is encoded.
    pub fn to_value(&self) -> Value {
        Value::map([
            ("chain_id", Value::from(self.chain_id.as_str())),
            ("contract", Value::from(self.contract.as_str())),
            ("function", Value::from(self.function.as_str())),
            (
                "kwargs",
                Value::Map(
                    self.kwargs.iter().map(|(k, v)| (Key::Str(k.clone()), v.clone())).collect(),
                ),
            ),
            ("nonce", Value::from(self.nonce)),
            ("sender", Value::from(self.sender.as_str())),
            ("stamps_supplied", Value::from(self.stamps_supplied)),
        ])
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidPayload(vec![reason])
}

fn string_field(value: &Value, field: &str) -> Result<String, Error> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{field}: expected a string")))
}

fn counter_field(value: &Value, field: &str) -> Result<u64, Error> {
    let raw = value
        .get(field)
        .and_then(Value::as_int)
        .ok_or_else(|| invalid(format!("{field}: expected a non-negative integer")))?;

    u64::try_from(raw).map_err(|_| invalid(format!("{field}: {raw} does not fit in 64 bits")))
}

/// Reads a typed payload out of a payload map, validating it first.
impl TryFrom<&Value> for TransactionPayload {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        validate_payload(value)?;

        let kwargs = value
            .get("kwargs")
            .and_then(Value::as_map)
            .ok_or_else(|| invalid("kwargs: expected a mapping".to_string()))?
            .iter()
            .map(|(k, v)| {
                k.as_str()
                    .map(|k| (k.to_string(), v.clone()))
                    .ok_or_else(|| invalid(format!("kwargs: non-string key {k}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransactionPayload {
            chain_id: string_field(value, "chain_id")?,
            contract: string_field(value, "contract")?,
            function: string_field(value, "function")?,
            kwargs,
            nonce: counter_field(value, "nonce")?,
            sender: string_field(value, "sender")?,
            stamps_supplied: counter_field(value, "stamps_supplied")?,
        })
    }
}
