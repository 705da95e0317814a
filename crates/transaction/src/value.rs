use std::fmt::{self, Display};

use xian_common::utils::strings::decode_hex;

/// The marker key wrapping integers that don't fit the signed 64-bit range.
pub(crate) const BIG_INT_MARKER: &str = "__big_int__";
/// The marker key wrapping fixed-point decimals.
pub(crate) const FIXED_MARKER: &str = "__fixed__";
/// The marker key wrapping raw bytes.
pub(crate) const BYTES_MARKER: &str = "__bytes__";

/// A mapping key.
///
/// Only [`Key::Str`] survives canonicalization; the other variants exist so that structures
/// built in memory can carry the keys the canonicalizer rejects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Str(String),
    Int(i128),
    Bool(bool),
    Null,
}

impl Key {
    /// Returns the key as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "'{s}'"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Bool(b) => write!(f, "{b}"),
            Key::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

/// A structured value, as carried by transaction payloads and their keyword arguments.
///
/// [`Value::Map`] keeps insertion order until it is canonicalized.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    /// A fixed-point decimal, carried as its decimal string.
    Fixed(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Key, Value)>),
}

impl Value {
    /// Builds a map with string keys from `(key, value)` pairs, keeping their order.
    ///
    /// ```
    /// use xian_transaction::Value;
    ///
    /// let map = Value::map([("to", Value::from("bob")), ("amount", Value::from(10))]);
    /// assert_eq!(map.get("amount"), Some(&Value::Int(10)));
    /// ```
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (Key::Str(k.into()), v)).collect())
    }

    /// Looks up a string key in a map. Returns `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the entries of a map, if the value is one.
    pub fn as_map(&self) -> Option<&[(Key, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// A short name for the kind of value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Fixed(_) => "fixed",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i128)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i as i128)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i128)
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Converts decoded JSON, recognizing the `__big_int__`, `__fixed__` and `__bytes__` wrappers the
/// encoder produces. A wrapper whose content doesn't decode is kept as a plain map.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i as i128)
                } else if let Some(u) = n.as_u64() {
                    Value::Int(u as i128)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(object) => {
                if object.len() == 1 {
                    if let Some(unwrapped) = unwrap_marker(&object) {
                        return unwrapped;
                    }
                }
                Value::Map(object.into_iter().map(|(k, v)| (Key::Str(k), Value::from(v))).collect())
            }
        }
    }
}

fn unwrap_marker(object: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    let (key, inner) = object.iter().next()?;
    let inner = inner.as_str()?;

    match key.as_str() {
        BIG_INT_MARKER => inner.parse::<i128>().ok().map(Value::Int),
        FIXED_MARKER => Some(Value::Fixed(inner.to_string())),
        BYTES_MARKER => decode_hex(inner).ok().map(Value::Bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_object_order() {
        let value = Value::from(json!({"b": 1, "a": [true, null, "x"]}));
        let entries = value.as_map().expect("should be a map");

        // serde_json sorts object keys when preserve_order is off
        assert_eq!(entries.len(), 2);
        assert_eq!(value.get("a"), Some(&Value::List(vec![true.into(), Value::Null, "x".into()])));
        assert_eq!(value.get("b"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from(json!(-5)), Value::Int(-5));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Int(u64::MAX as i128));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_from_json_unwraps_markers() {
        assert_eq!(
            Value::from(json!({"__big_int__": "170141183460469231731687303715884105727"})),
            Value::Int(i128::MAX)
        );
        assert_eq!(Value::from(json!({"__fixed__": "1.50"})), Value::Fixed("1.50".to_string()));
        assert_eq!(Value::from(json!({"__bytes__": "00ff"})), Value::Bytes(vec![0x00, 0xff]));
    }

    #[test]
    fn test_from_json_keeps_bad_markers_as_maps() {
        let value = Value::from(json!({"__bytes__": "zz"}));
        assert_eq!(value.get("__bytes__"), Some(&Value::Str("zz".to_string())));

        let value = Value::from(json!({"__fixed__": "1", "other": 2}));
        assert_eq!(value.as_map().map(|m| m.len()), Some(2));
    }

    #[test]
    fn test_get_on_non_map() {
        assert_eq!(Value::Int(1).get("a"), None);
        assert_eq!(Value::map([("a", Value::Null)]).get("b"), None);
    }
}
