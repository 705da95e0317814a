use crate::{
    error::Error,
    value::{Key, Value},
};

/// Normalizes a value into its canonical form: every map, at any depth, is sorted by ascending
/// key, and lists keep their order with their elements canonicalized in place. Scalars pass
/// through unchanged.
///
/// Fails with [`Error::Schema`] if any map has a non-string or duplicated key.
///
/// ```
/// use xian_transaction::{canonicalize, Key, Value};
///
/// let value = Value::map([("b", Value::from(1)), ("a", Value::from(2))]);
/// let canonical = canonicalize(&value).expect("string keys canonicalize");
///
/// let keys: Vec<_> = canonical.as_map().unwrap().iter().map(|(k, _)| k.clone()).collect();
/// assert_eq!(keys, vec![Key::from("a"), Key::from("b")]);
/// ```
pub fn canonicalize(value: &Value) -> Result<Value, Error> {
    canonicalize_at(value, "$")
}

fn canonicalize_at(value: &Value, path: &str) -> Result<Value, Error> {
    match value {
        Value::Map(entries) => {
            let mut sorted = Vec::with_capacity(entries.len());
            for (key, inner) in entries {
                let name = match key {
                    Key::Str(name) => name,
                    other => {
                        return Err(Error::Schema {
                            path: path.to_string(),
                            reason: format!("non-string key {other} is not allowed"),
                        })
                    }
                };
                sorted.push((name.clone(), canonicalize_at(inner, &format!("{path}.{name}"))?));
            }

            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            if let Some(pair) = sorted.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(Error::Schema {
                    path: path.to_string(),
                    reason: format!("duplicate key '{}'", pair[0].0),
                });
            }

            Ok(Value::Map(sorted.into_iter().map(|(k, v)| (Key::Str(k), v)).collect()))
        }
        Value::List(items) => Ok(Value::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| canonicalize_at(item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        scalar => Ok(scalar.clone()),
    }
}

/// Returns `true` if every map in `value` has string keys in strictly ascending order.
pub(crate) fn is_canonical(value: &Value) -> bool {
    match value {
        Value::Map(entries) => {
            entries.iter().all(|(k, v)| matches!(k, Key::Str(_)) && is_canonical(v)) &&
                entries.windows(2).all(|pair| pair[0].0 < pair[1].0)
        }
        Value::List(items) => items.iter().all(is_canonical),
        _ => true,
    }
}
