use tracing::debug;
use xian_common::utils::strings::{is_hex_key, is_identifier};

use crate::{error::Error, payload::PAYLOAD_FIELDS, value::Value};

/// A per-field predicate. Returns a description of the problem, if any.
type Rule = fn(&Value) -> Option<String>;

fn rule_for(field: &str) -> Option<Rule> {
    Some(match field {
        "sender" => sender_rule,
        "nonce" | "stamps_supplied" => non_negative_int_rule,
        "contract" | "function" => identifier_rule,
        "kwargs" => kwargs_rule,
        "chain_id" => string_rule,
        _ => return None,
    })
}

fn sender_rule(value: &Value) -> Option<String> {
    match value.as_str() {
        Some(s) if is_hex_key(s) => None,
        _ => Some("expected 64 hex characters".to_string()),
    }
}

fn non_negative_int_rule(value: &Value) -> Option<String> {
    match value {
        Value::Int(i) if *i >= 0 => None,
        Value::Int(i) => Some(format!("{i} is negative")),
        other => Some(format!("expected a non-negative integer, found {}", other.kind())),
    }
}

fn identifier_rule(value: &Value) -> Option<String> {
    match value.as_str() {
        Some(s) if is_identifier(s) => None,
        Some(s) => Some(format!("'{s}' is not a valid identifier")),
        None => Some(format!("expected an identifier, found {}", value.kind())),
    }
}

fn kwargs_rule(value: &Value) -> Option<String> {
    let Some(entries) = value.as_map() else {
        return Some(format!("expected a mapping, found {}", value.kind()));
    };

    let bad = entries
        .iter()
        .filter(|(key, _)| !key.as_str().is_some_and(is_identifier))
        .map(|(key, _)| key.to_string())
        .collect::<Vec<_>>();

    if bad.is_empty() {
        None
    } else {
        Some(format!("keys {} are not valid identifiers", bad.join(", ")))
    }
}

fn string_rule(value: &Value) -> Option<String> {
    match value {
        Value::Str(_) => None,
        other => Some(format!("expected a string, found {}", other.kind())),
    }
}

/// Applies a rule to a value. Sequences have the rule applied to each element.
fn apply_rule(rule: Rule, value: &Value, path: &str, violations: &mut Vec<String>) {
    match value {
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                apply_rule(rule, item, &format!("{path}[{i}]"), violations);
            }
        }
        _ => {
            if let Some(reason) = rule(value) {
                violations.push(format!("{path}: {reason}"));
            }
        }
    }
}

/// Checks a payload against the payload schema and returns every violation found.
///
/// The payload must be a mapping with exactly the seven payload fields, each satisfying its
/// rule: `sender` is 64 hex characters, `nonce` and `stamps_supplied` are non-negative integers,
/// `contract` and `function` are identifiers, every `kwargs` key is an identifier, and
/// `chain_id` is a string.
pub fn payload_violations(payload: &Value) -> Vec<String> {
    let Some(entries) = payload.as_map() else {
        return vec![format!("payload: expected a mapping, found {}", payload.kind())];
    };

    let mut violations = Vec::new();

    for field in PAYLOAD_FIELDS {
        if payload.get(field).is_none() {
            violations.push(format!("{field}: missing field"));
        }
    }

    for (key, value) in entries {
        match key.as_str().and_then(|name| rule_for(name).map(|rule| (name, rule))) {
            Some((name, rule)) => apply_rule(rule, value, name, &mut violations),
            None => violations.push(format!("{key}: unexpected field")),
        }
    }

    violations
}

/// Validates a payload, failing with [`Error::InvalidPayload`] carrying every violation.
///
/// ```
/// use xian_transaction::{validate_payload, Error, Value};
///
/// let payload = Value::map([("sender", Value::from("not a key"))]);
/// match validate_payload(&payload) {
///     Err(Error::InvalidPayload(violations)) => assert!(violations.len() > 1),
///     _ => panic!("payload should be rejected"),
/// }
/// ```
pub fn validate_payload(payload: &Value) -> Result<(), Error> {
    let violations = payload_violations(payload);

    if violations.is_empty() {
        return Ok(());
    }

    debug!("payload has {} violation(s): {:?}", violations.len(), violations);
    Err(Error::InvalidPayload(violations))
}

/// Returns `true` if the payload satisfies the payload schema.
pub fn check_format_of_payload(payload: &Value) -> bool {
    payload_violations(payload).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Key;

    fn valid_payload() -> Vec<(&'static str, Value)> {
        vec![
            ("sender", Value::from("a".repeat(64))),
            ("contract", Value::from("currency")),
            ("function", Value::from("transfer")),
            (
                "kwargs",
                Value::map([("to", Value::from("b".repeat(64))), ("amount", Value::from(10))]),
            ),
            ("nonce", Value::from(1)),
            ("stamps_supplied", Value::from(50)),
            ("chain_id", Value::from("test-chain")),
        ]
    }

    fn with(field: &str, value: Value) -> Value {
        Value::map(
            valid_payload()
                .into_iter()
                .map(|(k, v)| if k == field { (k, value.clone()) } else { (k, v) }),
        )
    }

    #[test]
    fn test_valid_payload_passes() {
        let payload = Value::map(valid_payload());
        assert!(check_format_of_payload(&payload));
        assert!(validate_payload(&payload).is_ok());
    }

    #[test]
    fn test_missing_any_field_fails() {
        for field in PAYLOAD_FIELDS {
            let payload = Value::map(valid_payload().into_iter().filter(|(k, _)| *k != field));
            let violations = payload_violations(&payload);
            assert_eq!(violations, vec![format!("{field}: missing field")]);
        }
    }

    #[test]
    fn test_extra_field_fails() {
        let mut entries = valid_payload();
        entries.push(("memo", Value::from("hi")));

        let violations = payload_violations(&Value::map(entries));
        assert_eq!(violations, vec!["'memo': unexpected field".to_string()]);
    }

    #[test]
    fn test_kwargs_key_must_be_identifier() {
        let payload = with("kwargs", Value::map([("123bad", Value::from(1))]));

        let violations = payload_violations(&payload);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("kwargs:"));
        assert!(violations[0].contains("'123bad'"));
    }

    #[test]
    fn test_kwargs_non_string_key_fails() {
        let payload = with("kwargs", Value::Map(vec![(Key::Int(1), Value::Null)]));
        assert!(!check_format_of_payload(&payload));
    }

    #[test]
    fn test_sender_must_be_hex() {
        let payload = with("sender", Value::from(format!("{}g", "a".repeat(63))));
        assert_eq!(payload_violations(&payload), vec!["sender: expected 64 hex characters"]);

        let payload = with("sender", Value::from("a".repeat(63)));
        assert!(!check_format_of_payload(&payload));
    }

    #[test]
    fn test_counters_must_be_non_negative_ints() {
        assert!(!check_format_of_payload(&with("nonce", Value::from(-1))));
        assert!(!check_format_of_payload(&with("nonce", Value::from("1"))));
        assert!(!check_format_of_payload(&with("stamps_supplied", Value::Float(1.0))));
        assert!(!check_format_of_payload(&with("stamps_supplied", Value::Bool(true))));
        assert!(check_format_of_payload(&with("nonce", Value::from(0))));
    }

    #[test]
    fn test_identifier_fields() {
        assert!(!check_format_of_payload(&with("contract", Value::from("con-token"))));
        assert!(!check_format_of_payload(&with("function", Value::from("_transfer"))));
        assert!(check_format_of_payload(&with("contract", Value::from("con_token2"))));
    }

    #[test]
    fn test_chain_id_any_string() {
        assert!(check_format_of_payload(&with("chain_id", Value::from(""))));
        assert!(!check_format_of_payload(&with("chain_id", Value::from(1))));
    }

    #[test]
    fn test_rules_apply_to_each_list_element() {
        let payload = with(
            "kwargs",
            Value::List(vec![
                Value::map([("ok", Value::Null)]),
                Value::map([("9no", Value::Null)]),
            ]),
        );

        let violations = payload_violations(&payload);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("kwargs[1]:"));
    }

    #[test]
    fn test_full_violation_list() {
        let payload = Value::map([
            ("sender", Value::from("zz")),
            ("contract", Value::from("1x")),
            ("nonce", Value::from(-3)),
        ]);

        // four missing fields plus three bad ones
        assert_eq!(payload_violations(&payload).len(), 7);
    }

    #[test]
    fn test_non_map_payload() {
        assert_eq!(payload_violations(&Value::Null).len(), 1);
    }
}
