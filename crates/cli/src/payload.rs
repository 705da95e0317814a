use xian_common::utils::io::file::read_target;
use xian_config::Configuration;
use xian_core::xian_transaction::{canonicalize, Value};

use crate::error::Error;

/// Reads a payload from a JSON file or literal JSON and canonicalizes it. `chain_id` and
/// `stamps_supplied` are taken from the configuration when the payload leaves them out.
pub(crate) fn load_payload(target: &str, configuration: &Configuration) -> Result<Value, Error> {
    let contents = read_target(target)
        .map_err(|e| Error::Generic(format!("failed to read payload: {}", e)))?;
    let mut json: serde_json::Value = serde_json::from_str(&contents)?;

    if let Some(object) = json.as_object_mut() {
        if !object.contains_key("chain_id") && !configuration.chain_id.is_empty() {
            object.insert("chain_id".to_string(), configuration.chain_id.clone().into());
        }
        if !object.contains_key("stamps_supplied") && configuration.stamps_supplied > 0 {
            object.insert("stamps_supplied".to_string(), configuration.stamps_supplied.into());
        }
    }

    Ok(canonicalize(&Value::from(json))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration() -> Configuration {
        Configuration {
            chain_id: "xian-testnet".to_string(),
            stamps_supplied: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_fields_come_from_configuration() {
        let payload = load_payload(r#"{"contract":"currency","nonce":0}"#, &configuration())
            .expect("should load");

        assert_eq!(payload.get("chain_id"), Some(&Value::from("xian-testnet")));
        assert_eq!(payload.get("stamps_supplied"), Some(&Value::Int(100)));
    }

    #[test]
    fn test_payload_fields_win_over_configuration() {
        let payload = load_payload(
            r#"{"chain_id":"xian-mainnet","stamps_supplied":5}"#,
            &configuration(),
        )
        .expect("should load");

        assert_eq!(payload.get("chain_id"), Some(&Value::from("xian-mainnet")));
        assert_eq!(payload.get("stamps_supplied"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_empty_configuration_adds_nothing() {
        let payload = load_payload("{}", &Configuration::default()).expect("should load");
        assert_eq!(payload, Value::Map(vec![]));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_payload("{not json", &Configuration::default()),
            Err(Error::SerdeError(_))
        ));
    }
}
