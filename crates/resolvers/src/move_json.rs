//! Decoding helpers for the JSON encoding of Move values.
//!
//! The fullnode encodes `u64`/`u128`/`u256` as decimal strings, small
//! integers as numbers, `Object<T>` as `{"inner": "0x.."}` and `Option<T>`
//! as `{"vec": []}` or `{"vec": [x]}`.

use serde_json::Value;

use vaultlens_common::error::ResolutionError;
use vaultlens_common::types::AccountAddress;

fn decode_err(what: &str, detail: impl std::fmt::Display) -> ResolutionError {
    ResolutionError::Decode(format!("{what}: {detail}"))
}

/// Look up a struct field.
pub fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, ResolutionError> {
    value
        .get(name)
        .ok_or_else(|| decode_err(name, "missing field"))
}

/// The single return value of a view function.
pub fn first(values: Vec<Value>, function: &str) -> Result<Value, ResolutionError> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| decode_err(function, "view returned no values"))
}

/// An unsigned integer encoded either as a string or as a JSON number.
pub fn as_u128(value: &Value, what: &str) -> Result<u128, ResolutionError> {
    match value {
        Value::String(s) => s.parse().map_err(|e| decode_err(what, e)),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| decode_err(what, format!("{n} is not an unsigned integer"))),
        other => Err(decode_err(what, format!("expected integer, got {other}"))),
    }
}

pub fn as_u32(value: &Value, what: &str) -> Result<u32, ResolutionError> {
    u32::try_from(as_u128(value, what)?).map_err(|e| decode_err(what, e))
}

pub fn as_u8(value: &Value, what: &str) -> Result<u8, ResolutionError> {
    u8::try_from(as_u128(value, what)?).map_err(|e| decode_err(what, e))
}

pub fn u128_field(value: &Value, name: &str) -> Result<u128, ResolutionError> {
    as_u128(field(value, name)?, name)
}

pub fn as_string(value: &Value, what: &str) -> Result<String, ResolutionError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| decode_err(what, format!("expected string, got {value}")))
}

/// An address, given either directly or as an `Object<T>` wrapper.
pub fn as_address(value: &Value, what: &str) -> Result<AccountAddress, ResolutionError> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(_) => return object_inner(value, what),
        other => return Err(decode_err(what, format!("expected address, got {other}"))),
    };
    raw.parse().map_err(|e| decode_err(what, e))
}

pub fn address_field(value: &Value, name: &str) -> Result<AccountAddress, ResolutionError> {
    as_address(field(value, name)?, name)
}

/// The address inside an `Object<T>`.
pub fn object_inner(value: &Value, what: &str) -> Result<AccountAddress, ResolutionError> {
    let inner = value
        .get("inner")
        .and_then(Value::as_str)
        .ok_or_else(|| decode_err(what, "expected {\"inner\": address}"))?;
    inner.parse().map_err(|e| decode_err(what, e))
}

/// The contents of a Move `Option<T>`.
pub fn option_inner<'a>(value: &'a Value, what: &str) -> Result<Option<&'a Value>, ResolutionError> {
    let items = value
        .get("vec")
        .and_then(Value::as_array)
        .ok_or_else(|| decode_err(what, "expected {\"vec\": [...]}"))?;
    match items.as_slice() {
        [] => Ok(None),
        [item] => Ok(Some(item)),
        _ => Err(decode_err(what, format!("option holds {} values", items.len()))),
    }
}

pub fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, ResolutionError> {
    value
        .as_array()
        .ok_or_else(|| decode_err(what, format!("expected array, got {value}")))
}

/// A vector of addresses or objects.
pub fn address_list(value: &Value, what: &str) -> Result<Vec<AccountAddress>, ResolutionError> {
    as_array(value, what)?
        .iter()
        .map(|item| as_address(item, what))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_integers_from_strings_and_numbers() {
        assert_eq!(as_u128(&json!("340282366920938463463374607431768211455"), "x").unwrap(), u128::MAX);
        assert_eq!(as_u128(&json!(42), "x").unwrap(), 42);
        assert_eq!(as_u8(&json!(8), "decimals").unwrap(), 8);
        assert!(as_u8(&json!(300), "decimals").is_err());
        assert!(as_u128(&json!(-1), "x").is_err());
        assert!(as_u128(&json!("1.5"), "x").is_err());
    }

    #[test]
    fn test_address_forms() {
        let plain = as_address(&json!("0xa"), "asset").unwrap();
        let object = as_address(&json!({ "inner": "0x000a" }), "asset").unwrap();
        assert_eq!(plain, object);
        assert!(as_address(&json!(10), "asset").is_err());
    }

    #[test]
    fn test_option_inner() {
        assert!(option_inner(&json!({ "vec": [] }), "o").unwrap().is_none());
        assert_eq!(
            option_inner(&json!({ "vec": ["7"] }), "o").unwrap(),
            Some(&json!("7"))
        );
        assert!(option_inner(&json!({ "vec": ["1", "2"] }), "o").is_err());
        assert!(option_inner(&json!("7"), "o").is_err());
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let err = u128_field(&json!({ "cash": "1" }), "total_borrows").unwrap_err();
        assert!(matches!(err, ResolutionError::Decode(_)));
    }

    #[test]
    fn test_address_list_mixed() {
        let list = address_list(&json!(["0x1", { "inner": "0x2" }]), "vaults").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], "0x2".parse().unwrap());
    }
}
