//! Conversion between plain JSON and Firestore typed values

use super::error::FirestoreError;
use serde_json::{Map, Value, json};

/// Encode a plain JSON value as a Firestore `Value`
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            // floats, and u64 beyond i64::MAX
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode every entry of a field map
pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode(v)))
        .collect()
}

/// Decode a Firestore `Value` into plain JSON
pub fn decode(value: &Value) -> Result<Value, FirestoreError> {
    let Some(obj) = value.as_object() else {
        return Err(FirestoreError::decode(format!("expected typed value, got {}", value)));
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Err(FirestoreError::decode("empty typed value"));
    };

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| FirestoreError::decode(format!("bad integerValue {}", inner)))?
        }
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            // NaN and Infinity arrive as strings and have no JSON form
            _ => Value::Null,
        },
        "timestampValue" | "stringValue" | "bytesValue" | "referenceValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Value::Object(fields)
        }
        other => return Err(FirestoreError::decode(format!("unknown value kind '{}'", other))),
    };

    Ok(decoded)
}

/// Decode a Firestore `fields` map
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, FirestoreError> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|d| (k.clone(), d)))
        .collect()
}

/// Quote a field path for `updateMask` / `updateTransforms`
///
/// Dotted paths address nested map keys; each segment that is not a plain
/// identifier is wrapped in backticks.
pub fn quote_field_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            let simple = segment
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if simple {
                segment.to_string()
            } else {
                format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
