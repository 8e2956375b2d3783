//! Payload normalization.
//!
//! Pure transformations from raw source responses to the flat
//! field-name-to-bytes map a destination secret holds. All shape invariants
//! are enforced here; the engine only ever sees either a clean field map or
//! a hard error naming the offending source path.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::{GsmEncoding, Mapping};
use crate::error::ReflectError;
use crate::provider::vault::V2_WRAPPER_KEY;

/// Normalize a key/value engine response according to the mapping's engine
/// version.
///
/// The v2 engine nests the real field map one level deeper than v1; both
/// normalize to identical output for identical stored content.
pub(crate) fn vault_fields(
    mapping: &Mapping,
    raw: Map<String, Value>,
) -> Result<BTreeMap<String, Vec<u8>>, ReflectError> {
    let version = mapping
        .vault_engine_version
        .as_ref()
        .map(|v| v.as_str().to_string())
        .unwrap_or_default();

    match version.as_str() {
        "kv" => cast_fields(&mapping.path, raw),
        "kv-v2" => match raw.get(V2_WRAPPER_KEY) {
            Some(Value::Object(inner)) => cast_fields(&mapping.path, inner.clone()),
            _ => Err(ReflectError::MalformedPayload {
                path: mapping.path.clone(),
                reason: "key/value v2 response did not have the expected extra wrapping"
                    .to_string(),
            }),
        },
        _ => Err(ReflectError::UnsupportedEngineVersion {
            version,
            path: mapping.path.clone(),
        }),
    }
}

/// Normalize a Secret Manager payload according to the mapping's encoding.
pub(crate) fn gsm_fields(
    mapping: &Mapping,
    payload: &[u8],
) -> Result<BTreeMap<String, Vec<u8>>, ReflectError> {
    match mapping.gsm_encoding {
        GsmEncoding::Raw => {
            let key = mapping
                .gsm_secret_key
                .clone()
                .filter(|key| !key.is_empty())
                .unwrap_or_else(|| mapping.secret_name.clone());

            Ok(BTreeMap::from([(key, payload.to_vec())]))
        }
        GsmEncoding::Json => decode_json_fields(&mapping.path, payload),
    }
}

/// Decode a structured-JSON payload into one field per top-level key.
///
/// JSON strings are unwrapped to their raw bytes (no surrounding quotes,
/// escapes resolved); every other value is re-serialized so the field stays
/// valid JSON text.
fn decode_json_fields(
    path: &str,
    payload: &[u8],
) -> Result<BTreeMap<String, Vec<u8>>, ReflectError> {
    let decoded: Map<String, Value> =
        serde_json::from_slice(payload).map_err(|err| ReflectError::MalformedPayload {
            path: path.to_string(),
            reason: format!("payload is not a JSON object: {err}"),
        })?;

    let mut fields = BTreeMap::new();
    for (key, value) in decoded {
        let bytes = match value {
            Value::String(string) => string.into_bytes(),
            other => serde_json::to_vec(&other).map_err(|err| ReflectError::MalformedPayload {
                path: path.to_string(),
                reason: format!("field {key:?} could not be re-serialized: {err}"),
            })?,
        };
        fields.insert(key, bytes);
    }

    Ok(fields)
}

/// Coerce a raw field map into bytes.
///
/// Over the REST API field values only ever arrive as JSON text; anything
/// else means the secret holds data this tool cannot represent faithfully.
fn cast_fields(
    path: &str,
    raw: Map<String, Value>,
) -> Result<BTreeMap<String, Vec<u8>>, ReflectError> {
    let mut fields = BTreeMap::new();
    for (key, value) in raw {
        match value {
            Value::String(string) => {
                fields.insert(key, string.into_bytes());
            }
            other => {
                return Err(ReflectError::MalformedPayload {
                    path: path.to_string(),
                    reason: format!(
                        "field {key:?} has unsupported value type ({})",
                        json_type_name(&other)
                    ),
                });
            }
        }
    }

    Ok(fields)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
