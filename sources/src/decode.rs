use serde_json::Value;
use tally_types::{RawRecord, ScoreError};

/// Decode one payload into a [`RawRecord`].
///
/// The payload must be a JSON object with an integer `score`; other fields
/// are ignored.
pub fn decode_record(payload: &[u8]) -> Result<RawRecord, ScoreError> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| {
        ScoreError::decoding(format!("payload is not valid JSON: {e}"))
            .with_detail("line", e.line().to_string())
            .with_detail("column", e.column().to_string())
            .with_detail("payload_bytes", payload.len().to_string())
    })?;

    if !value.is_object() {
        return Err(ScoreError::decoding(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| {
        ScoreError::decoding(format!("payload does not match record shape: {e}"))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
