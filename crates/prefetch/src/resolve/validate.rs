//! Business-data validation for prefetched payloads.

use serde_json::Value;

/// Whether a fetched payload carries something worth showing.
///
/// Null, blank strings, empty arrays and empty objects are rejected;
/// numbers and booleans (including `0` and `false`) pass.
pub fn is_business_data_valid(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
