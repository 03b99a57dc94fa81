//! # Query-String Encoding
//!
//! Encodes any `Serialize` value that serializes to a flat JSON object as an
//! `application/x-www-form-urlencoded` query string. Used for redirecting
//! OAuth errors back to the RP and for the `/token` response's query-string
//! sibling representations.
//!
//! Grounded on `urlencode::to_string` in the teacher's `core` module, which
//! the teacher's `oid4vci::error::Error::to_querystring` builds on directly.

use anyhow::{Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded::Serializer as FormSerializer;

/// Serialize `value` to a query string.
///
/// # Errors
///
/// Returns an error if `value` does not serialize to a JSON object, or if
/// serialization itself fails.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    let Value::Object(map) = serde_json::to_value(value)? else {
        return Err(anyhow!("value does not serialize to a JSON object"));
    };

    let mut out = String::new();
    {
        let mut ser = FormSerializer::new(&mut out);
        for (key, val) in &map {
            let encoded = match val {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            ser.append_pair(key, &encoded);
        }
    }
    Ok(out)
}
