//! Response normalization.
//!
//! The analysis service serializes numpy output as-is, so a response may
//! contain bare `NaN` / `Infinity` / `-Infinity` tokens that are not JSON.
//! They are rewritten to `null` before parsing; after that every number in
//! the tree is finite and `null` is the only "no value" marker.

use std::borrow::Cow;

use serde_json::Value;

/// Longest first so `-Infinity` never matches as `-` + `Infinity`.
const NON_FINITE_TOKENS: [&str; 6] = ["-Infinity", "+Infinity", "Infinity", "-NaN", "+NaN", "NaN"];

/// Replace non-finite literals outside of strings with `null`.
pub fn sanitize_non_finite(text: &str) -> Cow<'_, str> {
    if !NON_FINITE_TOKENS.iter().any(|t| text.contains(t)) {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    let mut in_string = false;
    let mut escaped = false;

    while i < bytes.len() {
        let b = bytes[i];

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if b == b'"' {
            in_string = true;
            i += 1;
            continue;
        }

        if let Some(token) = NON_FINITE_TOKENS
            .iter()
            .find(|t| bytes[i..].starts_with(t.as_bytes()))
        {
            out.push_str(&text[copied..i]);
            out.push_str("null");
            i += token.len();
            copied = i;
            continue;
        }

        i += 1;
    }

    out.push_str(&text[copied..]);
    Cow::Owned(out)
}

/// Parse a service response into a JSON tree with no non-finite numbers.
pub fn parse_response(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&sanitize_non_finite(text))
}

/// Read `key` as a numeric column. Non-numeric entries become `None`.
/// Returns `None` when the key is absent or not an array.
pub fn numeric_column(response: &Value, key: &str) -> Option<Vec<Option<f64>>> {
    let items = response.get(key)?.as_array()?;
    Some(items.iter().map(finite).collect())
}

pub fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}
