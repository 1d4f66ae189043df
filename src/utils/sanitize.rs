use serde_json::Value;

use crate::utils::crypto::mask_card_number;

const FULL_MASK: &str = "****";

const SENSITIVE_KEYS: &[&str] = &[
    "card_number",
    "cardnumber",
    "card",
    "password",
    "secret",
    "token",
    "api_key",
    "authorization",
    "auth",
    "api_secret",
    "credit_card",
    "cvv",
    "cvc",
    "pin",
];

/// Sanitizes sensitive fields in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_json(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_field(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}

/// Masks a secret for a log field, keeping at most the last four characters.
pub fn mask_value(value: &str) -> String {
    if value.chars().count() <= 4 {
        return FULL_MASK.to_string();
    }

    let looks_like_card = value
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    if looks_like_card {
        return mask_card_number(value);
    }

    let chars: Vec<char> = value.chars().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{FULL_MASK}{tail}")
}

fn mask_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_value(s)),
        _ => Value::String(FULL_MASK.to_string()),
    }
}
