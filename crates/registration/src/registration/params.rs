//! Case-insensitive extraction helpers for request values.
//!
//! The campaign id ("registration id") may arrive in the request body or in
//! the query string under either spelling; body values win.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::domain::CampaignId;
use super::service::RegistrationError;

const CAMPAIGN_KEYS: [&str; 2] = ["registration_id", "registrationid"];

/// Case-insensitive lookup in a JSON object body.
pub fn body_value<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    body.iter()
        .find(|(key, _)| matches_any(key, keys))
        .map(|(_, value)| value)
}

/// Case-insensitive string lookup in a JSON object body.
pub fn body_string(body: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    body_value(body, keys).and_then(value_to_string)
}

/// Case-insensitive lookup in query parameters.
pub fn query_string(query: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    query
        .iter()
        .find(|(key, value)| matches_any(key, keys) && !value.is_empty())
        .map(|(_, value)| value.clone())
}

/// Resolve the campaign id from body then query parameters.
///
/// With `strict` the absence of a value is an error; non-strict callers
/// (such as admin removal, which may filter by username alone) get `None`.
pub fn resolve_campaign_id(
    body: &Map<String, Value>,
    query: &HashMap<String, String>,
    strict: bool,
) -> Result<Option<CampaignId>, RegistrationError> {
    let value = body_string(body, &CAMPAIGN_KEYS).or_else(|| query_string(query, &CAMPAIGN_KEYS));
    match value {
        Some(value) => Ok(Some(CampaignId(value))),
        None if strict => Err(RegistrationError::MissingRegistrationId),
        None => Ok(None),
    }
}

/// Remove campaign-id keys from a submission body so only registration and
/// survey values remain.
pub fn strip_campaign_keys(body: &mut Map<String, Value>) {
    body.retain(|key, _| !matches_any(key, &CAMPAIGN_KEYS));
}

/// Case-insensitive removal from a JSON object body. Forms arrive with
/// whatever capitalization the client used.
pub fn take_value(body: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    let key = body.keys().find(|key| matches_any(key, keys)).cloned()?;
    body.remove(&key)
}

/// Render a scalar JSON value as the string the form field carries.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Interpret a JSON value as a boolean flag ("true"/"false" accepted).
pub fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => parse_bool(text),
        _ => None,
    }
}

/// Interpret a query-parameter string as a boolean flag.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn matches_any(key: &str, keys: &[&str]) -> bool {
    keys.iter().any(|candidate| key.eq_ignore_ascii_case(candidate))
}
