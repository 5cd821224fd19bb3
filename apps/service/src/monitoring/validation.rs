//! Normalization of raw check records before they are probed.
//!
//! Records come from the store as loose JSON. Creator-supplied fields must all
//! be present and well-typed or the record is rejected. Engine-owned fields
//! (`state`, `lastChecked`) are defaulted instead.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Check, CheckState, Method, Protocol};

/// Length of the identifiers handed out for checks
pub const CHECK_ID_LENGTH: usize = 20;
/// Length of a subscriber number (digits only, no country prefix)
pub const USER_KEY_LENGTH: usize = 10;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("invalid id: {0}")]
    Id(String),

    #[error("invalid userKey: {0}")]
    UserKey(String),

    #[error("invalid protocol: {0}")]
    Protocol(String),

    #[error("invalid target: {0}")]
    Target(String),

    #[error("invalid method: {0}")]
    Method(String),

    #[error("invalid successCodes: {0}")]
    SuccessCodes(String),

    #[error("invalid timeoutSeconds: {0}")]
    TimeoutSeconds(String),
}

/// Validate and normalize a raw check record
///
/// Unknown fields are preserved in [`Check::extra`].
pub fn validate_check(raw: Value) -> Result<Check, ValidationError> {
    let Value::Object(mut fields) = raw else {
        return Err(ValidationError::NotAnObject);
    };

    let id = validate_id(fields.remove("id")).map_err(ValidationError::Id)?;
    let user_key = validate_user_key(fields.remove("userKey")).map_err(ValidationError::UserKey)?;
    let protocol = validate_protocol(fields.remove("protocol")).map_err(ValidationError::Protocol)?;
    let target = validate_target(fields.remove("target")).map_err(ValidationError::Target)?;
    let method = validate_method(fields.remove("method")).map_err(ValidationError::Method)?;
    let success_codes =
        validate_success_codes(fields.remove("successCodes")).map_err(ValidationError::SuccessCodes)?;
    let timeout_seconds =
        validate_timeout(fields.remove("timeoutSeconds")).map_err(ValidationError::TimeoutSeconds)?;

    let state = normalize_state(fields.remove("state"));
    let last_checked = normalize_last_checked(fields.remove("lastChecked"));

    Ok(Check {
        id,
        user_key,
        protocol,
        target,
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked,
        extra: fields,
    })
}

fn require_str(value: Option<Value>) -> Result<String, String> {
    match value {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("expected a string, got {}", type_name(&other))),
        None => Err("missing".to_string()),
    }
}

fn validate_id(value: Option<Value>) -> Result<String, String> {
    let raw = require_str(value)?;
    let id = raw.trim();

    if id.chars().count() != CHECK_ID_LENGTH {
        return Err(format!("expected {CHECK_ID_LENGTH} characters, got {}", id.chars().count()));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("must be alphanumeric".to_string());
    }

    Ok(id.to_string())
}

fn validate_user_key(value: Option<Value>) -> Result<String, String> {
    let raw = require_str(value)?;
    let key = raw.trim();

    if key.len() != USER_KEY_LENGTH || !key.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("expected {USER_KEY_LENGTH} digits"));
    }

    Ok(key.to_string())
}

fn validate_protocol(value: Option<Value>) -> Result<Protocol, String> {
    require_str(value)?.parse()
}

fn validate_target(value: Option<Value>) -> Result<String, String> {
    let raw = require_str(value)?;
    let target = raw.trim();

    if target.is_empty() {
        return Err("cannot be empty".to_string());
    }

    if has_scheme(target) {
        return Err("must not include a scheme".to_string());
    }

    Ok(target.to_string())
}

/// A `scheme://` prefix, as opposed to `://` appearing later in a path or query
fn has_scheme(target: &str) -> bool {
    target
        .split_once("://")
        .is_some_and(|(prefix, _)| !prefix.contains(['/', '?', '#']))
}

fn validate_method(value: Option<Value>) -> Result<Method, String> {
    require_str(value)?.parse()
}

fn validate_success_codes(value: Option<Value>) -> Result<Vec<i64>, String> {
    let codes = match value {
        Some(Value::Array(codes)) => codes,
        Some(other) => return Err(format!("expected an array, got {}", type_name(&other))),
        None => return Err("missing".to_string()),
    };

    if codes.is_empty() {
        return Err("must contain at least one status code".to_string());
    }

    codes
        .iter()
        .map(|code| as_integer(code).ok_or_else(|| format!("{code} is not an integer")))
        .collect()
}

fn validate_timeout(value: Option<Value>) -> Result<u64, String> {
    let value = value.ok_or_else(|| "missing".to_string())?;
    let seconds = as_integer(&value).ok_or_else(|| format!("{value} is not an integer"))?;

    if seconds < MIN_TIMEOUT_SECONDS as i64 || seconds > MAX_TIMEOUT_SECONDS as i64 {
        return Err(format!(
            "{seconds} is outside {MIN_TIMEOUT_SECONDS}..={MAX_TIMEOUT_SECONDS} seconds"
        ));
    }

    Ok(seconds as u64)
}

/// Anything other than a known state is treated as `down`.
fn normalize_state(value: Option<Value>) -> CheckState {
    match value.as_ref().and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// Only a positive millisecond timestamp counts as a previous probe.
fn normalize_last_checked(value: Option<Value>) -> Option<DateTime<Utc>> {
    let millis = as_integer(&value?)?;
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Integer value of a JSON number, accepting floats with no fractional part
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
