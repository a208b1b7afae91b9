//! Response normalization.
//!
//! The backend answers in two shapes depending on the endpoint generation:
//!
//! - wrapped: `{"status": "success", "data": {"message": ..., "resource": ...}}`
//! - flat: `{"success": true, "data": ..., "error": ...}`
//!
//! [`normalize`] is the only place that knows about either; everything above
//! it sees `Result<Value, ApiError>`.

use serde_json::{Map, Value};

use super::error::{ApiError, ErrorDetail};

/// Turn a raw HTTP response into the resource it carries or a classified error
pub fn normalize(status: u16, body: &str) -> Result<Value, ApiError> {
    let http_ok = (200..300).contains(&status);

    if body.trim().is_empty() {
        return if http_ok {
            Ok(Value::Null)
        } else {
            Err(ApiError::classify(status, ErrorDetail::default()))
        };
    }

    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) if http_ok => return Err(ApiError::decode(e)),
        Err(_) => {
            return Err(ApiError::classify(
                status,
                ErrorDetail {
                    message: Some(body.trim().to_string()),
                    ..Default::default()
                },
            ))
        }
    };

    let Value::Object(mut obj) = json else {
        return if http_ok {
            Ok(json)
        } else {
            Err(ApiError::classify(status, ErrorDetail::default()))
        };
    };

    if let Some(success) = obj.get("success").and_then(Value::as_bool) {
        return normalize_flat(status, http_ok && success, obj);
    }

    if let Some(succeeded) = wrapped_outcome(&obj) {
        return normalize_wrapped(status, http_ok && succeeded, obj);
    }

    // Bare resource or bare error body
    if http_ok {
        Ok(Value::Object(obj))
    } else {
        let detail = error_detail(obj.remove("error").unwrap_or(Value::Object(obj)));
        Err(ApiError::classify(status, detail))
    }
}

/// Whether `obj` is the wrapped envelope and, if so, whether it reports
/// success. Resources carry their own `status` field, so only the envelope
/// vocabulary or a `data` member marks the wrapper.
fn wrapped_outcome(obj: &Map<String, Value>) -> Option<bool> {
    let envelope_status = obj.get("status").and_then(Value::as_str)?;
    match envelope_status {
        "success" | "ok" => Some(true),
        "error" | "fail" => Some(false),
        _ if obj.contains_key("data") => Some(false),
        _ => None,
    }
}

fn normalize_flat(status: u16, succeeded: bool, mut obj: Map<String, Value>) -> Result<Value, ApiError> {
    if succeeded {
        return Ok(obj.remove("data").unwrap_or(Value::Null));
    }

    let mut detail = obj.remove("error").map(error_detail).unwrap_or_default();
    if detail.message.is_none() {
        detail.message = obj.get("message").and_then(Value::as_str).map(str::to_string);
    }
    Err(ApiError::classify(status, detail))
}

fn normalize_wrapped(status: u16, succeeded: bool, mut obj: Map<String, Value>) -> Result<Value, ApiError> {
    let data = obj.remove("data");

    if succeeded {
        return Ok(match data {
            Some(Value::Object(mut data)) if data.contains_key("resource") => {
                data.remove("resource").unwrap_or(Value::Null)
            }
            Some(other) => other,
            None => Value::Null,
        });
    }

    let mut detail = match data {
        Some(data @ Value::Object(_)) => error_detail(data),
        _ => ErrorDetail::default(),
    };
    if detail.message.is_none() {
        detail.message = obj.get("message").and_then(Value::as_str).map(str::to_string);
    }
    if detail.code.is_none() {
        detail.code = obj.get("code").and_then(Value::as_str).map(str::to_string);
    }
    Err(ApiError::classify(status, detail))
}

/// Errors arrive either as a plain string or as an object with details
fn error_detail(value: Value) -> ErrorDetail {
    match value {
        Value::String(message) => ErrorDetail {
            message: Some(message),
            ..Default::default()
        },
        obj @ Value::Object(_) => serde_json::from_value(obj).unwrap_or_default(),
        _ => ErrorDetail::default(),
    }
}
