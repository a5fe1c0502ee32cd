//! Sanitization of values crossing the sandbox boundary.
//!
//! Every handler result and every outbound request parameter is normalized
//! through [`sanitize_json`] before it is allowed onto the wire. The Rust
//! type system already excludes functions and cycles from
//! [`serde_json::Value`], so the remaining hazards are unbounded size and
//! nesting depth, which an untrusted snap can use to wedge the host-side
//! serializer.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Maximum nesting depth of a sanitized value.
pub const MAX_JSON_DEPTH: usize = 64;

/// Maximum serialized size of a sanitized value, in bytes.
pub const MAX_JSON_BYTES: usize = 64 * 1024 * 1024;

/// Validate that `value` fits the JSON-only wire subset.
///
/// Returns the value unchanged on success so callers can write
/// `let result = sanitize_json(result)?;`.
///
/// # Errors
///
/// Returns [`CoreError::NonSerializable`] if the value nests deeper than
/// [`MAX_JSON_DEPTH`] or serializes to more than [`MAX_JSON_BYTES`] bytes.
pub fn sanitize_json(value: Value) -> CoreResult<Value> {
    check_depth(&value, 0)?;

    // Depth is bounded, so serialization cannot recurse unboundedly.
    let bytes = serde_json::to_vec(&value).map_err(|e| CoreError::NonSerializable {
        reason: e.to_string(),
    })?;
    if bytes.len() > MAX_JSON_BYTES {
        return Err(CoreError::NonSerializable {
            reason: format!(
                "value serializes to {} bytes, exceeding the {MAX_JSON_BYTES} byte limit",
                bytes.len()
            ),
        });
    }

    Ok(value)
}

fn check_depth(value: &Value, depth: usize) -> CoreResult<()> {
    if depth > MAX_JSON_DEPTH {
        return Err(CoreError::NonSerializable {
            reason: format!("value nests deeper than {MAX_JSON_DEPTH} levels"),
        });
    }
    match value {
        Value::Array(items) => {
            for item in items {
                check_depth(item, depth + 1)?;
            }
        },
        Value::Object(map) => {
            for item in map.values() {
                check_depth(item, depth + 1)?;
            }
        },
        _ => {},
    }
    Ok(())
}
