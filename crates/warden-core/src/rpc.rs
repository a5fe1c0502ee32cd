//! The logical command wire shapes shared by the host and the sandbox.
//!
//! Transport-level framing is an external concern; these types describe
//! only the JSON bodies flowing over whatever stream the host owns.
//! Requests carry an id, responses are correlated by that id, and
//! notifications (no id) flow host-ward only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known JSON-RPC and sandbox-specific error codes.
pub mod codes {
    /// The requested method does not exist (also used for blocked outbound
    /// methods, deliberately indistinguishable from a genuinely unknown one).
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// The request parameters failed shape validation.
    pub const INVALID_PARAMS: i64 = -32602;
    /// An internal error, including non-serializable handler results.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Snap evaluation or invocation failed.
    pub const EXECUTION_FAILURE: i64 = -32000;
    /// The invocation was force-ended by `terminate`.
    pub const TERMINATED: i64 = -32001;
}

/// A request or response correlation id.
///
/// The sandbox treats ids as opaque; it only echoes them back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

/// An inbound command from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Correlation id echoed in the response.
    pub id: JsonRpcId,
    /// Method name, one of `ping`, `executeSnap`, `snapRpc`, `terminate`.
    pub method: String,
    /// Parameters, positional (array) or named (object). Absent params are
    /// treated as an empty positional list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A structured error carried in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code, see [`codes`].
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured context (e.g. the offending method and params).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Build an error with no attached data.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured context to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The canonical "method not found" error.
    ///
    /// Used both for genuinely unknown methods and for methods blocked by
    /// the outbound request guard, so callers cannot distinguish the two.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, "The method does not exist / is not available.")
            .with_data(serde_json::json!({ "method": method }))
    }
}

/// A response correlated with a prior request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// The originating request id.
    pub id: JsonRpcId,
    /// Successful result, mutually exclusive with `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure, mutually exclusive with `result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response.
    #[must_use]
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn failure(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A host-directed notification (no correlation id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Notification method name.
    pub method: String,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Notification sent when a snap raises an error not correlated with
    /// any in-flight command.
    pub const UNHANDLED_ERROR: &'static str = "UnhandledError";
    /// Bracket marker emitted before an outbound call leaves the sandbox.
    pub const OUTBOUND_REQUEST: &'static str = "OutboundRequest";
    /// Bracket marker emitted after an outbound call settles.
    pub const OUTBOUND_RESPONSE: &'static str = "OutboundResponse";

    /// Build a notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_accepts_positional_and_named_params() {
        let positional: JsonRpcRequest =
            serde_json::from_value(json!({"id": 1, "method": "snapRpc", "params": ["a", "b"]}))
                .unwrap();
        assert!(positional.params.unwrap().is_array());

        let named: JsonRpcRequest = serde_json::from_value(
            json!({"id": "x", "method": "executeSnap", "params": {"snapId": "npm:demo"}}),
        )
        .unwrap();
        assert!(named.params.unwrap().is_object());
    }

    #[test]
    fn response_serializes_result_xor_error() {
        let ok = JsonRpcResponse::success(JsonRpcId::Number(1), json!("OK"));
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["result"], json!("OK"));
        assert!(v.get("error").is_none());

        let err = JsonRpcResponse::failure(
            JsonRpcId::Number(2),
            JsonRpcError::new(codes::INVALID_PARAMS, "bad params"),
        );
        let v = serde_json::to_value(&err).unwrap();
        assert!(v.get("result").is_none());
        assert_eq!(v["error"]["code"], json!(codes::INVALID_PARAMS));
    }

    #[test]
    fn method_not_found_shape_is_uniform() {
        let a = JsonRpcError::method_not_found("eth_sendRawTransaction");
        let b = JsonRpcError::method_not_found("definitely_not_a_method");
        assert_eq!(a.code, b.code);
        assert_eq!(a.message, b.message);
    }

    #[test]
    fn string_and_number_ids_round_trip() {
        let n: JsonRpcId = serde_json::from_str("7").unwrap();
        assert_eq!(n, JsonRpcId::Number(7));
        let s: JsonRpcId = serde_json::from_str("\"req-1\"").unwrap();
        assert_eq!(s, JsonRpcId::String("req-1".to_string()));
    }
}
