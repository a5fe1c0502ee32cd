//! The host-facing command protocol handler.
//!
//! Validates every inbound command against its parameter shape, routes to
//! the four supported operations, and serializes results and errors.
//! Params may arrive positionally (array) or named (object); both are
//! normalized to the same internal shape before dispatch. Handler results
//! are sanitized against the JSON-only wire subset so internal values can
//! never escape unsanitized.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Value, json};

use warden_core::{
    CoreError, HandlerKind, JsonRpcError, JsonRpcRequest, JsonRpcResponse, SnapId, codes,
    sanitize_json,
};

use crate::error::ExecutorError;
use crate::executor::SnapExecutor;

/// The four supported commands.
mod methods {
    pub(super) const PING: &str = "ping";
    pub(super) const EXECUTE_SNAP: &str = "executeSnap";
    pub(super) const SNAP_RPC: &str = "snapRpc";
    pub(super) const TERMINATE: &str = "terminate";
}

#[derive(Debug)]
struct ExecuteSnapParams {
    snap_id: SnapId,
    source_code: String,
    endowments: Vec<String>,
}

#[derive(Debug)]
struct SnapRpcParams {
    snap_id: SnapId,
    handler: HandlerKind,
    origin: String,
    request: Value,
}

/// Routes validated commands into a [`SnapExecutor`].
pub struct CommandHandler {
    executor: Arc<SnapExecutor>,
}

impl CommandHandler {
    /// Create a handler over the given executor.
    #[must_use]
    pub fn new(executor: Arc<SnapExecutor>) -> Self {
        Self { executor }
    }

    /// Handle one inbound command, always producing a correlated response.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let outcome = match request.method.as_str() {
            methods::PING => self.ping(request.params),
            methods::TERMINATE => self.terminate(request.params).await,
            methods::EXECUTE_SNAP => self.execute_snap(request.params).await,
            methods::SNAP_RPC => self.snap_rpc(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        }
    }

    fn ping(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        reject_params(methods::PING, params)?;
        Ok(json!("OK"))
    }

    async fn terminate(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        reject_params(methods::TERMINATE, params)?;
        self.executor.terminate().await;
        Ok(json!("OK"))
    }

    async fn execute_snap(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = parse_execute_snap(params)?;
        self.executor
            .start_snap(params.snap_id, &params.source_code, &params.endowments)
            .await
            .map_err(error_to_rpc)?;
        Ok(json!("OK"))
    }

    async fn snap_rpc(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = parse_snap_rpc(params)?;
        let result = self
            .executor
            .snap_rpc(
                &params.snap_id,
                params.handler,
                &params.origin,
                params.request,
            )
            .await
            .map_err(error_to_rpc)?;

        // Non-serializable handler results become a descriptive internal
        // error instead of escaping raw.
        sanitize_json(result).map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string()))
    }
}

fn invalid_params(method: &str, params: &Option<Value>) -> JsonRpcError {
    JsonRpcError::new(codes::INVALID_PARAMS, "invalid method parameter(s)").with_data(json!({
        "method": method,
        "params": params,
    }))
}

fn reject_params(method: &str, params: Option<Value>) -> Result<(), JsonRpcError> {
    match &params {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) if items.is_empty() => Ok(()),
        _ => Err(invalid_params(method, &params)),
    }
}

fn parse_execute_snap(params: Option<Value>) -> Result<ExecuteSnapParams, JsonRpcError> {
    let bail = |params: &Option<Value>| invalid_params(methods::EXECUTE_SNAP, params);

    let (snap_id, source_code, endowments) = match &params {
        Some(Value::Array(items)) if (2..=3).contains(&items.len()) => (
            items[0].clone(),
            items[1].clone(),
            items.get(2).cloned().unwrap_or(Value::Null),
        ),
        Some(Value::Object(map)) => (
            map.get("snapId").cloned().unwrap_or(Value::Null),
            map.get("sourceCode").cloned().unwrap_or(Value::Null),
            map.get("endowments").cloned().unwrap_or(Value::Null),
        ),
        _ => return Err(bail(&params)),
    };

    let snap_id: SnapId = serde_json::from_value(snap_id).map_err(|_| bail(&params))?;
    let Value::String(source_code) = source_code else {
        return Err(bail(&params));
    };
    let endowments: Vec<String> = match endowments {
        Value::Null => Vec::new(),
        value => serde_json::from_value(value).map_err(|_| bail(&params))?,
    };

    Ok(ExecuteSnapParams {
        snap_id,
        source_code,
        endowments,
    })
}

fn parse_snap_rpc(params: Option<Value>) -> Result<SnapRpcParams, JsonRpcError> {
    let bail = |params: &Option<Value>| invalid_params(methods::SNAP_RPC, params);

    let (snap_id, handler, origin, request) = match &params {
        Some(Value::Array(items)) if items.len() == 4 => (
            items[0].clone(),
            items[1].clone(),
            items[2].clone(),
            items[3].clone(),
        ),
        Some(Value::Object(map)) => (
            map.get("snapId").cloned().unwrap_or(Value::Null),
            map.get("handler").cloned().unwrap_or(Value::Null),
            map.get("origin").cloned().unwrap_or(Value::Null),
            map.get("request").cloned().unwrap_or(Value::Null),
        ),
        _ => return Err(bail(&params)),
    };

    let snap_id: SnapId = serde_json::from_value(snap_id).map_err(|_| bail(&params))?;
    let Value::String(handler) = handler else {
        return Err(bail(&params));
    };
    let handler = HandlerKind::from_str(&handler).map_err(|_| bail(&params))?;
    let Value::String(origin) = origin else {
        return Err(bail(&params));
    };

    Ok(SnapRpcParams {
        snap_id,
        handler,
        origin,
        request,
    })
}

fn error_to_rpc(error: ExecutorError) -> JsonRpcError {
    match error {
        ExecutorError::MissingHandler { .. } => {
            JsonRpcError::new(codes::METHOD_NOT_FOUND, error.to_string())
        },
        ExecutorError::Terminated { .. } => JsonRpcError::new(codes::TERMINATED, error.to_string()),
        ExecutorError::Outbound(rpc_error) => rpc_error,
        ExecutorError::Core(CoreError::NonSerializable { .. }) => {
            JsonRpcError::new(codes::INTERNAL_ERROR, error.to_string())
        },
        ExecutorError::Core(_) => JsonRpcError::new(codes::INVALID_PARAMS, error.to_string()),
        ExecutorError::UnknownSnap { .. }
        | ExecutorError::AlreadyStarted { .. }
        | ExecutorError::Evaluation { .. }
        | ExecutorError::HandlerFailed { .. }
        | ExecutorError::Endowment(_) => {
            JsonRpcError::new(codes::EXECUTION_FAILURE, error.to_string())
        },
    }
}
