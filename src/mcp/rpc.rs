//! JSON-RPC protocol representations and formatting utilities
//!
//! Builds response envelopes and maps `AppError`s onto JSON-RPC error objects.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const NOTIFICATION_PREFIX: &str = "notifications/";

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: &AppError) -> Value {
    json_rpc_error(id, err.code(), &err.to_string())
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let response = JsonrpcErrorResponse::new(
            RpcError {
                code: i64::from(code),
                data: data.clone(),
                message: message.to_string(),
            },
            Some(request_id),
        );
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    // Unparseable requests still get an explicit `"id": null`.
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id.unwrap_or(Value::Null),
        "error": error
    })
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

/// A request id must be a string, a number or null.
pub fn is_valid_id(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Null)
}
