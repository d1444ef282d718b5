//! JSON-RPC 2.0 wire types.
//!
//! Standalone protocol structs with no transport dependency. The router
//! consumes [`JsonRpcRequest`] and produces [`JsonRpcResponse`]; hosts
//! only need serde to move them across whatever wire they use.

use serde::{Deserialize, Serialize};

/// An incoming JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, must be `"2.0"`.
    pub jsonrpc: String,
    /// Request id (number or string); absent for notifications.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Method name in `entity/op` form, e.g. `"checkpoint/recordDecision"`.
    pub method: String,
    /// Named parameters; omitted means an empty object.
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(
        id: impl Into<serde_json::Value>,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(id.into()),
            method: method.into(),
            params: Some(params),
        }
    }
}

/// An outgoing JSON-RPC 2.0 response. Exactly one of `result`/`error`
/// is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echoed from the request.
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i64, message: impl Into<String>) -> Self {
        Self::build_error(id, code, message, None)
    }

    /// Error response carrying structured detail, e.g. the message list
    /// of a rejected workflow definition.
    pub fn error_with_data(
        id: Option<serde_json::Value>,
        code: i64,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self::build_error(id, code, message, Some(data))
    }

    fn build_error(
        id: Option<serde_json::Value>,
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }
}

/// The error member of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// Standard JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// Application codes in the reserved server range (-32000..-32099).
pub const NOT_FOUND: i64 = -32001;
pub const INVALID_STATE: i64 = -32002;
pub const VALIDATION_FAILED: i64 = -32003;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let request = JsonRpcRequest::new(7, "agent/list", serde_json::json!({}));
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: JsonRpcRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.method, "agent/list");
        assert_eq!(decoded.id, Some(serde_json::json!(7)));
    }

    #[test]
    fn test_response_omits_absent_members() {
        let ok = JsonRpcResponse::success(Some(serde_json::json!(1)), serde_json::json!({"x": 1}));
        let encoded = serde_json::to_string(&ok).unwrap();
        assert!(!encoded.contains("error"));

        let err = JsonRpcResponse::error(None, NOT_FOUND, "missing");
        let encoded = serde_json::to_string(&err).unwrap();
        assert!(!encoded.contains("result"));
        assert!(encoded.contains("-32001"));
    }
}
