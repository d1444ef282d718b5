//! RPC error type that bridges `CoreError` to JSON-RPC errors.

use super::types;
use crate::error::CoreError;

/// Unified RPC error that can be converted to a JSON-RPC error response.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl RpcError {
    /// Convert to a JSON-RPC error code.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::NotFound(_) => types::NOT_FOUND,
            RpcError::InvalidState(_) => types::INVALID_STATE,
            RpcError::Validation(_) => types::VALIDATION_FAILED,
            RpcError::Internal(_) => types::INTERNAL_ERROR,
            RpcError::InvalidParams(_) => types::INVALID_PARAMS,
            RpcError::MethodNotFound(_) => types::METHOD_NOT_FOUND,
        }
    }

    /// Convert to a JSON-RPC error response. Validation failures carry
    /// the full message list as structured data.
    pub fn to_response(&self, id: Option<serde_json::Value>) -> types::JsonRpcResponse {
        match self {
            RpcError::Validation(errors) => types::JsonRpcResponse::error_with_data(
                id,
                self.code(),
                "Validation failed",
                serde_json::json!({ "errors": errors }),
            ),
            _ => types::JsonRpcResponse::error(id, self.code(), self.to_string()),
        }
    }
}

impl From<CoreError> for RpcError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => RpcError::NotFound(msg),
            CoreError::InvalidState(msg) => RpcError::InvalidState(msg),
            CoreError::Validation(errors) => RpcError::Validation(errors),
            CoreError::NoPrimaryAgent => {
                RpcError::NotFound("No primary agent registered".to_string())
            }
            CoreError::Database(msg) => RpcError::Internal(msg),
            CoreError::Internal(msg) => RpcError::Internal(msg),
        }
    }
}
