//! Transport-agnostic JSON-RPC 2.0 dispatcher.
//!
//! `RpcRouter` takes an `AppState` and dispatches incoming JSON-RPC
//! requests to the appropriate method handler. It is intentionally free
//! of any HTTP or framework dependency so it can be used from:
//!
//! - An HTTP handler
//! - A desktop IPC command
//! - Stdio (CLI)

use crate::state::AppState;

use super::error::RpcError;
use super::methods;
use super::types::*;

/// Transport-agnostic JSON-RPC router.
///
/// # Usage
///
/// ```ignore
/// let router = RpcRouter::new(app_state);
///
/// // From raw JSON string:
/// let response_json = router.handle_request(raw_json_str).await;
///
/// // From a parsed request:
/// let response = router.dispatch(request).await;
/// ```
#[derive(Clone)]
pub struct RpcRouter {
    state: AppState,
}

impl RpcRouter {
    /// Create a new router backed by the given application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Handle a raw JSON string. Parses the request, dispatches it, and
    /// returns the serialized JSON response string.
    pub async fn handle_request(&self, raw: &str) -> String {
        // Try to parse as a batch request first
        if let Ok(batch) = serde_json::from_str::<Vec<JsonRpcRequest>>(raw) {
            let mut responses = Vec::with_capacity(batch.len());
            for req in batch {
                responses.push(self.dispatch(req).await);
            }
            return serde_json::to_string(&responses).unwrap_or_else(|_| {
                r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Failed to serialize response"},"id":null}"#.into()
            });
        }

        // Parse as single request
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                return serde_json::to_string(&JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
                .unwrap_or_default();
            }
        };

        let response = self.dispatch(request).await;
        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Failed to serialize response"},"id":null}"#.into()
        })
    }

    /// Handle a pre-parsed `serde_json::Value`. Useful for transports
    /// that already do their own parsing.
    pub async fn handle_value(&self, value: serde_json::Value) -> serde_json::Value {
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                return serde_json::to_value(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Invalid request: {}", e),
                ))
                .unwrap_or_default();
            }
        };

        let response = self.dispatch(request).await;
        serde_json::to_value(response).unwrap_or_default()
    }

    /// Dispatch a parsed JSON-RPC request to the correct method handler.
    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        // Validate JSON-RPC version
        if req.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                req.id,
                INVALID_REQUEST,
                "Invalid JSON-RPC version, expected \"2.0\"",
            );
        }

        let id = req.id.clone();
        let params = req
            .params
            .unwrap_or(serde_json::Value::Object(Default::default()));

        match self.route(&req.method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => err.to_response(id),
        }
    }

    /// Route a method call to the correct handler and return the result
    /// as JSON.
    async fn route(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        match method {
            // ----- Workflows -----
            "workflow/create" => {
                let p = parse_params(params)?;
                let r = methods::workflows::create(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "workflow/get" => {
                let p = parse_params(params)?;
                let r = methods::workflows::get(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "workflow/list" => {
                let r = methods::workflows::list(&self.state).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "workflow/update" => {
                let p = parse_params(params)?;
                let r = methods::workflows::update(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "workflow/delete" => {
                let p = parse_params(params)?;
                let r = methods::workflows::delete(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "workflow/setDefault" => {
                let p = parse_params(params)?;
                let r = methods::workflows::set_default(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }

            // ----- Executions -----
            "execution/start" => {
                let p = parse_params(params)?;
                let r = methods::executions::start(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "execution/run" => {
                let p = parse_params(params)?;
                let r = methods::executions::run(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "execution/get" => {
                let p = parse_params(params)?;
                let r = methods::executions::get(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }

            // ----- Checkpoints -----
            "checkpoint/create" => {
                let p = parse_params(params)?;
                let r = methods::checkpoints::create(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "checkpoint/get" => {
                let p = parse_params(params)?;
                let r = methods::checkpoints::get(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "checkpoint/list" => {
                let p = parse_params(params)?;
                let r = methods::checkpoints::list(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "checkpoint/recordDecision" => {
                let p = parse_params(params)?;
                let r = methods::checkpoints::record_decision(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }

            // ----- Review panels -----
            "reviewPanel/create" => {
                let p = parse_params(params)?;
                let r = methods::review_panels::create(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "reviewPanel/addVote" => {
                let p = parse_params(params)?;
                let r = methods::review_panels::add_vote(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "reviewPanel/aggregate" => {
                let p = parse_params(params)?;
                let r = methods::review_panels::aggregate(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "reviewPanel/stats" => {
                let p = parse_params(params)?;
                let r = methods::review_panels::stats(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }

            // ----- Tool calls -----
            "toolCall/create" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::create(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/start" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::start(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/complete" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::complete(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/fail" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::fail(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/awaitPermission" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::await_permission(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/approve" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::approve(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/deny" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::deny(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "toolCall/listByExecution" => {
                let p = parse_params(params)?;
                let r = methods::tool_calls::list_by_execution(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }

            // ----- Agents -----
            "agent/register" => {
                let p = parse_params(params)?;
                let r = methods::agents::register(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "agent/unregister" => {
                let p = parse_params(params)?;
                let r = methods::agents::unregister(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "agent/list" => {
                let p = parse_params(params)?;
                let r = methods::agents::list(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "agent/delegate" => {
                let p = parse_params(params)?;
                let r = methods::agents::delegate(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }
            "agent/parseMentions" => {
                let p = parse_params(params)?;
                let r = methods::agents::parse_mentions(&self.state, p).await?;
                Ok(serde_json::to_value(r).unwrap())
            }

            // ----- Unknown method -----
            _ => Err(RpcError::MethodNotFound(format!(
                "Method not found: {}",
                method
            ))),
        }
    }

    /// Return a list of all supported RPC method names.
    /// Useful for introspection / discovery endpoints.
    pub fn method_list(&self) -> Vec<&'static str> {
        vec![
            "workflow/create",
            "workflow/get",
            "workflow/list",
            "workflow/update",
            "workflow/delete",
            "workflow/setDefault",
            "execution/start",
            "execution/run",
            "execution/get",
            "checkpoint/create",
            "checkpoint/get",
            "checkpoint/list",
            "checkpoint/recordDecision",
            "reviewPanel/create",
            "reviewPanel/addVote",
            "reviewPanel/aggregate",
            "reviewPanel/stats",
            "toolCall/create",
            "toolCall/start",
            "toolCall/complete",
            "toolCall/fail",
            "toolCall/awaitPermission",
            "toolCall/approve",
            "toolCall/deny",
            "toolCall/listByExecution",
            "agent/register",
            "agent/unregister",
            "agent/list",
            "agent/delegate",
            "agent/parseMentions",
        ]
    }
}

/// Helper: deserialize `serde_json::Value` into a typed params struct.
fn parse_params<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::InvalidParams(format!("Invalid params: {}", e)))
}
