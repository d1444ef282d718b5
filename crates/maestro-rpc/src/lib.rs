//! Maestro RPC — standalone JSON-RPC 2.0 crate for Maestro.
//!
//! This crate re-exports the transport-agnostic JSON-RPC interface from
//! `maestro_core::rpc`. It exists as a standalone crate so that future
//! bindgen projects (via napi-rs or wasm-bindgen) can depend on it
//! directly without pulling in a transport adapter.
//!
//! # Example — raw JSON string
//!
//! ```ignore
//! use maestro_rpc::RpcRouter;
//!
//! let router = RpcRouter::new(app_state);
//! let response = router.handle_request(r#"{
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "agent/list",
//!     "params": {}
//! }"#).await;
//! ```
//!
//! # Example — serde_json::Value (e.g. desktop IPC)
//!
//! ```ignore
//! use maestro_rpc::RpcRouter;
//!
//! let router = RpcRouter::new(app_state);
//! let response = router.handle_value(serde_json::json!({
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "workflow/create",
//!     "params": {
//!         "definition": {
//!             "name": "Release Review",
//!             "steps": [{ "id": "draft" }]
//!         }
//!     }
//! })).await;
//! ```
//!
//! # Supported Methods
//!
//! | Domain      | Method                     | Description                         |
//! |-------------|----------------------------|-------------------------------------|
//! | workflow    | `workflow/create`          | Validate and store a definition     |
//! | workflow    | `workflow/get`             | Get a stored workflow by id         |
//! | workflow    | `workflow/list`            | List stored workflows               |
//! | workflow    | `workflow/update`          | Replace a stored definition         |
//! | workflow    | `workflow/delete`          | Delete a workflow                   |
//! | workflow    | `workflow/setDefault`      | Flag the default workflow           |
//! | execution   | `execution/start`          | Create an execution                 |
//! | execution   | `execution/run`            | Drive an execution                  |
//! | execution   | `execution/get`            | Execution plus node executions      |
//! | checkpoint  | `checkpoint/create`        | Open a decision point               |
//! | checkpoint  | `checkpoint/get`           | Get a checkpoint by id              |
//! | checkpoint  | `checkpoint/list`          | List an execution's checkpoints     |
//! | checkpoint  | `checkpoint/recordDecision`| Record a decision                   |
//! | reviewPanel | `reviewPanel/create`       | Open a review panel                 |
//! | reviewPanel | `reviewPanel/addVote`      | Append a reviewer vote              |
//! | reviewPanel | `reviewPanel/aggregate`    | Fold votes into an outcome          |
//! | reviewPanel | `reviewPanel/stats`        | Vote counts and status              |
//! | toolCall    | `toolCall/create`          | Track a tool invocation             |
//! | toolCall    | `toolCall/start`           | Mark a call running                 |
//! | toolCall    | `toolCall/complete`        | Record success                      |
//! | toolCall    | `toolCall/fail`            | Record failure                      |
//! | toolCall    | `toolCall/awaitPermission` | Park a call pending permission      |
//! | toolCall    | `toolCall/approve`         | Record an approval                  |
//! | toolCall    | `toolCall/deny`            | Record a denial                     |
//! | toolCall    | `toolCall/listByExecution` | List an execution's tool calls      |
//! | agent       | `agent/register`           | Register an agent                   |
//! | agent       | `agent/unregister`         | Remove an agent                     |
//! | agent       | `agent/list`               | List / search agents                |
//! | agent       | `agent/delegate`           | Route a task to an agent            |
//! | agent       | `agent/parseMentions`      | Resolve `@mentions` in text         |

// Re-export the core RPC types and router from maestro-core
pub use maestro_core::rpc::error::RpcError;
pub use maestro_core::rpc::router::RpcRouter;
pub use maestro_core::rpc::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, INVALID_STATE, METHOD_NOT_FOUND, NOT_FOUND, PARSE_ERROR, VALIDATION_FAILED,
};

// Re-export method param/result types for typed usage
pub mod methods {
    pub use maestro_core::rpc::methods::*;
}
