//! Transport-agnostic JSON-RPC 2.0 surface over the engine.
//!
//! The method surface mirrors the domain, one namespace per entity:
//! `workflow/*`, `execution/*`, `checkpoint/*`, `reviewPanel/*`,
//! `toolCall/*`, `agent/*`. See [`router::RpcRouter::method_list`].

pub mod error;
pub mod methods;
pub mod router;
pub mod types;

pub use error::RpcError;
pub use router::RpcRouter;
pub use types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
