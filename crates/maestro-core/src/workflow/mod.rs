pub mod executor;
pub mod schema;
pub mod validate;

pub use executor::ExecutionEngine;
pub use schema::{OnError, Step, TriggerConfig, WorkflowDefinition};
pub use validate::validate_definition;
