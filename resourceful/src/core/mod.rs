// Resource controller and everything it drives: options, hooks, query plans,
// plan assembly from the query string and relation writes.

pub mod assembler;
pub mod hooks;
pub mod options;
pub mod plan;
pub mod resource;
pub(crate) mod transform;

// Re-export commonly used items
pub use assembler::QueryAssembler;
pub use hooks::{NoHooks, ResourceHooks};
pub use options::{DEFAULT_MAX_TAKE, DEFAULT_TAKE, Operation, ResourceOptions};
pub use plan::QueryPlan;
pub use resource::Resource;
