//! The operator executor: plan dispatch, the execution context threaded
//! through every operator, expression evaluation for `Filter`/`Projection`,
//! and the operator implementations themselves.

pub mod expr;
pub mod operators;
pub mod registry;
pub mod runtime;

pub use registry::dispatch;
pub use runtime::{execute, spawn_child, ExecutionContext};
