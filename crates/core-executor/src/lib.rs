pub mod binder;
pub mod error;
pub mod materialize;
pub mod models;
pub mod normalize;
pub mod service;
pub mod tree;

#[cfg(test)]
pub mod tests;

pub use binder::{Binder, FromCell};
pub use error::{ExecutionError, ExecutionResult};
pub use models::{BoundRows, Cell, ColumnCase, NULL_SENTINEL, Record};
pub use service::Executor;
pub use tree::{TreeColumns, TreeNode};
