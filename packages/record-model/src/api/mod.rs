//! Model layer
//!
//! - `options`: per-call [`QueryOptions`] and the filter composer
//! - `sort_order`: dense sort sequence maintenance
//! - `cascade`: delete/undelete propagation to dependent models
//! - `hooks`: before/after lifecycle hooks
//! - `registry`: model configurations, hooks and the handle factory
//! - `model`: the [`Model`] handle

pub mod cascade;
pub mod hooks;
pub mod model;
pub mod options;
pub mod pagination;
pub mod registry;
pub mod sort_order;
pub mod tools;

pub use cascade::{
    dependent_filter, CascadeReport, LifecycleOp, PropagationContext, RelationReport,
    RelationStatus,
};
pub use hooks::{HookDecision, LifecycleHook};
pub use model::{LifecycleOutcome, Model, MutationSummary, DATE_FORMAT};
pub use options::{compose_filter, Pagination, QueryOptions, Visibility};
pub use pagination::{Page, PageWindow};
pub use registry::ModelRegistry;
pub use sort_order::SortOrder;
pub use tools::{diff_rows, index_by};
