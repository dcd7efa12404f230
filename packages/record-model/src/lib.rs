//! record-model: soft delete, categories, sort order and cascades over a
//! generic record store
//!
//! ## Layers
//!
//! - `domain`: `Value`/`Row`, the query vocabulary and the [`RecordStore`] port
//! - `infrastructure`: in-memory and SQLite record stores
//! - `config`: model configuration and the YAML registry schema
//! - `api`: [`Model`] handles, the sort-order and cascade engines, hooks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use record_model::api::{ModelRegistry, QueryOptions};
//! use record_model::config::{ModelConfig, RelationDescriptor};
//! use record_model::domain::Row;
//!
//! let registry = ModelRegistry::new(store)
//!     .register(
//!         ModelConfig::new("categories")
//!             .soft_delete("deleted")
//!             .sort_order("sort_order")
//!             .cascade(RelationDescriptor::to_model("items", "items")),
//!     )?
//!     .register(ModelConfig::new("items").soft_delete("deleted"))?
//!     .build()?;
//!
//! let categories = registry.model("categories")?;
//! let id = categories.insert(Row::new().with("name", "Books")).await?;
//! categories.move_up(&id, &QueryOptions::new()).await?;
//!
//! // soft-deletes the category and every item pointing at it
//! let outcome = categories.delete(Some(&[id]), &QueryOptions::new()).await?;
//! assert!(outcome.is_success());
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use api::{LifecycleOutcome, Model, ModelRegistry, QueryOptions};
pub use domain::{Filter, RecordStore, Row, Value};
pub use error::{ErrorKind, Result, StorageError};
