//! Domain layer
//!
//! # Domain Models
//!
//! - `Value`: a single column value with SQL comparison semantics
//! - `Row`: column name → value
//!
//! # Query Vocabulary
//!
//! - `Filter`, `Assignment`, `OrderBy`, `Select`, `Mutation`, `ComputedColumn`
//!
//! # Port Trait
//!
//! - `RecordStore`: generic CRUD + transaction capability consumed by the model layer

pub mod models;
pub mod ports;
pub mod query;

pub use models::{Row, Value};
pub use ports::RecordStore;
pub use query::{Assignment, ComputedColumn, Direction, Filter, Mutation, OrderBy, Select};
