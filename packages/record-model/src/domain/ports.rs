//! Record Store Port (Trait Interface)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Embedded / tests: InMemory
//! - File-backed: SQLite
//!
//! The model layer never talks to a database directly; every read and
//! mutation goes through this trait.

use async_trait::async_trait;

use super::models::{Row, Value};
use super::query::{Assignment, ComputedColumn, Filter, Mutation, Select};
use crate::Result;

/// Record Store Port (Primary Interface)
///
/// Generic CRUD over named tables. Implementations must make
/// [`RecordStore::transaction`] all-or-nothing.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reads
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Rows matching the query, ordered and windowed as requested
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Row>>;

    /// Number of rows matching `filter` (ignores any window)
    async fn count(&self, table: &str, filter: &Filter) -> Result<usize>;

    /// `MAX(column)` over rows matching `filter` (whole table when `None`)
    ///
    /// Returns `None` for an empty row set.
    async fn max(&self, table: &str, column: &str, filter: Option<&Filter>)
        -> Result<Option<Value>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Single-statement writes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert one row
    ///
    /// `computed` is evaluated by the store inside the same statement, so no
    /// other writer can slip in between reading the aggregate and inserting.
    /// Returns the primary key: the explicit value from `row`, or the
    /// generated one.
    async fn insert(
        &self,
        table: &str,
        primary_key: &str,
        row: &Row,
        computed: Option<&ComputedColumn>,
    ) -> Result<Value>;

    /// Apply `assignments` to every row matching `filter`; returns rows affected
    async fn update(&self, table: &str, filter: &Filter, assignments: &[Assignment])
        -> Result<usize>;

    /// Physically remove rows matching `filter`; returns rows removed
    async fn delete_raw(&self, table: &str, filter: &Filter) -> Result<usize>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Transactions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Execute `mutations` in order inside one transaction
    ///
    /// Commits only if every statement succeeds; otherwise nothing is
    /// applied and the error is returned. Returns rows affected per statement.
    async fn transaction(&self, table: &str, mutations: &[Mutation]) -> Result<Vec<usize>>;
}
