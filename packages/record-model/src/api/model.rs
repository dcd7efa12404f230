//! Model handle
//!
//! [`Model`] is the entry point for every entity operation on one table:
//! reads through the filter composer, inserts into the sort sequence,
//! soft/hard delete and undelete with hooks and cascade, and reordering.
//! Handles carry no per-call state and are cheap to clone.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cascade::{self, CascadeReport, LifecycleOp, PropagationContext};
use super::hooks::HookDecision;
use super::options::{compose_filter, QueryOptions};
use super::pagination::{Page, PageWindow};
use super::registry::ModelRegistry;
use super::sort_order::SortOrder;
use super::tools::diff_rows;
use crate::config::ModelConfig;
use crate::domain::{
    Assignment, ComputedColumn, Filter, Mutation, OrderBy, RecordStore, Row, Select, Value,
};
use crate::Result;

/// Date format used by [`Model::get_within_date_range`]
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a completed delete/undelete did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationSummary {
    /// Primary keys of the rows changed on this model
    pub keys: Vec<Value>,
    /// Rows changed on this model (dependents are in `cascade`)
    pub affected: usize,
    pub cascade: CascadeReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LifecycleOutcome {
    Completed(MutationSummary),
    /// A before-hook vetoed; nothing changed
    Vetoed,
    /// Undelete on a model without a soft-delete column
    Unsupported,
}

impl LifecycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LifecycleOutcome::Completed(_))
    }

    pub fn summary(&self) -> Option<&MutationSummary> {
        match self {
            LifecycleOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }

    /// Rows changed on the model itself (0 unless completed)
    pub fn affected(&self) -> usize {
        self.summary().map_or(0, |s| s.affected)
    }
}

/// Handle on one registered model
#[derive(Clone)]
pub struct Model {
    registry: Arc<ModelRegistry>,
    config: Arc<ModelConfig>,
    primary_key: String,
}

impl Model {
    pub(crate) fn new(registry: Arc<ModelRegistry>, config: Arc<ModelConfig>) -> Self {
        let primary_key = config.primary_key().into_owned();
        Self {
            registry,
            config,
            primary_key,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn table(&self) -> &str {
        self.config.table()
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    fn store(&self) -> &dyn RecordStore {
        self.registry.store().as_ref()
    }

    fn sort_order(&self) -> Option<SortOrder<'_>> {
        self.config
            .sort_order_column
            .as_deref()
            .map(|column| SortOrder::new(self.store(), self.table(), &self.primary_key, column))
    }

    fn key_filter(&self, keys: Option<&[Value]>) -> Filter {
        match keys {
            None => Filter::All,
            Some([key]) => Filter::eq(&self.primary_key, key.clone()),
            Some(keys) => Filter::is_in(&self.primary_key, keys.iter().cloned()),
        }
    }

    fn read_filter(&self, keys: Option<&[Value]>, options: &QueryOptions) -> Filter {
        self.key_filter(keys).and(compose_filter(&self.config, options))
    }

    fn default_order(&self) -> Vec<OrderBy> {
        let mut order = Vec::with_capacity(2);
        if let Some(column) = &self.config.sort_order_column {
            order.push(OrderBy::asc(column));
        }
        order.push(OrderBy::asc(&self.primary_key));
        order
    }

    fn keys_of(&self, rows: &[Row]) -> Vec<Value> {
        rows.iter()
            .filter_map(|row| row.get(&self.primary_key).cloned())
            .collect()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reads
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Rows matching `keys` (all when `None`) and `options`, in sort order
    pub async fn get(&self, keys: Option<&[Value]>, options: &QueryOptions) -> Result<Page> {
        let filter = self.read_filter(keys, options);
        let mut select = Select::new(filter);
        select.order = self.default_order();

        // page size 0 leaves pagination inert: no count query
        let window = match options.pagination().filter(|p| p.page_size > 0) {
            Some(pagination) => {
                let total = self.store().count(self.table(), &select.filter).await?;
                PageWindow::compute(pagination, total)
            }
            None => None,
        };

        match window {
            Some(window) => {
                let rows = self
                    .store()
                    .select(self.table(), &select.limit(window.limit).offset(window.offset))
                    .await?;
                Ok(Page {
                    rows,
                    current_page: window.current_page,
                    total_pages: window.total_pages,
                })
            }
            None => Ok(Page::single(self.store().select(self.table(), &select).await?)),
        }
    }

    pub async fn find(&self, key: &Value, options: &QueryOptions) -> Result<Option<Row>> {
        let page = self.get(Some(std::slice::from_ref(key)), options).await?;
        Ok(page.rows.into_iter().next())
    }

    pub async fn count(&self, options: &QueryOptions) -> Result<usize> {
        self.store()
            .count(self.table(), &self.read_filter(None, options))
            .await
    }

    pub async fn exists(&self, keys: Option<&[Value]>, options: &QueryOptions) -> Result<bool> {
        let count = self
            .store()
            .count(self.table(), &self.read_filter(keys, options))
            .await?;
        Ok(count > 0)
    }

    /// Rows with `from_column <= at` and `to_column >= at` (either bound optional)
    pub async fn get_within_date_range(
        &self,
        from_column: Option<&str>,
        to_column: Option<&str>,
        at: DateTime<Utc>,
        options: &QueryOptions,
    ) -> Result<Page> {
        let date = at.format(DATE_FORMAT).to_string();
        let mut options = options.clone();
        if let Some(column) = from_column {
            options = options.filter(Filter::le(column, date.as_str()));
        }
        if let Some(column) = to_column {
            options = options.filter(Filter::ge(column, date.as_str()));
        }
        self.get(None, &options).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Writes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Insert a row at the end of the sort sequence; returns its primary key
    ///
    /// A row without a soft-delete flag is inserted live.
    pub async fn insert(&self, mut row: Row) -> Result<Value> {
        if let Some(column) = &self.config.soft_delete_column {
            if row.get(column).map_or(true, Value::is_null) {
                row.insert(column.clone(), false);
            }
        }
        let computed = self
            .config
            .sort_order_column
            .as_ref()
            .map(|column| ComputedColumn::NextInSequence(column.clone()));

        self.store()
            .insert(self.table(), &self.primary_key, &row, computed.as_ref())
            .await
    }

    pub async fn update(
        &self,
        keys: Option<&[Value]>,
        values: &Row,
        options: &QueryOptions,
    ) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        self.store()
            .update(
                self.table(),
                &self.read_filter(keys, options),
                &Assignment::from_row(values),
            )
            .await
    }

    /// Write only the columns that differ between `old` and `new`; returns them
    pub async fn save(&self, key: &Value, old: &Row, new: &Row) -> Result<Row> {
        let changes = diff_rows(old, new);
        if !changes.is_empty() {
            self.store()
                .update(
                    self.table(),
                    &Filter::eq(&self.primary_key, key.clone()),
                    &Assignment::from_row(&changes),
                )
                .await?;
        }
        Ok(changes)
    }

    /// `column = NOT column` on matching rows
    pub async fn toggle(
        &self,
        column: &str,
        keys: Option<&[Value]>,
        options: &QueryOptions,
    ) -> Result<usize> {
        self.store()
            .update(
                self.table(),
                &self.read_filter(keys, options),
                &[Assignment::toggle(column)],
            )
            .await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Delete / undelete
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Soft delete (or hard delete without a soft-delete column or with the
    /// override), then cascade to dependent models
    pub async fn delete(&self, keys: Option<&[Value]>, options: &QueryOptions) -> Result<LifecycleOutcome> {
        let mut ctx = PropagationContext::new();
        self.run_lifecycle(LifecycleOp::Delete, keys, options, &mut ctx)
            .await
    }

    /// Clear the soft-delete flag, then cascade to dependent models
    pub async fn undelete(&self, keys: Option<&[Value]>, options: &QueryOptions) -> Result<LifecycleOutcome> {
        let mut ctx = PropagationContext::new();
        self.run_lifecycle(LifecycleOp::Undelete, keys, options, &mut ctx)
            .await
    }

    pub(crate) fn run_lifecycle<'a>(
        &'a self,
        op: LifecycleOp,
        keys: Option<&'a [Value]>,
        options: &'a QueryOptions,
        ctx: &'a mut PropagationContext,
    ) -> BoxFuture<'a, Result<LifecycleOutcome>> {
        async move {
            if op == LifecycleOp::Undelete && self.config.soft_delete_column.is_none() {
                debug!(model = %self.name(), "undelete: no soft-delete column");
                return Ok(LifecycleOutcome::Unsupported);
            }

            let effective = match op {
                LifecycleOp::Delete => options.for_delete(),
                LifecycleOp::Undelete => options.for_undelete(),
            };
            let mut select = Select::new(self.read_filter(keys, &effective));
            select.order = self.default_order();

            let mut rows = self.store().select(self.table(), &select).await?;
            rows.retain(|row| {
                row.get(&self.primary_key)
                    .is_some_and(|key| !ctx.is_visited(self.table(), op, key))
            });
            debug!(model = %self.name(), %op, rows = rows.len(), "Resolved rows");

            let mut keys = self.keys_of(&rows);
            if keys.is_empty() {
                return Ok(LifecycleOutcome::Completed(MutationSummary {
                    keys,
                    affected: 0,
                    cascade: CascadeReport::default(),
                }));
            }

            // Before-hooks may only narrow the resolved set
            for hook in self.registry.hooks(self.name()) {
                let decision = match op {
                    LifecycleOp::Delete => hook.before_delete(&keys),
                    LifecycleOp::Undelete => hook.before_undelete(&keys),
                };
                match decision {
                    HookDecision::Veto => {
                        warn!(model = %self.name(), %op, keys = keys.len(), "Vetoed by hook");
                        return Ok(LifecycleOutcome::Vetoed);
                    }
                    HookDecision::Proceed(next) => {
                        keys = next
                            .into_iter()
                            .filter(|k| keys.iter().any(|prev| prev.sql_eq(k)))
                            .collect();
                    }
                }
            }
            rows.retain(|row| {
                row.get(&self.primary_key)
                    .is_some_and(|key| keys.iter().any(|k| k.sql_eq(key)))
            });
            let keys = self.keys_of(&rows);
            ctx.mark(self.table(), op, &keys);

            let affected = if keys.is_empty() {
                0
            } else {
                self.mutate(op, &keys, options.is_hard_delete()).await?
            };

            for hook in self.registry.hooks(self.name()) {
                match op {
                    LifecycleOp::Delete => hook.after_delete(&keys, affected),
                    LifecycleOp::Undelete => hook.after_undelete(&keys, affected),
                }
            }

            let cascade = if keys.is_empty() {
                CascadeReport::default()
            } else {
                cascade::propagate(self, &rows, op, ctx).await
            };

            info!(
                model = %self.name(),
                %op,
                affected,
                cascaded = cascade.total_affected(),
                "Lifecycle operation completed"
            );
            Ok(LifecycleOutcome::Completed(MutationSummary {
                keys,
                affected,
                cascade,
            }))
        }
        .boxed()
    }

    async fn mutate(&self, op: LifecycleOp, keys: &[Value], hard: bool) -> Result<usize> {
        let by_key = Filter::is_in(&self.primary_key, keys.iter().cloned());

        match (op, &self.config.soft_delete_column) {
            (LifecycleOp::Undelete, Some(column)) => {
                self.store()
                    .update(self.table(), &by_key, &[Assignment::set(column, false)])
                    .await
            }
            (LifecycleOp::Delete, Some(column)) if !hard => {
                self.store()
                    .update(self.table(), &by_key, &[Assignment::set(column, true)])
                    .await
            }
            (LifecycleOp::Delete, _) => match self.sort_order() {
                Some(engine) => {
                    // positions may have moved since resolution; re-read them
                    // under the sequence lock
                    let _sequence = self.registry.lock_sequence(self.table()).await;
                    let current = self
                        .store()
                        .select(self.table(), &Select::new(by_key.clone()))
                        .await?;
                    let mutations = engine.removal(&current);
                    let counts = self.store().transaction(self.table(), &mutations).await?;
                    Ok(mutations
                        .iter()
                        .zip(counts)
                        .filter(|(m, _)| matches!(m, Mutation::Delete { .. }))
                        .map(|(_, n)| n)
                        .sum())
                }
                None => self.store().delete_raw(self.table(), &by_key).await,
            },
            (LifecycleOp::Undelete, None) => Ok(0),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Sort order
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// One place towards the start within the scope of `options`; `false`
    /// without a sort-order column, at the first position, or for an unknown key
    ///
    /// Moves on handles from the same registry are serialized per table, so
    /// concurrent tasks may share and clone handles freely.
    pub async fn move_up(&self, key: &Value, options: &QueryOptions) -> Result<bool> {
        match self.sort_order() {
            Some(engine) => {
                let _sequence = self.registry.lock_sequence(self.table()).await;
                engine
                    .move_up(key, &compose_filter(&self.config, options))
                    .await
            }
            None => Ok(false),
        }
    }

    /// One place towards the end within the scope of `options`
    pub async fn move_down(&self, key: &Value, options: &QueryOptions) -> Result<bool> {
        match self.sort_order() {
            Some(engine) => {
                let _sequence = self.registry.lock_sequence(self.table()).await;
                engine
                    .move_down(key, &compose_filter(&self.config, options))
                    .await
            }
            None => Ok(false),
        }
    }

    /// Compact the sort sequence to `1..=N`; returns rows renumbered
    pub async fn reindex(&self) -> Result<usize> {
        match self.sort_order() {
            Some(engine) => {
                let _sequence = self.registry.lock_sequence(self.table()).await;
                let renumbered = engine.reindex().await?;
                info!(model = %self.name(), renumbered, "Reindexed sort order");
                Ok(renumbered)
            }
            None => Ok(0),
        }
    }
}
