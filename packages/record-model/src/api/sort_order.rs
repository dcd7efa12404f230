//! Sort-order engine
//!
//! Each table with a sort-order column keeps one dense sequence `1..=N` over
//! all of its rows: every category and soft-deleted rows included. Scoped
//! views (one category, live rows only) are ascending subsequences of it, so
//! a soft-deleted row keeps its slot and an undelete can never collide with
//! a live row.
//!
//! Moves look up the neighbour inside the caller's scope and then shift the
//! whole block between the two positions, which keeps the unscoped sequence
//! dense even when rows outside the scope lie in between.
//!
//! The engine reads positions before it opens its write transaction, so
//! callers must serialize operations on one table. [`Model`] does this with
//! the registry's per-table sequence lock; code driving `SortOrder` directly
//! takes that responsibility itself.
//!
//! [`Model`]: super::model::Model

use tracing::debug;

use crate::domain::{Assignment, Direction, Filter, Mutation, OrderBy, RecordStore, Row, Select, Value};
use crate::Result;

/// Sort-order operations on one table
pub struct SortOrder<'a> {
    store: &'a dyn RecordStore,
    table: &'a str,
    primary_key: &'a str,
    column: &'a str,
}

impl<'a> SortOrder<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        table: &'a str,
        primary_key: &'a str,
        column: &'a str,
    ) -> Self {
        Self {
            store,
            table,
            primary_key,
            column,
        }
    }

    /// Current position of `key`, ignoring every scope
    pub async fn position(&self, key: &Value) -> Result<Option<i64>> {
        let rows = self
            .store
            .select(
                self.table,
                &Select::new(Filter::eq(self.primary_key, key.clone())).limit(1),
            )
            .await?;
        Ok(rows.first().and_then(|row| row.get_i64(self.column)))
    }

    /// Nearest position before/after `position` among rows matching `scope`
    async fn neighbour(&self, position: i64, scope: &Filter, direction: Direction) -> Result<Option<i64>> {
        let (bound, order) = match direction {
            Direction::Desc => (Filter::lt(self.column, position), OrderBy::desc(self.column)),
            Direction::Asc => (Filter::gt(self.column, position), OrderBy::asc(self.column)),
        };
        let rows = self
            .store
            .select(
                self.table,
                &Select::new(scope.clone().and(bound)).order_by(order).limit(1),
            )
            .await?;
        Ok(rows.first().and_then(|row| row.get_i64(self.column)))
    }

    /// Move `key` one place up within `scope`; `false` at the first position
    /// or for an unknown key
    pub async fn move_up(&self, key: &Value, scope: &Filter) -> Result<bool> {
        let Some(current) = self.position(key).await? else {
            debug!(table = self.table, key = %key, "move_up: no such row");
            return Ok(false);
        };
        if current <= 1 {
            debug!(table = self.table, key = %key, "move_up: already first");
            return Ok(false);
        }
        let Some(target) = self.neighbour(current, scope, Direction::Desc).await? else {
            debug!(table = self.table, key = %key, "move_up: first within scope");
            return Ok(false);
        };

        // [target, current) shifts down one place, the row takes `target`
        self.store
            .transaction(
                self.table,
                &[
                    Mutation::update(
                        Filter::ge(self.column, target).and(Filter::lt(self.column, current)),
                        vec![Assignment::increment(self.column, 1)],
                    ),
                    Mutation::update(
                        Filter::eq(self.primary_key, key.clone()),
                        vec![Assignment::set(self.column, target)],
                    ),
                ],
            )
            .await?;

        debug!(table = self.table, key = %key, from = current, to = target, "Moved up");
        Ok(true)
    }

    /// Move `key` one place down within `scope`; `false` at the last position
    /// or for an unknown key
    pub async fn move_down(&self, key: &Value, scope: &Filter) -> Result<bool> {
        let Some(current) = self.position(key).await? else {
            debug!(table = self.table, key = %key, "move_down: no such row");
            return Ok(false);
        };
        let last = self
            .store
            .max(self.table, self.column, None)
            .await?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        if current >= last {
            debug!(table = self.table, key = %key, "move_down: already last");
            return Ok(false);
        }
        let Some(target) = self.neighbour(current, scope, Direction::Asc).await? else {
            debug!(table = self.table, key = %key, "move_down: last within scope");
            return Ok(false);
        };

        // (current, target] shifts up one place, the row takes `target`
        self.store
            .transaction(
                self.table,
                &[
                    Mutation::update(
                        Filter::gt(self.column, current).and(Filter::le(self.column, target)),
                        vec![Assignment::increment(self.column, -1)],
                    ),
                    Mutation::update(
                        Filter::eq(self.primary_key, key.clone()),
                        vec![Assignment::set(self.column, target)],
                    ),
                ],
            )
            .await?;

        debug!(table = self.table, key = %key, from = current, to = target, "Moved down");
        Ok(true)
    }

    /// Statements physically removing `rows` while closing their gaps
    ///
    /// Rows are removed highest position first, so the positions of the
    /// remaining victims are still valid when their turn comes.
    pub fn removal(&self, rows: &[Row]) -> Vec<Mutation> {
        let mut victims: Vec<(&Value, Option<i64>)> = rows
            .iter()
            .filter_map(|row| {
                let key = row.get(self.primary_key)?;
                Some((key, row.get_i64(self.column)))
            })
            .collect();
        victims.sort_by(|a, b| b.1.cmp(&a.1));

        let mut mutations = Vec::with_capacity(victims.len() * 2);
        for (key, position) in victims {
            if let Some(position) = position {
                mutations.push(Mutation::update(
                    Filter::gt(self.column, position),
                    vec![Assignment::increment(self.column, -1)],
                ));
            }
            mutations.push(Mutation::delete(Filter::eq(self.primary_key, key.clone())));
        }
        mutations
    }

    /// Renumber the table to `1..=N` in current order (ties by primary key);
    /// returns the number of rows whose position changed
    pub async fn reindex(&self) -> Result<usize> {
        let rows = self
            .store
            .select(
                self.table,
                &Select::default()
                    .order_by(OrderBy::asc(self.column))
                    .order_by(OrderBy::asc(self.primary_key)),
            )
            .await?;

        let mutations: Vec<Mutation> = rows
            .iter()
            .zip(1..)
            .filter(|(row, expected)| row.get_i64(self.column) != Some(*expected))
            .filter_map(|(row, expected)| {
                let key = row.get(self.primary_key)?.clone();
                Some(Mutation::update(
                    Filter::eq(self.primary_key, key),
                    vec![Assignment::set(self.column, expected)],
                ))
            })
            .collect();

        if mutations.is_empty() {
            return Ok(0);
        }
        self.store.transaction(self.table, &mutations).await?;
        Ok(mutations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComputedColumn;
    use crate::infrastructure::InMemoryRecordStore;

    async fn store_with(n: usize) -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new();
        store.create_table("items", "item_id").unwrap();
        let seq = ComputedColumn::NextInSequence("sort_order".into());
        for i in 0..n {
            store
                .insert(
                    "items",
                    "item_id",
                    &Row::new().with("category_id", (i % 2) as i64),
                    Some(&seq),
                )
                .await
                .unwrap();
        }
        store
    }

    async fn order(store: &InMemoryRecordStore) -> Vec<i64> {
        store
            .select("items", &Select::default().order_by(OrderBy::asc("sort_order")))
            .await
            .unwrap()
            .iter()
            .map(|r| r.get_i64("item_id").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_move_up_swaps_adjacent() {
        let store = store_with(3).await;
        let engine = SortOrder::new(&store, "items", "item_id", "sort_order");

        assert!(engine.move_up(&Value::Integer(3), &Filter::All).await.unwrap());
        assert_eq!(order(&store).await, vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_move_up_in_scope_shifts_block() {
        // category 0: ids 1, 3, 5; category 1: ids 2, 4
        let store = store_with(5).await;
        let engine = SortOrder::new(&store, "items", "item_id", "sort_order");

        let scope = Filter::eq("category_id", 0);
        assert!(engine.move_up(&Value::Integer(5), &scope).await.unwrap());
        assert_eq!(order(&store).await, vec![1, 2, 5, 3, 4]);
    }

    #[tokio::test]
    async fn test_move_down_boundaries() {
        let store = store_with(3).await;
        let engine = SortOrder::new(&store, "items", "item_id", "sort_order");

        assert!(!engine.move_down(&Value::Integer(3), &Filter::All).await.unwrap());
        assert!(!engine.move_up(&Value::Integer(1), &Filter::All).await.unwrap());
        assert!(!engine.move_up(&Value::Integer(99), &Filter::All).await.unwrap());
        assert_eq!(order(&store).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_removal_of_several_rows_keeps_sequence_dense() {
        let store = store_with(5).await;
        let engine = SortOrder::new(&store, "items", "item_id", "sort_order");

        let victims = store
            .select(
                "items",
                &Select::new(Filter::is_in("item_id", vec![Value::Integer(2), Value::Integer(4)])),
            )
            .await
            .unwrap();
        store
            .transaction("items", &engine.removal(&victims))
            .await
            .unwrap();

        let rows = store
            .select("items", &Select::default().order_by(OrderBy::asc("sort_order")))
            .await
            .unwrap();
        let positions: Vec<_> = rows.iter().map(|r| r.get_i64("sort_order").unwrap()).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(order(&store).await, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_reindex_compacts_gaps() {
        let store = store_with(3).await;
        store
            .update(
                "items",
                &Filter::eq("item_id", 3),
                &[Assignment::set("sort_order", 10)],
            )
            .await
            .unwrap();
        store
            .update(
                "items",
                &Filter::eq("item_id", 1),
                &[Assignment::set("sort_order", 7)],
            )
            .await
            .unwrap();

        let engine = SortOrder::new(&store, "items", "item_id", "sort_order");
        assert_eq!(engine.reindex().await.unwrap(), 3);
        assert_eq!(order(&store).await, vec![2, 1, 3]);
        assert_eq!(engine.reindex().await.unwrap(), 0);
    }
}
