//! In-Memory Record Store
//!
//! HashMap-of-tables implementation evaluating filters with
//! [`Filter::matches`]. Used by unit tests and embedded callers that do not
//! need persistence.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::domain::models::{Row, Value};
use crate::domain::ports::RecordStore;
use crate::domain::query::{Assignment, ComputedColumn, Direction, Filter, Mutation, Select};
use crate::{Result, StorageError};

#[derive(Debug, Clone)]
struct Table {
    primary_key: String,
    rows: Vec<Row>,
    last_id: i64,
}

impl Table {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            rows: Vec::new(),
            last_id: 0,
        }
    }

    fn insert(&mut self, mut row: Row, computed: Option<&ComputedColumn>) -> Result<Value> {
        if let Some(ComputedColumn::NextInSequence(column)) = computed {
            let next = self
                .rows
                .iter()
                .filter_map(|r| r.get_i64(column))
                .max()
                .unwrap_or(0)
                + 1;
            row.insert(column.clone(), next);
        }

        let key = match row.get(&self.primary_key) {
            Some(key) if !key.is_null() => {
                if self
                    .rows
                    .iter()
                    .any(|r| r.get(&self.primary_key).is_some_and(|k| k.sql_eq(key)))
                {
                    return Err(StorageError::invalid_query(format!(
                        "Duplicate primary key {} = {}",
                        self.primary_key, key
                    )));
                }
                if let Some(id) = key.as_i64() {
                    self.last_id = self.last_id.max(id);
                }
                key.clone()
            }
            _ => {
                self.last_id += 1;
                let key = Value::Integer(self.last_id);
                row.insert(self.primary_key.clone(), key.clone());
                key
            }
        };

        self.rows.push(row);
        Ok(key)
    }

    fn update(&mut self, filter: &Filter, assignments: &[Assignment]) -> Result<usize> {
        // Evaluate into a copy so a failing assignment leaves the table untouched
        let mut rows = self.rows.clone();
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| filter.matches(r)) {
            for assignment in assignments {
                apply(row, assignment)?;
            }
            affected += 1;
        }
        self.rows = rows;
        Ok(affected)
    }

    fn delete(&mut self, filter: &Filter) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !filter.matches(r));
        before - self.rows.len()
    }

    fn apply_mutation(&mut self, mutation: &Mutation) -> Result<usize> {
        match mutation {
            Mutation::Update {
                filter,
                assignments,
            } => self.update(filter, assignments),
            Mutation::Delete { filter } => Ok(self.delete(filter)),
        }
    }
}

fn apply(row: &mut Row, assignment: &Assignment) -> Result<()> {
    match assignment {
        Assignment::Set(column, value) => {
            row.insert(column.clone(), value.clone());
        }
        Assignment::Increment(column, delta) => {
            let next = match row.get(column).unwrap_or(&Value::Null) {
                Value::Null => Value::Null,
                Value::Real(r) => Value::Real(r + *delta as f64),
                other => match other.as_i64() {
                    Some(i) => Value::Integer(i + delta),
                    None => {
                        return Err(StorageError::invalid_query(format!(
                            "Cannot increment non-numeric column {} ({})",
                            column, other
                        )))
                    }
                },
            };
            row.insert(column.clone(), next);
        }
        Assignment::Toggle(column) => {
            let next = match row.get(column).unwrap_or(&Value::Null) {
                Value::Null => Value::Null,
                other => match other.as_bool() {
                    Some(b) => Value::Bool(!b),
                    None => {
                        return Err(StorageError::invalid_query(format!(
                            "Cannot toggle non-boolean column {} ({})",
                            column, other
                        )))
                    }
                },
            };
            row.insert(column.clone(), next);
        }
    }
    Ok(())
}

/// HashMap-based [`RecordStore`]
///
/// Tables must be declared with [`InMemoryRecordStore::create_table`] before use.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table; integer keys are generated for rows inserted without one
    ///
    /// Re-declaring an existing table is a no-op.
    pub fn create_table(&self, table: &str, primary_key: &str) -> Result<()> {
        self.tables
            .write()?
            .entry(table.to_string())
            .or_insert_with(|| Table::new(primary_key));
        Ok(())
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(&Table) -> T) -> Result<T> {
        let tables = self.tables.read()?;
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::unknown_table(table))?;
        Ok(f(t))
    }

    fn write<T>(&self, table: &str, f: impl FnOnce(&mut Table) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write()?;
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::unknown_table(table))?;
        f(t)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Row>> {
        self.read(table, |t| {
            let mut rows: Vec<Row> = t
                .rows
                .iter()
                .filter(|r| query.filter.matches(r))
                .cloned()
                .collect();

            if !query.order.is_empty() {
                rows.sort_by(|a, b| {
                    query.order.iter().fold(Ordering::Equal, |acc, order| {
                        acc.then_with(|| {
                            let left = a.get(&order.column).unwrap_or(&Value::Null);
                            let right = b.get(&order.column).unwrap_or(&Value::Null);
                            match order.direction {
                                Direction::Asc => left.sort_cmp(right),
                                Direction::Desc => right.sort_cmp(left),
                            }
                        })
                    })
                });
            }

            rows.into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect()
        })
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.read(table, |t| t.rows.iter().filter(|r| filter.matches(r)).count())
    }

    async fn max(&self, table: &str, column: &str, filter: Option<&Filter>) -> Result<Option<Value>> {
        self.read(table, |t| {
            t.rows
                .iter()
                .filter(|r| filter.map_or(true, |f| f.matches(r)))
                .filter_map(|r| r.get(column))
                .filter(|v| !v.is_null())
                .max_by(|a, b| a.sort_cmp(b))
                .cloned()
        })
    }

    async fn insert(
        &self,
        table: &str,
        primary_key: &str,
        row: &Row,
        computed: Option<&ComputedColumn>,
    ) -> Result<Value> {
        self.write(table, |t| {
            if t.primary_key != primary_key {
                return Err(StorageError::invalid_query(format!(
                    "Table {} is keyed by {}, not {}",
                    table, t.primary_key, primary_key
                )));
            }
            let key = t.insert(row.clone(), computed)?;
            debug!(table, key = %key, "Inserted row");
            Ok(key)
        })
    }

    async fn update(&self, table: &str, filter: &Filter, assignments: &[Assignment]) -> Result<usize> {
        self.write(table, |t| t.update(filter, assignments))
    }

    async fn delete_raw(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.write(table, |t| Ok(t.delete(filter)))
    }

    async fn transaction(&self, table: &str, mutations: &[Mutation]) -> Result<Vec<usize>> {
        self.write(table, |t| {
            let mut staged = t.clone();
            let mut affected = Vec::with_capacity(mutations.len());
            for (i, mutation) in mutations.iter().enumerate() {
                let n = staged.apply_mutation(mutation).map_err(|err| {
                    StorageError::transaction(format!(
                        "Statement {} of {} on {} failed, rolled back",
                        i + 1,
                        mutations.len(),
                        table
                    ))
                    .with_source(err)
                })?;
                affected.push(n);
            }
            *t = staged;
            Ok(affected)
        })
    }
}
