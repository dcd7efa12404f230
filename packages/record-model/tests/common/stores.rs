//! Record store wrapper for failure injection and query accounting

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use record_model::domain::{
    Assignment, ComputedColumn, Filter, Mutation, RecordStore, Row, Select, Value,
};
use record_model::infrastructure::InMemoryRecordStore;
use record_model::Result;

/// In-memory store that counts `count` queries and can be told to break
/// every transaction on its last statement
#[derive(Clone)]
pub struct InstrumentedStore {
    inner: InMemoryRecordStore,
    count_queries: Arc<AtomicUsize>,
    break_transactions: Arc<AtomicBool>,
}

impl InstrumentedStore {
    pub fn new(inner: InMemoryRecordStore) -> Self {
        Self {
            inner,
            count_queries: Arc::new(AtomicUsize::new(0)),
            break_transactions: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn count_queries(&self) -> usize {
        self.count_queries.load(Ordering::SeqCst)
    }

    pub fn break_transactions(&self, broken: bool) {
        self.break_transactions.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for InstrumentedStore {
    async fn select(&self, table: &str, query: &Select) -> Result<Vec<Row>> {
        self.inner.select(table, query).await
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.count(table, filter).await
    }

    async fn max(&self, table: &str, column: &str, filter: Option<&Filter>) -> Result<Option<Value>> {
        self.inner.max(table, column, filter).await
    }

    async fn insert(
        &self,
        table: &str,
        primary_key: &str,
        row: &Row,
        computed: Option<&ComputedColumn>,
    ) -> Result<Value> {
        self.inner.insert(table, primary_key, row, computed).await
    }

    async fn update(&self, table: &str, filter: &Filter, assignments: &[Assignment]) -> Result<usize> {
        self.inner.update(table, filter, assignments).await
    }

    async fn delete_raw(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.inner.delete_raw(table, filter).await
    }

    async fn transaction(&self, table: &str, mutations: &[Mutation]) -> Result<Vec<usize>> {
        if !self.break_transactions.load(Ordering::SeqCst) {
            return self.inner.transaction(table, mutations).await;
        }
        // runs after the real statements: text columns cannot be incremented
        let mut broken = mutations.to_vec();
        broken.push(Mutation::update(
            Filter::All,
            vec![Assignment::increment("name", 1)],
        ));
        self.inner.transaction(table, &broken).await
    }
}
