//! Test fixtures: stores, model configurations and seeded rows

use std::sync::Arc;

use record_model::api::{Model, ModelRegistry, QueryOptions};
use record_model::config::{KeyMapping, ModelConfig, RelationDescriptor};
use record_model::domain::{RecordStore, Row, Value};
use record_model::infrastructure::InMemoryRecordStore;

/// Install a test subscriber once (`RUST_LOG=record_model=debug` for output)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory store with every fixture table declared
pub fn memory_store() -> InMemoryRecordStore {
    let store = InMemoryRecordStore::new();
    for (table, pk) in [
        ("categories", "category_id"),
        ("items", "item_id"),
        ("tags", "tag_id"),
        ("pages", "page_id"),
        ("notes", "note_id"),
        ("events", "event_id"),
    ] {
        store.create_table(table, pk).unwrap();
    }
    store
}

/// Nested categories: soft delete, sort order, cascading to items and children
pub fn categories_config() -> ModelConfig {
    ModelConfig::new("categories")
        .soft_delete("deleted")
        .sort_order("sort_order")
        .cascade(RelationDescriptor::to_model("items", "items"))
        .cascade(RelationDescriptor::to_self("children").key(KeyMapping::foreign("parent_id")))
}

/// Items: soft delete, category scoped, sorted, hard-cascading to tags
pub fn items_config() -> ModelConfig {
    ModelConfig::new("items")
        .soft_delete("deleted")
        .category("category_id")
        .sort_order("sort_order")
        .cascade(RelationDescriptor::to_model("tags", "tags").hard_delete(true))
}

/// Tags: plain table, physically deleted
pub fn tags_config() -> ModelConfig {
    ModelConfig::new("tags")
}

/// Pages: sorted, no soft delete
pub fn pages_config() -> ModelConfig {
    ModelConfig::new("pages").sort_order("sort_order")
}

/// Notes: soft delete only
pub fn notes_config() -> ModelConfig {
    ModelConfig::new("notes").soft_delete("deleted")
}

pub fn events_config() -> ModelConfig {
    ModelConfig::new("events").soft_delete("deleted")
}

pub fn registry_on(store: InMemoryRecordStore) -> Arc<ModelRegistry> {
    base_registry(store).build().unwrap()
}

/// Registry with every fixture model, still open for hooks
pub fn base_registry(store: InMemoryRecordStore) -> ModelRegistry {
    registry_over(Arc::new(store))
}

/// Every fixture model over any store
pub fn registry_over(store: Arc<dyn RecordStore>) -> ModelRegistry {
    ModelRegistry::new(store)
        .register(categories_config())
        .unwrap()
        .register(items_config())
        .unwrap()
        .register(tags_config())
        .unwrap()
        .register(pages_config())
        .unwrap()
        .register(notes_config())
        .unwrap()
        .register(events_config())
        .unwrap()
}

pub fn registry() -> Arc<ModelRegistry> {
    registry_on(memory_store())
}

/// Insert `n` rows built by `row(i)`; returns their keys
pub async fn seed(model: &Model, n: usize, row: impl Fn(usize) -> Row) -> Vec<Value> {
    let mut keys = Vec::with_capacity(n);
    for i in 0..n {
        keys.push(model.insert(row(i)).await.unwrap());
    }
    keys
}

/// Insert `n` rows named `row-<i>`
pub async fn seed_named(model: &Model, n: usize) -> Vec<Value> {
    seed(model, n, |i| Row::new().with("name", format!("row-{}", i))).await
}

/// (key, sort position) of every row visible under `options`, in sort order
pub async fn sequence(model: &Model, options: &QueryOptions) -> Vec<(i64, i64)> {
    model
        .get(None, options)
        .await
        .unwrap()
        .rows
        .iter()
        .map(|row| {
            (
                row.get_i64(model.primary_key()).unwrap(),
                row.get_i64("sort_order").unwrap(),
            )
        })
        .collect()
}

/// Keys visible under `options`, in sort order
pub async fn keys(model: &Model, options: &QueryOptions) -> Vec<i64> {
    sequence(model, options)
        .await
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

pub async fn row(model: &Model, key: i64) -> Row {
    model
        .find(&Value::Integer(key), &QueryOptions::new().with_deleted())
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("row {} of {} missing", key, model.name()))
}

pub fn ids(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}
