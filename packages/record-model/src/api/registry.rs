//! Model registry
//!
//! Holds every model configuration, its hooks and the shared record store.
//! The registry is the factory the cascade engine uses to reach dependent
//! models: each call to [`ModelRegistry::model`] yields an independent
//! handle, which is also how a self-referencing relation gets a second
//! handle onto its own table.
//!
//! The registry also owns one sequence lock per table. Every operation that
//! rewrites sort positions (moves, sorted hard deletes, reindex) holds it
//! from its first read to its last write, so handles cloned across tasks
//! cannot interleave and leave duplicates. The lock is per registry: writers
//! going through another registry or straight to the store are not
//! serialized against it.

use futures::lock::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::hooks::LifecycleHook;
use super::model::Model;
use crate::config::{ConfigError, ModelConfig, RegistryConfigV1};
use crate::domain::RecordStore;
use crate::{Result, StorageError};

/// Registry builder and model factory
///
/// # Examples
///
/// ```rust
/// use record_model::api::ModelRegistry;
/// use record_model::config::ModelConfig;
/// use record_model::infrastructure::InMemoryRecordStore;
/// use std::sync::Arc;
///
/// let store = InMemoryRecordStore::new();
/// store.create_table("items", "item_id").unwrap();
///
/// let registry = ModelRegistry::new(Arc::new(store))
///     .register(ModelConfig::new("items").soft_delete("deleted"))
///     .unwrap()
///     .build()
///     .unwrap();
/// assert!(registry.model("items").is_ok());
/// ```
pub struct ModelRegistry {
    store: Arc<dyn RecordStore>,
    models: HashMap<String, Arc<ModelConfig>>,
    hooks: HashMap<String, Vec<Arc<dyn LifecycleHook>>>,
    sequence_locks: HashMap<String, Mutex<()>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            models: HashMap::new(),
            hooks: HashMap::new(),
            sequence_locks: HashMap::new(),
        }
    }

    /// Registry for every model of a loaded YAML document
    pub fn from_config(store: Arc<dyn RecordStore>, config: RegistryConfigV1) -> Result<Arc<Self>> {
        config.validate()?;
        config
            .models
            .into_iter()
            .try_fold(Self::new(store), Self::register)?
            .build()
    }

    /// Add a model (validated on its own; relation targets are checked by
    /// [`build`](Self::build))
    pub fn register(mut self, config: ModelConfig) -> Result<Self> {
        config.validate()?;
        if self.models.contains_key(&config.name) {
            return Err(ConfigError::DuplicateModel(config.name).into());
        }
        debug!(model = %config.name, table = %config.table(), "Registered model");
        self.sequence_locks
            .entry(config.table().to_string())
            .or_insert_with(|| Mutex::new(()));
        self.models.insert(config.name.clone(), Arc::new(config));
        Ok(self)
    }

    /// Append a hook to a registered model; hooks run in registration order
    pub fn hook(mut self, model: &str, hook: impl LifecycleHook + 'static) -> Result<Self> {
        if !self.models.contains_key(model) {
            return Err(StorageError::unknown_model(model));
        }
        self.hooks
            .entry(model.to_string())
            .or_default()
            .push(Arc::new(hook));
        Ok(self)
    }

    /// Check relation targets across models and freeze the registry
    pub fn build(self) -> Result<Arc<Self>> {
        for config in self.models.values() {
            for relation in &config.cascade {
                if let Some(target) = &relation.model {
                    if !self.models.contains_key(target) {
                        return Err(ConfigError::UnknownRelationTarget {
                            model: config.name.clone(),
                            relation: relation.name.clone(),
                            target: target.clone(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(Arc::new(self))
    }

    /// Fresh handle on a registered model
    pub fn model(self: &Arc<Self>, name: &str) -> Result<Model> {
        let config = self
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::unknown_model(name))?;
        Ok(Model::new(Arc::clone(self), config))
    }

    pub fn config(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name).map(Arc::as_ref)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub(crate) fn hooks(&self, model: &str) -> &[Arc<dyn LifecycleHook>] {
        self.hooks.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Wait for exclusive use of `table`'s sort sequence
    ///
    /// `None` for a table no registered model lives on.
    pub(crate) async fn lock_sequence(&self, table: &str) -> Option<MutexGuard<'_, ()>> {
        match self.sequence_locks.get(table) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}
