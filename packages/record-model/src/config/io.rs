//! Configuration I/O (YAML loading)
//!
//! ```yaml
//! version: 1
//! models:
//!   - name: categories
//!     soft_delete_column: deleted
//!     sort_order_column: sort_order
//!     cascade:
//!       - name: items
//!         model: items
//!       - name: children
//!         self_reference: true
//!         keys:
//!           - foreign: parent_id
//!   - name: items
//!     soft_delete_column: deleted
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::error::{ConfigError, ConfigResult};
use super::model_config::{ModelConfig, RelationTarget};

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML Schema v1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfigV1 {
    /// Schema version (always 1 for v1)
    pub version: u32,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Same shape with an optional version, so a missing field gets its own error
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegistryConfig {
    version: Option<u32>,
    #[serde(default)]
    models: Vec<ModelConfig>,
}

impl RegistryConfigV1 {
    pub fn new(models: Vec<ModelConfig>) -> Self {
        Self { version: 1, models }
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawRegistryConfig = serde_yaml::from_str(content)?;

        let version = raw.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            version,
            models: raw.models,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Per-model checks, then uniqueness and relation targets across models
    pub fn validate(&self) -> ConfigResult<()> {
        let mut names = HashSet::new();
        for model in &self.models {
            model.validate()?;
            if !names.insert(model.name.as_str()) {
                return Err(ConfigError::DuplicateModel(model.name.clone()));
            }
        }

        for model in &self.models {
            for relation in &model.cascade {
                if let Some(RelationTarget::Model(target)) = relation.target() {
                    if !names.contains(target.as_str()) {
                        return Err(ConfigError::UnknownRelationTarget {
                            model: model.name.clone(),
                            relation: relation.name.clone(),
                            target,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
