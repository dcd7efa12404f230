//! Per-model configuration
//!
//! A model is a table plus the optional behaviours layered on top of it:
//! soft delete, category partitioning, maintained sort order and cascade
//! relations to dependent models.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::error::{ConfigError, ConfigResult};

/// Model configuration
///
/// # Examples
///
/// ```rust
/// use record_model::config::ModelConfig;
///
/// let config = ModelConfig::new("categories")
///     .soft_delete("deleted")
///     .sort_order("sort_order");
/// assert_eq!(config.table(), "categories");
/// assert_eq!(config.primary_key(), "category_id");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Model identifier (referenced by relations)
    pub name: String,

    /// Table name (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Primary key column (defaults to singular table name + `_id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Soft delete flag column; `None` = rows are physically removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete_column: Option<String>,

    /// Category column; `None` = no category scoping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_column: Option<String>,

    /// Sort order column; `None` = no maintained ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order_column: Option<String>,

    /// Dependent models receiving this model's delete/undelete
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascade: Vec<RelationDescriptor>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            primary_key: None,
            soft_delete_column: None,
            category_column: None,
            sort_order_column: None,
            cascade: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    pub fn category(mut self, column: impl Into<String>) -> Self {
        self.category_column = Some(column.into());
        self
    }

    pub fn sort_order(mut self, column: impl Into<String>) -> Self {
        self.sort_order_column = Some(column.into());
        self
    }

    pub fn cascade(mut self, relation: RelationDescriptor) -> Self {
        self.cascade.push(relation);
        self
    }

    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    pub fn primary_key(&self) -> Cow<'_, str> {
        match &self.primary_key {
            Some(pk) => Cow::Borrowed(pk),
            None => Cow::Owned(format!("{}_id", singular(self.table()))),
        }
    }

    /// Check identifiers and column roles (relation targets are checked by
    /// the registry, which knows the other models)
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        check_identifier("table", self.table())?;
        check_identifier("primary_key", &self.primary_key())?;

        let roles = [
            ("soft_delete_column", &self.soft_delete_column),
            ("category_column", &self.category_column),
            ("sort_order_column", &self.sort_order_column),
        ];
        let mut seen = vec![self.primary_key().into_owned()];
        for (field, column) in roles {
            if let Some(column) = column {
                check_identifier(field, column)?;
                if seen.contains(column) {
                    return Err(ConfigError::ColumnConflict {
                        model: self.name.clone(),
                        column: column.clone(),
                    });
                }
                seen.push(column.clone());
            }
        }

        for relation in &self.cascade {
            relation.validate(&self.name)?;
        }

        Ok(())
    }
}

/// Cascade relation to a dependent model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationDescriptor {
    /// Relation name (used in reports and logs)
    pub name: String,

    /// Target model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Relation onto the owner's own table (e.g. parent/child rows)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub self_reference: bool,

    /// Owner column → dependent column; empty = owner pk → same-named column
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyMapping>,

    /// Physically delete dependent rows instead of soft-deleting them
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hard_delete: bool,
}

/// Owner column (default: primary key) mapped to a dependent's foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    pub foreign: String,
}

impl KeyMapping {
    /// Owner primary key → `foreign`
    pub fn foreign(foreign: impl Into<String>) -> Self {
        Self {
            local: None,
            foreign: foreign.into(),
        }
    }

    pub fn new(local: impl Into<String>, foreign: impl Into<String>) -> Self {
        Self {
            local: Some(local.into()),
            foreign: foreign.into(),
        }
    }
}

/// Target of a relation once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTarget {
    /// The owner's own model, loaded as an independent handle
    SelfReference,
    Model(String),
}

/// Relation with defaults applied against its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelation {
    pub name: String,
    pub target: RelationTarget,
    /// (owner column, dependent column)
    pub keys: Vec<(String, String)>,
    pub hard_delete: bool,
}

impl ResolvedRelation {
    /// Model name of the dependent side
    pub fn target_model<'a>(&'a self, owner: &'a ModelConfig) -> &'a str {
        match &self.target {
            RelationTarget::SelfReference => &owner.name,
            RelationTarget::Model(name) => name,
        }
    }
}

impl RelationDescriptor {
    /// Relation to another model
    pub fn to_model(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: Some(model.into()),
            self_reference: false,
            keys: Vec::new(),
            hard_delete: false,
        }
    }

    /// Relation onto the owner's own table
    pub fn to_self(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            self_reference: true,
            keys: Vec::new(),
            hard_delete: false,
        }
    }

    pub fn key(mut self, mapping: KeyMapping) -> Self {
        self.keys.push(mapping);
        self
    }

    pub fn hard_delete(mut self, hard_delete: bool) -> Self {
        self.hard_delete = hard_delete;
        self
    }

    pub fn target(&self) -> Option<RelationTarget> {
        match (&self.model, self.self_reference) {
            (Some(model), false) => Some(RelationTarget::Model(model.clone())),
            (None, true) => Some(RelationTarget::SelfReference),
            _ => None,
        }
    }

    fn validate(&self, owner: &str) -> ConfigResult<()> {
        if self.target().is_none() {
            return Err(ConfigError::AmbiguousRelationTarget {
                model: owner.to_string(),
                relation: self.name.clone(),
            });
        }
        for mapping in &self.keys {
            if let Some(local) = &mapping.local {
                check_identifier("keys.local", local)?;
            }
            check_identifier("keys.foreign", &mapping.foreign)?;
        }
        Ok(())
    }

    /// Apply defaults against the owning model
    ///
    /// Pure: depends only on the descriptor and the owner's configuration.
    pub fn resolve(&self, owner: &ModelConfig) -> ConfigResult<ResolvedRelation> {
        let target = self
            .target()
            .ok_or_else(|| ConfigError::AmbiguousRelationTarget {
                model: owner.name.clone(),
                relation: self.name.clone(),
            })?;

        let pk = owner.primary_key().into_owned();
        let keys = if self.keys.is_empty() {
            vec![(pk.clone(), pk)]
        } else {
            self.keys
                .iter()
                .map(|m| (m.local.clone().unwrap_or_else(|| pk.clone()), m.foreign.clone()))
                .collect()
        };

        Ok(ResolvedRelation {
            name: self.name.clone(),
            target,
            keys,
            hard_delete: self.hard_delete,
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(field: &str, value: &str) -> ConfigResult<()> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// English singular of a table name (`categories` → `category`)
pub fn singular(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if let Some(stem) = lower.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", &word[..stem.len()]);
        }
    }
    if lower.ends_with("sses") {
        return word[..word.len() - 2].to_string();
    }
    for suffix in ["xes", "zes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if lower.ends_with("ss") || lower.ends_with("us") {
        return word.to_string();
    }
    match lower.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => word[..stem.len()].to_string(),
        _ => word.to_string(),
    }
}
