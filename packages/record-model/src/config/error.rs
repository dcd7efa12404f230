//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing version field in YAML
    #[error("Missing 'version' field in registry configuration. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// Model name empty
    #[error("Model name must not be empty")]
    EmptyName,

    /// Same model registered twice
    #[error("Model '{0}' is defined more than once")]
    DuplicateModel(String),

    /// Table/column name that cannot be used as an SQL identifier
    #[error("Invalid identifier for '{field}': '{value}' (expected [A-Za-z_][A-Za-z0-9_]*)")]
    InvalidIdentifier { field: String, value: String },

    /// One column configured for two roles
    #[error("Column '{column}' of model '{model}' is configured for more than one role")]
    ColumnConflict { model: String, column: String },

    /// Relation must name exactly one target
    #[error("Relation '{relation}' of model '{model}' must set exactly one of 'model' or 'self_reference'")]
    AmbiguousRelationTarget { model: String, relation: String },

    /// Relation points at a model that is not registered
    #[error("Relation '{relation}' of model '{model}' targets unknown model '{target}'")]
    UnknownRelationTarget {
        model: String,
        relation: String,
        target: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration result type
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_version_lists_supported() {
        let err = ConfigError::UnsupportedVersion {
            found: 3,
            supported: vec![1],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported configuration version 3. Supported versions: 1"
        );
    }

    #[test]
    fn test_unknown_relation_target_message() {
        let err = ConfigError::UnknownRelationTarget {
            model: "categories".into(),
            relation: "items".into(),
            target: "itemz".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("categories"));
        assert!(msg.contains("itemz"));
    }
}
