//! Model configuration
//!
//! Models are declared in code with the [`ModelConfig`] builder or loaded in
//! bulk from a versioned YAML document ([`RegistryConfigV1`]).

pub mod error;
pub mod io;
pub mod model_config;

pub use error::{ConfigError, ConfigResult};
pub use io::RegistryConfigV1;
pub use model_config::{
    is_identifier, singular, KeyMapping, ModelConfig, RelationDescriptor, RelationTarget,
    ResolvedRelation,
};
