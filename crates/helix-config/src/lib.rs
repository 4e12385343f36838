//! Configuration schema and loading for the Helix pipeline.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::{load_config, load_config_with_env};
pub use model::{
    AnalyzeConfig, HelixConfig, HelixConfigBuilder, IngestConfig, MemoryConfig, SessionsConfig,
};
