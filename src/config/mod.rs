pub mod env;
mod loader;

pub use env::{AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, PipelineConfig};
pub use loader::load_config;
