use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub data_dir: String,
    pub logs_dir: String,
    pub model_filename: String,
    pub state_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

/// Classifier knobs. The threshold and smoothing constant are deliberately
/// configuration, not constants: both need calibration against a held-out
/// labeled set, and the shipped defaults are only conservative starting
/// points.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Minimum ad-posterior required before a unit is dropped.
    pub ad_threshold: f64,
    /// Additive smoothing constant used at training time.
    pub smoothing_alpha: f64,
    /// Weight multiplier for section-heading tokens.
    pub heading_boost: f64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
