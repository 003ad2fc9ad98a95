use std::env;

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, LoggingConfig, PipelineConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let directories = DirectoryConfig {
            input_dir: env::var("INPUT_DIR").unwrap_or_else(|_| "weekly/docs".to_string()),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "docs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            model_filename: env::var("MODEL_FILENAME").unwrap_or_else(|_| "model.json".to_string()),
            state_filename: env::var("STATE_FILENAME").unwrap_or_else(|_| "state.json".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let classifier = ClassifierConfig {
            ad_threshold: parse_f64("AD_THRESHOLD", 0.9)?,
            smoothing_alpha: parse_f64("SMOOTHING_ALPHA", 1.0)?,
            heading_boost: parse_f64("HEADING_BOOST", 5.0)?,
        };
        validate_classifier(&classifier)?;

        let pipeline = PipelineConfig {
            workers: match env::var("WORKERS") {
                Ok(value) => value.parse::<usize>().map_err(|_| ConfigError::Invalid {
                    key: "WORKERS",
                    value,
                    reason: "expected a positive integer",
                })?,
                Err(_) => default_workers(),
            },
        };

        Ok(Self {
            directories,
            logging,
            classifier,
            pipeline,
        })
    }
}

fn validate_classifier(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.ad_threshold) {
        return Err(ConfigError::Invalid {
            key: "AD_THRESHOLD",
            value: config.ad_threshold.to_string(),
            reason: "must be within [0, 1]",
        });
    }
    if config.smoothing_alpha <= 0.0 {
        return Err(ConfigError::Invalid {
            key: "SMOOTHING_ALPHA",
            value: config.smoothing_alpha.to_string(),
            reason: "must be positive",
        });
    }
    if config.heading_boost < 1.0 {
        return Err(ConfigError::Invalid {
            key: "HEADING_BOOST",
            value: config.heading_boost.to_string(),
            reason: "must be at least 1",
        });
    }
    Ok(())
}

fn parse_f64(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse::<f64>().map_err(|_| ConfigError::Invalid {
            key,
            value,
            reason: "expected a number",
        }),
        Err(_) => Ok(default),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(4)
}
