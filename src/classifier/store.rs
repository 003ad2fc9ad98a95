use std::{
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::features::TOKENIZER_VERSION;
use crate::classifier::model::Model;
use crate::domain::LabeledExample;

/// Bumped when the artifact layout changes shape.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("model file not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to read or write model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("model file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("unsupported model format version {found} (this build reads version {expected})")]
    FormatVersion { found: u32, expected: u32 },
    #[error("model was trained with tokenizer version {found}, this build extracts version {expected}")]
    TokenizerVersion { found: u32, expected: u32 },
}

/// On-disk envelope around the trained parameters. The version tags are
/// checked at load so a model trained under a different feature scheme is a
/// hard error instead of a silently degenerate scorer.
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    format_version: u32,
    created_at: DateTime<Utc>,
    model: Model,
}

pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Model, ModelStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelStoreError::NotFound(self.path.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        if artifact.format_version != MODEL_FORMAT_VERSION {
            return Err(ModelStoreError::FormatVersion {
                found: artifact.format_version,
                expected: MODEL_FORMAT_VERSION,
            });
        }
        if artifact.model.tokenizer_version != TOKENIZER_VERSION {
            return Err(ModelStoreError::TokenizerVersion {
                found: artifact.model.tokenizer_version,
                expected: TOKENIZER_VERSION,
            });
        }
        Ok(artifact.model)
    }

    pub fn save(&self, model: &Model) -> Result<(), ModelStoreError> {
        let artifact = ModelArtifact {
            format_version: MODEL_FORMAT_VERSION,
            created_at: Utc::now(),
            model: model.clone(),
        };
        let json = serde_json::to_vec_pretty(&artifact)?;
        // Write-then-rename so a crash never leaves a truncated artifact.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Reads the offline training set: one JSON object per line,
/// `{"text": "...", "label": "ad" | "editorial"}`. Blank lines are skipped.
pub fn load_labeled_examples(path: &Path) -> Result<Vec<LabeledExample>, ModelStoreError> {
    let file = fs::File::open(path)?;
    let mut examples = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        examples.push(serde_json::from_str(&line)?);
    }
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::model::train;
    use crate::domain::Label;
    use std::io::Write;

    fn sample_model() -> Model {
        train(
            &[
                LabeledExample {
                    text: "buy now discount".into(),
                    label: Label::Ad,
                },
                LabeledExample {
                    text: "compilers are interesting".into(),
                    label: Label::Editorial,
                },
            ],
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn save_then_load_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));
        let model = sample_model();
        store.save(&model).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(ModelStoreError::NotFound(_))));
    }

    #[test]
    fn corrupt_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"{not json").unwrap();
        let store = ModelStore::new(path);
        assert!(matches!(store.load(), Err(ModelStoreError::Corrupt(_))));
    }

    #[test]
    fn wrong_format_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new(&path);
        store.save(&sample_model()).unwrap();
        let doctored = fs::read_to_string(&path)
            .unwrap()
            .replace("\"format_version\": 1", "\"format_version\": 99");
        fs::write(&path, doctored).unwrap();
        assert!(matches!(
            store.load(),
            Err(ModelStoreError::FormatVersion { found: 99, .. })
        ));
    }

    #[test]
    fn wrong_tokenizer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let store = ModelStore::new(&path);
        let mut model = sample_model();
        model.tokenizer_version = 42;
        store.save(&model).unwrap();
        assert!(matches!(
            store.load(),
            Err(ModelStoreError::TokenizerVersion { found: 42, .. })
        ));
    }

    #[test]
    fn labeled_examples_read_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"text": "buy now", "label": "ad"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text": "an article", "label": "editorial"}}"#).unwrap();
        drop(file);
        let examples = load_labeled_examples(&path).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].label, Label::Ad);
        assert_eq!(examples[1].text, "an article");
    }
}
