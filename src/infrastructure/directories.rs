use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub model_path: PathBuf,
    pub state_path: PathBuf,
}

/// Creates the writable directories up front and resolves every path the
/// run will touch. The input directory is only resolved, never created:
/// filling it is the upstream sync's job.
pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let output_dir = ensure_dir(&cfg.output_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;
    let logs_dir = ensure_dir(&cfg.logs_dir)?;

    let probe = data_dir.join(".write-test");
    fs::write(&probe, b"ok").context("data directory is not writable")?;
    fs::remove_file(&probe)?;

    let input_dir = PathBuf::from(&cfg.input_dir);
    Ok(ResolvedPaths {
        input_dir: input_dir.canonicalize().unwrap_or(input_dir),
        output_dir,
        model_path: data_dir.join(&cfg.model_filename),
        state_path: data_dir.join(&cfg.state_filename),
        data_dir,
        logs_dir,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {path}"))?;
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}
