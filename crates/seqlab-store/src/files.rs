use std::path::{Path, PathBuf};
use std::{env, fs};

use seqlab_core::{Dataset, ExperimentConfig};

use crate::error::{Result, StoreError};
use crate::store::RunStore;

const HISTORY_FILE: &str = "runs.db";

/// `$SEQLAB_DATA_DIR`, else `~/.seqlab`.
pub fn default_base_dir() -> PathBuf {
    env::var("SEQLAB_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".seqlab"))
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Open the run history under `base_dir` (or the default), creating the
/// directory as needed.
pub fn open_history(base_dir: Option<&Path>) -> Result<RunStore> {
    let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
    fs::create_dir_all(&base)
        .map_err(|e| StoreError::Io(format!("failed to create {}: {e}", base.display())))?;
    RunStore::open(&base.join(HISTORY_FILE))
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let json = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("failed to read {}: {e}", path.display())))?;
    let dataset = Dataset::from_json(&json)?;
    tracing::debug!(
        "loaded dataset {} ({} splits)",
        path.display(),
        dataset.split_names().count()
    );
    Ok(dataset)
}

pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::Io(format!("failed to create {}: {e}", parent.display())))?;
    }
    let json = dataset.to_json_pretty()?;
    fs::write(path, json)
        .map_err(|e| StoreError::Io(format!("failed to write {}: {e}", path.display())))
}

/// Parse an experiment TOML. A relative `dataset` path is taken relative to
/// the config file's directory.
pub fn load_experiment(path: &Path) -> Result<ExperimentConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("failed to read {}: {e}", path.display())))?;
    let mut config: ExperimentConfig = toml::from_str(&text)
        .map_err(|e| StoreError::InvalidData(format!("invalid config {}: {e}", path.display())))?;

    if config.dataset.is_relative() {
        if let Some(dir) = path.parent() {
            config.dataset = dir.join(&config.dataset);
        }
    }
    Ok(config)
}
