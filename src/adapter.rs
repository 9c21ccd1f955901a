//! LoRA adapter checkpoints as written by a fine-tuning run.
//!
//! A run writes `<output_dir>/checkpoint-<step>` directories, each holding a
//! PEFT `adapter_config.json` and the adapter weights.

use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::{ Path, PathBuf };
use thiserror::Error;

pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
pub const ADAPTER_WEIGHT_FILES: [&str; 2] = ["adapter_model.safetensors", "adapter_model.bin"];
pub const CHECKPOINT_PREFIX: &str = "checkpoint-";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter directory '{}' does not exist", .0.display())]
    MissingDirectory(PathBuf),
    #[error("adapter directory '{}' has no adapter_config.json", .0.display())]
    MissingConfig(PathBuf),
    #[error("adapter directory '{}' has no adapter weights", .0.display())]
    MissingWeights(PathBuf),
    #[error("no checkpoint-<step> directory found in '{}'", .0.display())]
    NoCheckpoint(PathBuf),
    #[error("failed to parse '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("adapter IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetModules {
    List(Vec<String>),
    Pattern(String),
}

/// LoRA settings, serialized with PEFT's field names so the same value
/// describes both a planned run and a written checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    pub r: u32,
    pub lora_alpha: f64,
    pub target_modules: TargetModules,
    pub lora_dropout: f64,
    #[serde(default = "default_bias")]
    pub bias: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub peft_type: Option<String>,
    #[serde(default)]
    pub base_model_name_or_path: Option<String>,
}

fn default_bias() -> String {
    "none".to_string()
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            r: 16,
            lora_alpha: 32.0,
            target_modules: TargetModules::List(vec!["q_proj".into(), "v_proj".into()]),
            lora_dropout: 0.05,
            bias: default_bias(),
            task_type: Some("CAUSAL_LM".into()),
            peft_type: Some("LORA".into()),
            base_model_name_or_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub step: u64,
    pub path: PathBuf,
}

/// A validated adapter checkpoint, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AdapterCheckpoint {
    pub path: PathBuf,
    pub step: Option<u64>,
    pub config: LoraConfig,
}

impl AdapterCheckpoint {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(AdapterError::MissingDirectory(path));
        }

        let config_path = path.join(ADAPTER_CONFIG_FILE);
        if !config_path.is_file() {
            return Err(AdapterError::MissingConfig(path));
        }
        if !ADAPTER_WEIGHT_FILES.iter().any(|f| path.join(f).is_file()) {
            return Err(AdapterError::MissingWeights(path));
        }

        let raw = fs::read_to_string(&config_path)?;
        let config: LoraConfig = serde_json::from_str(&raw).map_err(|source| AdapterError::Json {
            path: config_path.clone(),
            source,
        })?;

        let step = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_checkpoint_step);

        Ok(Self { path, step, config })
    }

    /// Picks the adapter to serve: an explicit checkpoint inside `adapter_dir`,
    /// `adapter_dir` itself when it already is an adapter, or the checkpoint
    /// with the highest step.
    pub fn resolve(adapter_dir: impl AsRef<Path>, checkpoint: Option<&str>) -> Result<Self, AdapterError> {
        let adapter_dir = adapter_dir.as_ref();
        if let Some(name) = checkpoint {
            return Self::load(adapter_dir.join(name));
        }
        if adapter_dir.join(ADAPTER_CONFIG_FILE).is_file() {
            return Self::load(adapter_dir);
        }
        match latest_checkpoint(adapter_dir)? {
            Some(entry) => {
                info!("Using latest checkpoint {}", entry.path.display());
                Self::load(entry.path)
            }
            None => Err(AdapterError::NoCheckpoint(adapter_dir.to_path_buf())),
        }
    }

    /// Logs a warning when the adapter was trained against another base model.
    pub fn check_base_model(&self, base_model: &str) -> bool {
        match self.config.base_model_name_or_path.as_deref() {
            Some(trained_on) if trained_on != base_model => {
                warn!(
                    "Adapter {} was trained on '{}' but serving base model is '{}'",
                    self.path.display(),
                    trained_on,
                    base_model
                );
                false
            }
            _ => true,
        }
    }
}

pub fn parse_checkpoint_step(name: &str) -> Option<u64> {
    name.strip_prefix(CHECKPOINT_PREFIX)?.parse().ok()
}

/// Checkpoint directories under `output_dir`, ordered by step.
pub fn list_checkpoints(output_dir: impl AsRef<Path>) -> Result<Vec<CheckpointEntry>, AdapterError> {
    let output_dir = output_dir.as_ref();
    if !output_dir.is_dir() {
        return Err(AdapterError::MissingDirectory(output_dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(step) = name.to_str().and_then(parse_checkpoint_step) {
            entries.push(CheckpointEntry { step, path: entry.path() });
        }
    }
    entries.sort_by_key(|e| e.step);
    Ok(entries)
}

pub fn latest_checkpoint(output_dir: impl AsRef<Path>) -> Result<Option<CheckpointEntry>, AdapterError> {
    Ok(list_checkpoints(output_dir)?.pop())
}

/// Deletes all but the newest `keep` checkpoints and returns what was removed.
/// A `keep` of 0 means no limit, as in the training plan.
pub fn prune_checkpoints(output_dir: impl AsRef<Path>, keep: usize) -> Result<Vec<CheckpointEntry>, AdapterError> {
    let entries = list_checkpoints(output_dir)?;
    if keep == 0 {
        return Ok(Vec::new());
    }
    let excess = entries.len().saturating_sub(keep);
    let removed: Vec<CheckpointEntry> = entries.into_iter().take(excess).collect();
    for entry in &removed {
        info!("Removing checkpoint {}", entry.path.display());
        fs::remove_dir_all(&entry.path)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_checkpoint(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let config = json!({
            "base_model_name_or_path": "mistralai/Mistral-7B-Instruct-v0.1",
            "bias": "none",
            "lora_alpha": 32,
            "lora_dropout": 0.05,
            "peft_type": "LORA",
            "r": 16,
            "target_modules": ["v_proj", "q_proj"],
            "task_type": "CAUSAL_LM"
        });
        fs::write(dir.join(ADAPTER_CONFIG_FILE), config.to_string()).unwrap();
        fs::write(dir.join("adapter_model.safetensors"), b"weights").unwrap();
        dir
    }

    #[test]
    fn lists_checkpoints_by_numeric_step() {
        let tmp = TempDir::new().unwrap();
        write_checkpoint(tmp.path(), "checkpoint-100");
        write_checkpoint(tmp.path(), "checkpoint-21");
        write_checkpoint(tmp.path(), "checkpoint-7");
        fs::create_dir(tmp.path().join("runs")).unwrap();
        fs::write(tmp.path().join("checkpoint-999"), b"not a dir").unwrap();

        let steps: Vec<u64> = list_checkpoints(tmp.path()).unwrap().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![7, 21, 100]);
        assert_eq!(latest_checkpoint(tmp.path()).unwrap().unwrap().step, 100);
    }

    #[test]
    fn resolve_prefers_explicit_checkpoint() {
        let tmp = TempDir::new().unwrap();
        write_checkpoint(tmp.path(), "checkpoint-21");
        write_checkpoint(tmp.path(), "checkpoint-42");

        let adapter = AdapterCheckpoint::resolve(tmp.path(), Some("checkpoint-21")).unwrap();
        assert_eq!(adapter.step, Some(21));
        assert_eq!(adapter.config.r, 16);
        assert_eq!(
            adapter.config.target_modules,
            TargetModules::List(vec!["v_proj".into(), "q_proj".into()])
        );

        let latest = AdapterCheckpoint::resolve(tmp.path(), None).unwrap();
        assert_eq!(latest.step, Some(42));
    }

    #[test]
    fn resolve_accepts_adapter_dir_itself() {
        let tmp = TempDir::new().unwrap();
        let dir = write_checkpoint(tmp.path(), "final");
        let adapter = AdapterCheckpoint::resolve(&dir, None).unwrap();
        assert_eq!(adapter.step, None);
        assert!(adapter.check_base_model("mistralai/Mistral-7B-Instruct-v0.1"));
        assert!(!adapter.check_base_model("other/model"));
    }

    #[test]
    fn resolve_fails_on_empty_output_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            AdapterCheckpoint::resolve(tmp.path(), None),
            Err(AdapterError::NoCheckpoint(_))
        ));
    }

    #[test]
    fn load_requires_weights() {
        let tmp = TempDir::new().unwrap();
        let dir = write_checkpoint(tmp.path(), "checkpoint-1");
        fs::remove_file(dir.join("adapter_model.safetensors")).unwrap();
        assert!(matches!(AdapterCheckpoint::load(&dir), Err(AdapterError::MissingWeights(_))));
    }

    #[test]
    fn prune_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        for step in [100, 200, 300] {
            write_checkpoint(tmp.path(), &format!("checkpoint-{}", step));
        }

        let removed = prune_checkpoints(tmp.path(), 2).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].step, 100);
        assert!(!tmp.path().join("checkpoint-100").exists());

        let remaining: Vec<u64> = list_checkpoints(tmp.path()).unwrap().iter().map(|e| e.step).collect();
        assert_eq!(remaining, vec![200, 300]);
    }

    #[test]
    fn prune_with_zero_limit_keeps_everything() {
        let tmp = TempDir::new().unwrap();
        for step in [100, 200, 300] {
            write_checkpoint(tmp.path(), &format!("checkpoint-{}", step));
        }

        let removed = prune_checkpoints(tmp.path(), 0).unwrap();
        assert!(removed.is_empty());

        let remaining: Vec<u64> = list_checkpoints(tmp.path()).unwrap().iter().map(|e| e.step).collect();
        assert_eq!(remaining, vec![100, 200, 300]);
    }

    #[test]
    fn default_lora_config_uses_peft_names() {
        let value = serde_json::to_value(LoraConfig::default()).unwrap();
        assert_eq!(value["r"], 16);
        assert_eq!(value["lora_alpha"], 32.0);
        assert_eq!(value["target_modules"], json!(["q_proj", "v_proj"]));
        assert_eq!(value["task_type"], "CAUSAL_LM");
    }
}
