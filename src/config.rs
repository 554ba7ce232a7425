//! Configuration
//!
//! Loaded from a JSON file, then overridden from `LOFI_*` environment
//! variables. Every field has a default, so an empty `{}` is a valid file.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::io::SUPPORTED_BIT_DEPTHS;
use crate::error::{LofiError, Result};

/// Where audio files live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Raw audio from `extract`
    pub uploads_dir: PathBuf,
    /// Pipeline output
    pub processed_dir: PathBuf,
    /// Pre-extracted audio, `<video id>.wav`
    pub library_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("./uploads"),
            processed_dir: PathBuf::from("./processed"),
            library_dir: PathBuf::from("./library"),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            worker_count,
            queue_capacity: worker_count * 4,
        }
    }
}

/// Output encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub bit_depth: u16,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { bit_depth: 16 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LofiConfig {
    pub storage: StorageConfig,
    pub workers: WorkerConfig,
    pub export: ExportConfig,
}

impl LofiConfig {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: LofiConfig = serde_json::from_str(&json)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults; then apply the environment
    /// and validate
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply `LOFI_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    ///
    /// Recognised keys: `LOFI_WORKERS`, `LOFI_QUEUE_CAPACITY`,
    /// `LOFI_UPLOADS_DIR`, `LOFI_PROCESSED_DIR`, `LOFI_LIBRARY_DIR`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LOFI_WORKERS") {
            self.workers.worker_count = parse_count("LOFI_WORKERS", &value)?;
        }
        if let Some(value) = lookup("LOFI_QUEUE_CAPACITY") {
            self.workers.queue_capacity = parse_count("LOFI_QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("LOFI_UPLOADS_DIR") {
            self.storage.uploads_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("LOFI_PROCESSED_DIR") {
            self.storage.processed_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("LOFI_LIBRARY_DIR") {
            self.storage.library_dir = PathBuf::from(value);
        }
        Ok(())
    }

    /// Check sizes and bit depth
    pub fn validate(&self) -> Result<()> {
        if self.workers.worker_count == 0 {
            return Err(LofiError::Config {
                reason: "workers.worker_count must be at least 1".to_string(),
            });
        }
        if self.workers.queue_capacity == 0 {
            return Err(LofiError::Config {
                reason: "workers.queue_capacity must be at least 1".to_string(),
            });
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.export.bit_depth) {
            return Err(LofiError::Config {
                reason: format!(
                    "export.bit_depth {} is not one of 16, 24, 32",
                    self.export.bit_depth
                ),
            });
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| LofiError::Config {
        reason: format!("{} must be a positive integer, got '{}'", key, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = LofiConfig::default();
        assert_eq!(config.storage.uploads_dir, PathBuf::from("./uploads"));
        assert_eq!(config.export.bit_depth, 16);
        assert!(config.workers.worker_count >= 1);
        assert_eq!(config.workers.queue_capacity, config.workers.worker_count * 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: LofiConfig =
            serde_json::from_str(r#"{"workers": {"worker_count": 2}, "export": {"bit_depth": 24}}"#)
                .unwrap();
        assert_eq!(config.workers.worker_count, 2);
        assert_eq!(config.export.bit_depth, 24);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lofi.json");

        let mut config = LofiConfig::default();
        config.storage.library_dir = PathBuf::from("/srv/library");
        config.save(&path).unwrap();

        assert_eq!(LofiConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOFI_WORKERS", "3"),
            ("LOFI_QUEUE_CAPACITY", " 7 "),
            ("LOFI_PROCESSED_DIR", "/data/out"),
        ]
        .into_iter()
        .collect();

        let mut config = LofiConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.workers.worker_count, 3);
        assert_eq!(config.workers.queue_capacity, 7);
        assert_eq!(config.storage.processed_dir, PathBuf::from("/data/out"));
        assert_eq!(config.storage.uploads_dir, PathBuf::from("./uploads"));
    }

    #[test]
    fn test_bad_override() {
        let mut config = LofiConfig::default();
        let err = config
            .apply_overrides(|key| (key == "LOFI_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validate() {
        let mut config = LofiConfig::default();
        config.workers.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = LofiConfig::default();
        config.export.bit_depth = 8;
        assert!(config.validate().is_err());
    }
}
