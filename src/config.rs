//! Reasoner configuration, persisted as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Tuning knobs for a [`Reasoner`](crate::reasoner::Reasoner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Number of saturation worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maintain saturation incrementally across axiom changes. When disabled,
    /// every change discards all contexts and saturates from scratch.
    #[serde(default = "default_incremental")]
    pub incremental: bool,
    /// Run the taxonomy validation stage after every classification.
    #[serde(default)]
    pub validate_taxonomy: bool,
    /// Maximum number of conclusions kept by the inference recorder.
    /// `None` keeps everything once recording is switched on.
    #[serde(default)]
    pub trace_limit: Option<usize>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
fn default_incremental() -> bool {
    true
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            incremental: default_incremental(),
            validate_taxonomy: false,
            trace_limit: None,
        }
    }
}

impl ReasonerConfig {
    /// Config with a fixed worker count (other fields default).
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Reject settings the reasoner cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                message: "workers must be at least 1".into(),
            });
        }
        if self.trace_limit == Some(0) {
            return Err(ConfigError::Invalid {
                message: "trace_limit must be positive when set".into(),
            });
        }
        Ok(())
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReasonerConfig::default();
        assert!(config.workers >= 1);
        assert!(config.incremental);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let config = ReasonerConfig::with_workers(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: ReasonerConfig = toml::from_str("workers = 3").unwrap();
        assert_eq!(config.workers, 3);
        assert!(config.incremental);
        assert!(!config.validate_taxonomy);
        assert_eq!(config.trace_limit, None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("reasoner.toml");
        let config = ReasonerConfig {
            workers: 2,
            incremental: false,
            validate_taxonomy: true,
            trace_limit: Some(100),
        };
        config.save(&path).unwrap();
        let loaded = ReasonerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "workers = \"many\"").unwrap();
        let err = ReasonerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ReasonerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
