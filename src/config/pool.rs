use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PoolError, Result};

/// Overrides the initial pool size.
pub const ENV_POOL_SIZE: &str = "COMPANION_POOL_SIZE";
/// Overrides the worker executable.
pub const ENV_WORKER_PROGRAM: &str = "COMPANION_WORKER_PROGRAM";

/// Top-level pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// How to launch one worker process.
    #[serde(default)]
    pub worker: WorkerCommand,

    /// Initial number of workers. Default: 4.
    #[serde(default = "default_size")]
    pub size: usize,

    /// Pending task buffer. Default: 128.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Believable reply latency window.
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Reply text of the fallback answer. Default: "Ok".
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    /// How long an interrupted session waits for busy workers before
    /// exiting without them. Default: 5000.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_size() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    128
}
fn default_fallback_text() -> String {
    "Ok".into()
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker: WorkerCommand::default(),
            size: default_size(),
            queue_capacity: default_queue_capacity(),
            pacing: PacingConfig::default(),
            fallback_text: default_fallback_text(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl PoolConfig {
    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|e| PoolError::ConfigParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Load from a file, then apply `COMPANION_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            self.size = raw.trim().parse().map_err(|_| PoolError::InvalidConfig {
                reason: format!("{} must be a non-negative integer, got {:?}", ENV_POOL_SIZE, raw),
            })?;
        }
        if let Some(program) = lookup(ENV_WORKER_PROGRAM) {
            if !program.trim().is_empty() {
                self.worker.program = program;
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "queue_capacity must be at least 1".into(),
            });
        }
        if self.worker.program.trim().is_empty() {
            return Err(PoolError::InvalidConfig {
                reason: "worker.program must not be empty".into(),
            });
        }
        if self.pacing.min_ms > self.pacing.max_ms {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "pacing.min_ms ({}) exceeds pacing.max_ms ({})",
                    self.pacing.min_ms, self.pacing.max_ms
                ),
            });
        }
        Ok(())
    }
}

/// Executable and arguments for one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    /// Executable or interpreter path. Default: `python3`.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments selecting the worker module. `-m bot` when the whole
    /// `worker` section is omitted, empty when only `program` is given.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory of the process. Inherited when unset.
    #[serde(default)]
    pub current_dir: Option<PathBuf>,

    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_program() -> String {
    "python3".into()
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: vec!["-m".into(), "bot".into()],
            current_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl WorkerCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            current_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// Reply latency window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_ms: 2000,
            max_ms: 5000,
        }
    }
}

impl PacingConfig {
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = PoolConfig::default();
        assert_eq!(config.size, 4);
        assert_eq!(config.queue_capacity, 128);
        assert_eq!(config.fallback_text, "Ok");
        assert_eq!(config.worker.program, "python3");
        assert_eq!(config.worker.args, vec!["-m", "bot"]);
        assert_eq!(config.pacing.min(), Duration::from_secs(2));
        assert_eq!(config.pacing.max(), Duration::from_secs(5));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_replace_size_and_program() {
        let mut config = PoolConfig::default();
        config
            .apply_overrides(|key| match key {
                ENV_POOL_SIZE => Some("9".into()),
                ENV_WORKER_PROGRAM => Some("/usr/bin/python3.11".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.size, 9);
        assert_eq!(config.worker.program, "/usr/bin/python3.11");
    }

    #[test]
    fn invalid_size_override_is_rejected() {
        let mut config = PoolConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_POOL_SIZE).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig { .. }));
    }

    #[test]
    fn inverted_pacing_window_is_rejected() {
        let config = PoolConfig {
            pacing: PacingConfig {
                min_ms: 10,
                max_ms: 5,
            },
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = PoolConfig {
            queue_capacity: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
