//! Configuration system for the SHALE CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// SHALE CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Key configuration
    #[serde(default)]
    pub keys: KeyConfig,
    /// Pipeline sizing
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Key configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeyConfig {
    /// Hex key file used when no `--key-file` flag is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

/// Pipeline sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bytes per cipher-rekeying block (the storage engine's log block size)
    #[serde(default = "default_block_alignment")]
    pub block_alignment: u64,
    /// Pooled payload buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Capacity of each hand-off queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Queue retry tick in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_block_alignment() -> u64 {
    8192
}

fn default_buffer_size() -> usize {
    shale_pipeline::DEFAULT_BUFFER_SIZE
}

fn default_queue_capacity() -> usize {
    shale_pipeline::DEFAULT_QUEUE_CAPACITY
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_alignment: default_block_alignment(),
            buffer_size: default_buffer_size(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => anyhow::bail!("config file not found: {}", path.display()),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pipeline.block_alignment == 0 {
            anyhow::bail!("pipeline.block_alignment must be nonzero");
        }
        if self.pipeline.buffer_size == 0 {
            anyhow::bail!("pipeline.buffer_size must be nonzero");
        }
        if self.pipeline.queue_capacity == 0 {
            anyhow::bail!("pipeline.queue_capacity must be nonzero");
        }
        if self.pipeline.poll_interval_ms == 0 {
            anyhow::bail!("pipeline.poll_interval_ms must be nonzero");
        }
        Ok(())
    }
}
