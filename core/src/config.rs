// Engine configuration
//
// Layered: built-in defaults, then an optional TOML file, then NULLNOVA_*
// environment variables.

use crate::error::{FixedInterval, WipeError, WipeResult};
use crate::io::PAGE_SIZE;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "NULLNOVA";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes per write call within a pass
    pub write_block_size: usize,
    /// Run the sampling probe after the last pass of each chunk
    pub verify: bool,
    pub verify_sample_bytes: usize,
    pub lock_max_attempts: u32,
    pub lock_retry_interval_ms: u64,
    /// A single write or sync slower than this fails the job
    pub write_timeout_ms: u64,
    pub max_lanes: usize,
    pub use_direct_io: bool,
    pub progress_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_block_size: 4 * 1024 * 1024,
            verify: true,
            verify_sample_bytes: 4096,
            lock_max_attempts: 20,
            lock_retry_interval_ms: 500,
            write_timeout_ms: 60_000,
            max_lanes: 8,
            use_direct_io: false,
            progress_interval_ms: 250,
        }
    }
}

impl EngineConfig {
    /// Load from the default config file location plus environment
    pub fn load() -> WipeResult<Self> {
        Self::load_from(Self::default_path().as_deref())
    }

    /// Load with an explicit config file. A missing file is not an error.
    pub fn load_from(path: Option<&Path>) -> WipeResult<Self> {
        let defaults = Config::try_from(&EngineConfig::default()).map_err(config_error)?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: EngineConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/nullnova/config.toml` for the current user
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "nullnova", "nullnova")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> WipeResult<()> {
        if self.write_block_size == 0 {
            return Err(WipeError::InvalidConfig(
                "write_block_size must be greater than zero".into(),
            ));
        }
        if self.use_direct_io && self.write_block_size % PAGE_SIZE != 0 {
            return Err(WipeError::InvalidConfig(format!(
                "write_block_size {} must be a multiple of {} with direct I/O",
                self.write_block_size, PAGE_SIZE
            )));
        }
        if self.verify && self.verify_sample_bytes == 0 {
            return Err(WipeError::InvalidConfig(
                "verify_sample_bytes must be greater than zero".into(),
            ));
        }
        if self.lock_max_attempts == 0 {
            return Err(WipeError::InvalidConfig(
                "lock_max_attempts must be at least 1".into(),
            ));
        }
        if self.max_lanes == 0 {
            return Err(WipeError::InvalidConfig("max_lanes must be at least 1".into()));
        }
        Ok(())
    }

    pub fn lock_retry(&self) -> FixedInterval {
        FixedInterval::new(
            Duration::from_millis(self.lock_retry_interval_ms),
            self.lock_max_attempts,
        )
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Operations one chunk contributes to progress: one per pass, plus the probe
    pub fn operations_per_chunk(&self, passes: usize) -> u64 {
        passes as u64 + u64::from(self.verify)
    }
}

fn config_error(err: config::ConfigError) -> WipeError {
    WipeError::InvalidConfig(err.to_string())
}
