//! Bootstrap configuration loading
//!
//! Configuration is a single TOML file with two optional tables:
//! - `[logging]`: log level and optional log file
//! - `[scheduler]`: player-pool scheduler tunables
//!
//! # Config File Resolution
//!
//! 1. Command-line argument (highest priority)
//! 2. `REELFEED_CONFIG` environment variable
//! 3. Platform config dir: `<config_dir>/reelfeed/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file is never fatal: the loader warns and uses defaults.
//! A file that exists but does not parse or validate is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REELFEED_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scheduler tunables (optional)
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Player-pool scheduler tunables
///
/// Defaults match the observed feed behavior: three engines, immediate
/// neighbors preloaded, pagination three items before the end.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of playback slots (K)
    pub pool_size: usize,

    /// How many positions on each side of the current one are preloaded
    pub preload_radius: usize,

    /// Paginate once the current position is this close to the end
    pub pagination_lookahead: usize,

    /// Foreground progress poll interval
    pub progress_interval_ms: u64,

    /// Delay between foreground PLAYING and revealing the surface
    pub surface_reveal_delay_ms: u64,

    /// Frames farther than this from the current position are pruned
    pub frame_cache_radius: usize,

    /// Advance to the next item when a clip ends
    pub auto_advance: bool,

    /// Slot reused when the pool is exhausted (1-based)
    pub fallback_slot: u8,

    /// Initial global mute flag
    pub start_muted: bool,

    /// Capacity of the feed event broadcast channel
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            preload_radius: 1,
            pagination_lookahead: 3,
            progress_interval_ms: 50,
            surface_reveal_delay_ms: 50,
            frame_cache_radius: 2,
            auto_advance: false,
            fallback_slot: 1,
            start_muted: false,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Check tunables for values the scheduler cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }
        if self.pool_size > u8::MAX as usize {
            return Err(Error::Config(format!(
                "pool_size {} exceeds the maximum of {}",
                self.pool_size,
                u8::MAX
            )));
        }
        // Current position plus both neighbor windows must fit without eviction
        let window = 2 * self.preload_radius + 1;
        if self.pool_size < window {
            return Err(Error::Config(format!(
                "pool_size {} cannot hold a preload window of {} positions",
                self.pool_size, window
            )));
        }
        if self.fallback_slot == 0 || self.fallback_slot as usize > self.pool_size {
            return Err(Error::Config(format!(
                "fallback_slot {} is outside 1..={}",
                self.fallback_slot, self.pool_size
            )));
        }
        if self.progress_interval_ms == 0 {
            return Err(Error::Config("progress_interval_ms must be non-zero".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl TomlConfig {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Load configuration following the resolution order
    ///
    /// Returns compiled defaults when no config file can be found.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let Some(path) = resolve_config_path(cli_arg, CONFIG_ENV_VAR) else {
            info!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} does not exist, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Pick the config file path following the priority order
///
/// Explicit paths (CLI, environment) are returned even if missing so the
/// caller can warn about them; the platform default is only returned if it
/// exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/reelfeed/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("reelfeed").join("config.toml"))
}
