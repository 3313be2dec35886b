use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Supervision parameters loaded from `~/.config/mds/config.toml`.
///
/// The case officer takes this struct at construction; nothing in the core
/// reads module-level defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Maximum number of transfers in flight at once (>= 1).
    pub max_active_agents: usize,
    /// Consecutive no-growth polls before a comatose transfer is declared dead.
    pub dead_poll_threshold: u32,
    /// Restarts allowed per case before the transfer is abandoned.
    pub restart_attempt_threshold: u32,
    /// Seconds to wait for the destination file to appear after spawning a worker.
    pub file_creation_timeout_secs: f64,
    /// Seconds between scheduling ticks.
    pub poll_interval_secs: f64,
    /// Total errors (all kinds) a case may accumulate before quarantine.
    pub max_allowable_error_count: u32,
    /// Upper bound in milliseconds on one worker-mailbox read per poll.
    pub mailbox_read_timeout_ms: u64,
    /// Optional pause in seconds between consecutive admissions, for servers
    /// that drop clients opening connections back to back.
    #[serde(default)]
    pub admission_delay_secs: Option<f64>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_active_agents: 4,
            dead_poll_threshold: 5,
            restart_attempt_threshold: 5,
            file_creation_timeout_secs: 30.0,
            poll_interval_secs: 10.0,
            max_allowable_error_count: 5,
            mailbox_read_timeout_ms: 100,
            admission_delay_secs: None,
        }
    }
}

/// Error returned when a configuration value cannot be used.
#[derive(Debug, thiserror::Error)]
#[error("invalid config: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active_agents < 1 {
            return Err(ConfigError {
                field: "max_active_agents",
                reason: "must be at least 1",
            });
        }
        if self.file_creation_timeout_secs <= 0.0 {
            return Err(ConfigError {
                field: "file_creation_timeout_secs",
                reason: "must be positive",
            });
        }
        if self.poll_interval_secs <= 0.0 {
            return Err(ConfigError {
                field: "poll_interval_secs",
                reason: "must be positive",
            });
        }
        if let Some(delay) = self.admission_delay_secs {
            if delay < 0.0 {
                return Err(ConfigError {
                    field: "admission_delay_secs",
                    reason: "must not be negative",
                });
            }
        }
        Ok(())
    }

    pub fn file_creation_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.file_creation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn mailbox_read_timeout(&self) -> Duration {
        Duration::from_millis(self.mailbox_read_timeout_ms)
    }

    pub fn admission_delay(&self) -> Option<Duration> {
        self.admission_delay_secs.map(Duration::from_secs_f64)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mds")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SupervisorConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SupervisorConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SupervisorConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
