use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinator::PollPolicy;
use crate::errors::{NoteVaultError, Result};

/// Tunables for talking to the vault, loaded from `.notevault.toml`.
///
/// Every field has a default so a missing file is fine.  The poll values
/// only affect `create`, which has to wait for the vault to assign an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds to wait before each create poll attempt (default: 30).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum number of create poll attempts (default: 20).
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Path or name of the `lpass` binary (default: "lpass").
    #[serde(default = "default_lpass_binary")]
    pub lpass_binary: String,
}

// ── Serde default helpers ────────────────────────────────────────────

// Shorter intervals got rate-limited by the vault during bulk creates.
fn default_poll_interval_secs() -> u64 {
    30
}

fn default_poll_attempts() -> u32 {
    20
}

fn default_lpass_binary() -> String {
    "lpass".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_attempts: default_poll_attempts(),
            lpass_binary: default_lpass_binary(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for.
    const FILE_NAME: &'static str = ".notevault.toml";

    /// Load settings from `<dir>/.notevault.toml`.
    ///
    /// A missing file gives the defaults; an unparseable or invalid one is
    /// an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            NoteVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_attempts == 0 {
            return Err(NoteVaultError::ConfigError(
                "poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.lpass_binary.trim().is_empty() {
            return Err(NoteVaultError::ConfigError(
                "lpass_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert the poll settings into the coordinator's policy.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            attempts: self.poll_attempts,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
