use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::actor::caps;
use crate::error::{AdboardError, Result};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CooldownConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Cooldown applied when no rank grant matches, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub default_secs: u64,
    /// Rank name → cooldown seconds. Each rank is reachable through the
    /// `adboard.cooldown.<rank>` capability; the minimum matching grant wins.
    #[serde(default)]
    pub ranks: HashMap<String, u64>,
}

fn default_cooldown_secs() -> u64 {
    300
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default_secs: default_cooldown_secs(),
            ranks: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ModerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// When set, submissions skip confirmation and land in the review queue.
    #[serde(default)]
    pub require_review: bool,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Case-insensitive substring blacklist.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

fn default_min_length() -> usize {
    10
}

fn default_max_length() -> usize {
    150
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            require_review: false,
            min_length: default_min_length(),
            max_length: default_max_length(),
            blacklist: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SettingsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Gates the chattier debug-level log paths.
    #[serde(default)]
    pub debug: bool,
    /// How many one-second countdown notices to push after an on-cooldown
    /// rejection before going quiet.
    #[serde(default = "default_countdown_ticks")]
    pub countdown_notice_ticks: u32,
}

fn default_countdown_ticks() -> u32 {
    3
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            debug: false,
            countdown_notice_ticks: default_countdown_ticks(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub cooldowns: CooldownConfig,
    /// How long a pending submission waits for confirm/cancel before expiring.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_confirmation_timeout() -> u64 {
    60
}

fn default_database_path() -> PathBuf {
    PathBuf::from("adboard.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            cooldowns: CooldownConfig::default(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            moderation: ModerationConfig::default(),
            settings: SettingsConfig::default(),
            database_path: default_database_path(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AdboardError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(path, data.as_bytes())
    }

    /// Capability → seconds pairs for every configured rank, rebuilt wholesale.
    /// Callers swap the result in one piece so readers never see a partial
    /// table.
    pub fn rank_table(&self) -> Vec<(String, u64)> {
        self.cooldowns
            .ranks
            .iter()
            .map(|(rank, secs)| (caps::rank(rank), *secs))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.moderation.max_length < self.moderation.min_length {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "moderation.max_length ({}) is below moderation.min_length ({})",
                    self.moderation.max_length, self.moderation.min_length
                ),
            });
        }

        if self.confirmation_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "confirmation_timeout_secs is 0; pending ads would expire immediately"
                    .to_string(),
            });
        }

        if self.cooldowns.default_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "cooldowns.default_secs is 0; unranked users have no rate limit"
                    .to_string(),
            });
        }

        for (rank, secs) in &self.cooldowns.ranks {
            if *secs == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("rank '{rank}' has a 0s cooldown"),
                });
            }
        }

        for word in &self.moderation.blacklist {
            if word.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "moderation.blacklist contains an empty entry".to_string(),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting the config file.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
