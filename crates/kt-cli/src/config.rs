//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use kt_engine::{EngineConfig, SnapshotOptions};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Tenant key stored with every row.
    pub user_id: String,
    /// Gap in minutes after which a focus block ends.
    pub idle_threshold_minutes: i64,
    /// How many keys `stats` ranks.
    pub max_key_results: usize,
    /// Delay after a minute ends before its bucket is flushed.
    pub flush_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("keytally.db"),
            user_id: kt_db::DEFAULT_USER_ID.to_string(),
            idle_threshold_minutes: kt_core::DEFAULT_IDLE_THRESHOLD_MINUTES,
            max_key_results: 10,
            flush_grace_ms: 500,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `path`, then `KT_*`
    /// environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("KT_"));

        figment.extract()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            flush_grace: Duration::from_millis(self.flush_grace_ms),
        }
    }

    pub const fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            max_key_results: self.max_key_results,
            idle_threshold_minutes: self.idle_threshold_minutes,
        }
    }
}

/// Returns the platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("keytally"))
}

/// Returns the platform-specific data directory.
///
/// On Linux: `~/.local/share/keytally`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("keytally"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("keytally.db"));
        assert_eq!(data_dir.file_name().unwrap(), "keytally");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.user_id, "local");
        assert_eq!(config.idle_threshold_minutes, 5);
        assert_eq!(config.max_key_results, 10);
        assert_eq!(config.engine_config().flush_grace, Duration::from_millis(500));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "database_path = \"/tmp/keys.db\"").unwrap();
        writeln!(file, "idle_threshold_minutes = 10").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/keys.db"));
        assert_eq!(config.snapshot_options().idle_threshold_minutes, 10);
        assert_eq!(config.snapshot_options().max_key_results, 10);
    }
}
