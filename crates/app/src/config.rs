//! Daemon configuration
//!
//! Loaded from `waypoint.toml` in the platform config directory (overridable
//! via `WAYPOINT_CONFIG`). A missing file means defaults; a malformed file is
//! an error, not a silent fallback.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use waypoint_net::{RoomConfig, DEFAULT_PORT};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine platform directories")]
    NoProjectDirs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// TCP port the coordinator listens on
    pub port: u16,
    /// SQLite database path; defaults to the platform data directory
    pub db_path: Option<PathBuf>,
    /// Seconds both duelists have to throw before the duel is abandoned
    pub duel_deadline_secs: u64,
    /// Seconds a schedule vote stays open
    pub vote_deadline_secs: u64,
    /// Seconds a lone drag claim counts as a collision candidate
    pub drag_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = RoomConfig::default();
        Self {
            port: DEFAULT_PORT,
            db_path: None,
            duel_deadline_secs: defaults.duel_deadline.as_secs(),
            vote_deadline_secs: defaults.vote_deadline.as_secs(),
            drag_window_secs: defaults.drag_window.as_secs(),
        }
    }
}

impl Config {
    /// Load from the default location, or defaults if no file exists
    pub fn load() -> Result<Self, ConfigError> {
        let path = match env::var_os("WAYPOINT_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => project_dirs()?.config_dir().join("waypoint.toml"),
        };

        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Resolved database path, creating the data directory if needed
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let path = match &self.db_path {
            Some(path) => path.clone(),
            None => project_dirs()?.data_dir().join("waypoint.db"),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            duel_deadline: Duration::from_secs(self.duel_deadline_secs),
            vote_deadline: Duration::from_secs(self.vote_deadline_secs),
            drag_window: Duration::from_secs(self.drag_window_secs),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("dev", "waypoint", "waypoint").ok_or(ConfigError::NoProjectDirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.duel_deadline_secs, 7);
        assert_eq!(config.vote_deadline_secs, 15);
        assert_eq!(config.drag_window_secs, 3);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.vote_deadline_secs, 15);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Config, _> = toml::from_str("prot = 9000");
        assert!(result.is_err());
    }

    #[test]
    fn room_config_conversion() {
        let config: Config = toml::from_str("duel_deadline_secs = 30").unwrap();
        let room = config.room_config();
        assert_eq!(room.duel_deadline, Duration::from_secs(30));
        assert_eq!(room.vote_deadline, Duration::from_secs(15));
    }
}
