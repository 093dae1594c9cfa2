//! Engine configuration
//!
//! Plain serde structs with defaults; loaded from a JSON file when one is
//! given. Missing fields fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Default capacity for broadcast channels (engine events and bus topics)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default file name of the durable store inside the data directory
pub const DEFAULT_DATA_FILE: &str = "marksync.redb";

/// Settings for the in-process broadcast bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Frames buffered per subscriber before a slow subscriber starts
    /// dropping the oldest ones
    pub capacity: usize,
    /// Whether a publisher also receives its own frames
    pub echo_to_publisher: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            echo_to_publisher: true,
        }
    }
}

/// Settings for one engine and the collaborators the binary builds for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the engine's `EngineEvent` channel
    pub event_capacity: usize,
    /// Broadcast bus settings
    pub bus: BusConfig,
    /// File name of the durable store inside the data directory
    pub data_file: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
            bus: BusConfig::default(),
            data_file: DEFAULT_DATA_FILE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self =
            serde_json::from_str(&data).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data =
            serde_json::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> SyncResult<()> {
        if self.event_capacity == 0 {
            return Err(SyncError::Config("event_capacity must be at least 1".into()));
        }
        if self.bus.capacity == 0 {
            return Err(SyncError::Config("bus.capacity must be at least 1".into()));
        }
        if self.data_file.trim().is_empty() {
            return Err(SyncError::Config("data_file must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.bus.capacity, 256);
        assert!(config.bus.echo_to_publisher);
        assert_eq!(config.data_file, "marksync.redb");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "bus": { "echo_to_publisher": false } }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.bus.echo_to_publisher);
        assert_eq!(config.bus.capacity, 256);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig {
            event_capacity: 8,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "bus": { "capacity": 0 } }"#).unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(SyncError::Config(_))
        ));
    }
}
