//! Configuration management for RingCache
//!
//! This module provides:
//! - TOML-backed configuration with defaults for missing sections
//! - Validation before a configuration is accepted
//! - Reload from file for long-running processes

use crate::monitoring::LoggingConfig;
use crate::vnode::DEFAULT_SHARDS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// RingCache configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingCacheConfig {
    /// Replication and expiry settings
    pub cache: CacheSettings,
    /// Initial shards and vnodes
    pub topology: TopologySettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Number of distinct vnodes each key is written to
    pub replication_count: usize,
    /// TTL applied when a write carries none (None = no expiry)
    pub default_ttl_ms: Option<u64>,
    /// Background sweep interval in milliseconds (0 disables the sweeper)
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Shards created at startup
    pub shards: Vec<String>,
    /// Vnodes registered at startup, in order
    pub vnodes: Vec<VNodeSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VNodeSettings {
    pub key: String,
    pub shard: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level
    pub level: LogLevel,
    /// Log format
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            replication_count: 3,
            default_ttl_ms: None,
            sweep_interval_ms: 1000,
        }
    }
}

impl CacheSettings {
    /// Sweep interval, `None` when the sweeper is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS.iter().map(|s| s.to_string()).collect(),
            vnodes: Vec::new(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
        }
    }
}

impl LoggingSettings {
    pub fn to_logging_config(&self) -> LoggingConfig {
        let level = match self.level {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        };
        LoggingConfig {
            level: level.to_string(),
            json_format: self.format == LogFormat::Json,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    /// Current configuration
    config: Arc<RwLock<RingCacheConfig>>,
    /// Configuration file path
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load the configuration at `config_path`, writing defaults there if the
    /// file does not exist yet
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            let default_config = RingCacheConfig::default();
            Self::save_config(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get current configuration
    pub async fn get_config(&self) -> RingCacheConfig {
        self.config.read().await.clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Reload configuration from file; the old configuration stays in place
    /// if the file is invalid
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(&self.config_path)?;
        *self.config.write().await = new_config;

        info!("Configuration reloaded from {}", self.config_path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate_config(config: &RingCacheConfig) -> Result<()> {
        if config.cache.replication_count == 0 {
            return Err(anyhow::anyhow!("Replication count cannot be 0"));
        }

        if config.cache.default_ttl_ms == Some(0) {
            return Err(anyhow::anyhow!("Default TTL cannot be 0"));
        }

        if config.topology.shards.is_empty() {
            return Err(anyhow::anyhow!("At least one shard must be configured"));
        }

        let mut shards = HashSet::new();
        for shard in &config.topology.shards {
            if shard.is_empty() {
                return Err(anyhow::anyhow!("Shard keys cannot be empty"));
            }
            if !shards.insert(shard.as_str()) {
                return Err(anyhow::anyhow!("Duplicate shard: {}", shard));
            }
        }

        let mut vnodes = HashSet::new();
        for vnode in &config.topology.vnodes {
            if vnode.key.is_empty() {
                return Err(anyhow::anyhow!("Vnode keys cannot be empty"));
            }
            if !vnodes.insert(vnode.key.as_str()) {
                return Err(anyhow::anyhow!("Duplicate vnode: {}", vnode.key));
            }
            if !shards.contains(vnode.shard.as_str()) {
                return Err(anyhow::anyhow!(
                    "Vnode {} references unknown shard {}",
                    vnode.key,
                    vnode.shard
                ));
            }
        }

        Ok(())
    }

    /// Load and validate configuration from file
    pub fn load_config(path: &Path) -> Result<RingCacheConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RingCacheConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Self::validate_config(&config)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_config(path: &Path, config: &RingCacheConfig) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        let content =
            toml::to_string_pretty(config).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RingCacheConfig::default();
        assert_eq!(config.cache.replication_count, 3);
        assert_eq!(config.topology.shards, vec!["shardA", "shardB", "shardC", "shardD"]);
        assert!(config.topology.vnodes.is_empty());
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RingCacheConfig::default();
        config.cache.replication_count = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = RingCacheConfig::default();
        config.cache.default_ttl_ms = Some(0);
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = RingCacheConfig::default();
        config.topology.shards.push("shardA".into());
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = RingCacheConfig::default();
        config.topology.vnodes.push(VNodeSettings {
            key: "v1".into(),
            shard: "shardZ".into(),
        });
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = RingCacheConfig::default();
        let vnode = VNodeSettings {
            key: "v1".into(),
            shard: "shardA".into(),
        };
        config.topology.vnodes.push(vnode.clone());
        assert!(ConfigManager::validate_config(&config).is_ok());
        config.topology.vnodes.push(vnode);
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RingCacheConfig = toml::from_str(
            r#"
            [cache]
            replication_count = 2

            [[topology.vnodes]]
            key = "v1"
            shard = "shardB"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.replication_count, 2);
        assert_eq!(config.cache.sweep_interval_ms, 1000);
        assert_eq!(config.topology.shards.len(), 4);
        assert_eq!(config.topology.vnodes[0].shard, "shardB");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_sweep_interval() {
        let mut settings = CacheSettings::default();
        assert_eq!(settings.sweep_interval(), Some(Duration::from_millis(1000)));
        settings.sweep_interval_ms = 0;
        assert_eq!(settings.sweep_interval(), None);
    }

    #[test]
    fn test_logging_settings_conversion() {
        let settings = LoggingSettings {
            level: LogLevel::Debug,
            format: LogFormat::Json,
        };
        let config = settings.to_logging_config();
        assert_eq!(config.level, "DEBUG");
        assert!(config.json_format);
    }

    #[tokio::test]
    async fn test_config_manager_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ringcache.toml");

        let manager = ConfigManager::new(config_path.clone()).unwrap();
        assert!(config_path.exists());
        assert_eq!(manager.config_path(), config_path.as_path());

        let config = manager.get_config().await;
        assert_eq!(config, RingCacheConfig::default());
    }

    #[tokio::test]
    async fn test_config_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ringcache.toml");
        let manager = ConfigManager::new(config_path.clone()).unwrap();

        let mut updated = RingCacheConfig::default();
        updated.cache.replication_count = 5;
        updated.cache.default_ttl_ms = Some(30_000);
        ConfigManager::save_config(&config_path, &updated).unwrap();

        manager.reload_config().await.unwrap();
        assert_eq!(manager.get_config().await, updated);

        // An invalid file leaves the loaded config untouched
        std::fs::write(&config_path, "[cache]\nreplication_count = 0\n").unwrap();
        assert!(manager.reload_config().await.is_err());
        assert_eq!(manager.get_config().await.cache.replication_count, 5);
    }
}
