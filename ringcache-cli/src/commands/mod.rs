pub mod shell;

pub use shell::*;

use anyhow::{bail, Context, Result};
use ringcache_core::{
    CacheManager, ConfigManager, RingCacheConfig, Sha256Hash, SystemClock, VNodeManager,
    VNodeSettings,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Default configuration with one vnode per default shard
pub fn starter_config() -> RingCacheConfig {
    let mut config = RingCacheConfig::default();
    config.topology.vnodes = config
        .topology
        .shards
        .iter()
        .enumerate()
        .map(|(i, shard)| VNodeSettings {
            key: format!("vnode-{}", i + 1),
            shard: shard.clone(),
        })
        .collect();
    config
}

/// Build the cache described by `config` on the system clock
pub fn build_cache(config: &RingCacheConfig) -> Result<CacheManager> {
    let vnode_manager = VNodeManager::from_settings(
        &config.topology,
        Arc::new(Sha256Hash),
        Arc::new(SystemClock),
    )
    .context("Failed to build topology")?;

    Ok(CacheManager::with_settings(
        Arc::new(vnode_manager),
        &config.cache,
    ))
}

pub fn execute_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    ConfigManager::save_config(path, &starter_config())?;
    info!("Wrote starter configuration to {}", path.display());
    println!("Configuration written to {}", path.display());
    Ok(())
}

pub fn execute_check(path: &Path) -> Result<()> {
    let config = ConfigManager::load_config(path)?;
    let cache = build_cache(&config)?;
    let manager = cache.vnode_manager();

    let violations = manager.consistency_violations();
    if !violations.is_empty() {
        bail!("Topology is inconsistent: {}", violations.join("; "));
    }

    println!("Configuration OK: {}", path.display());
    println!("{}", "=".repeat(50));
    println!("Shards: {}", manager.shards().join(", "));
    println!("Vnodes: {}", manager.vnode_count());
    println!("Replication count: {}", cache.replication_count());
    if manager.vnode_count() < cache.replication_count() {
        println!(
            "Warning: only {} vnode(s) for a replication count of {}",
            manager.vnode_count(),
            cache.replication_count()
        );
    }
    Ok(())
}

pub fn execute_view(path: &Path, json: bool) -> Result<()> {
    let config = ConfigManager::load_config(path)?;
    let cache = build_cache(&config)?;
    let snapshot = cache.snapshot();

    if json {
        println!("{}", snapshot.to_json()?);
    } else {
        print!("{}", snapshot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_starter_config_is_valid() {
        let config = starter_config();
        ConfigManager::validate_config(&config).unwrap();
        assert_eq!(config.topology.vnodes.len(), config.topology.shards.len());

        let cache = build_cache(&config).unwrap();
        assert_eq!(cache.vnode_manager().vnode_count(), 4);
        assert!(cache.vnode_manager().is_consistent());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ringcache.toml");

        execute_init(&path, false).unwrap();
        assert!(execute_init(&path, false).is_err());
        execute_init(&path, true).unwrap();

        assert_eq!(ConfigManager::load_config(&path).unwrap(), starter_config());
    }

    #[test]
    fn test_check_and_view_read_written_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ringcache.toml");

        assert!(execute_check(&path).is_err());

        execute_init(&path, false).unwrap();
        execute_check(&path).unwrap();
        execute_view(&path, false).unwrap();
        execute_view(&path, true).unwrap();
    }
}
