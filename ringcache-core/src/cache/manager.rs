//! Replication-aware cache facade

use super::report::{FanOutReport, TargetStatus};
use super::sweeper::TtlSweeper;
use crate::config::CacheSettings;
use crate::monitoring::CacheStats;
use crate::snapshot::RingSnapshot;
use crate::vnode::VNodeManager;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Replication factor used when none is configured
pub const DEFAULT_REPLICATION_COUNT: usize = 3;

/// Fans cache operations out to the replication set of each key.
///
/// The replication set is recomputed on every call from the current ring,
/// so topology changes take effect immediately. Reads are stale-tolerant:
/// the first live replica in ring order wins, with no reconciliation.
pub struct CacheManager {
    vnode_manager: Arc<VNodeManager>,
    replication_count: usize,
    default_ttl_ms: Option<u64>,
    stats: Arc<CacheStats>,
}

impl CacheManager {
    /// Cache over `vnode_manager` with the default replication factor
    pub fn new(vnode_manager: Arc<VNodeManager>) -> Self {
        Self::with_settings(vnode_manager, &CacheSettings::default())
    }

    pub fn with_settings(vnode_manager: Arc<VNodeManager>, settings: &CacheSettings) -> Self {
        Self {
            vnode_manager,
            replication_count: settings.replication_count,
            default_ttl_ms: settings.default_ttl_ms,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn with_replication_count(
        vnode_manager: Arc<VNodeManager>,
        replication_count: usize,
    ) -> Self {
        let settings = CacheSettings {
            replication_count,
            ..CacheSettings::default()
        };
        Self::with_settings(vnode_manager, &settings)
    }

    /// First live value among the replicas of `cache_key`
    pub fn get(&self, cache_key: &str) -> Option<Value> {
        let targets = self
            .vnode_manager
            .replication_targets(cache_key, self.replication_count);

        for vnode in &targets {
            if let Some(value) = vnode.get(cache_key) {
                debug!(cache_key, vnode = vnode.vnode_key(), "cache hit");
                self.stats.record_hit();
                return Some(value);
            }
        }

        debug!(cache_key, replicas = targets.len(), "cache miss");
        self.stats.record_miss();
        None
    }

    /// Write `value` to every vnode in the replication set.
    ///
    /// Without `ttl_ms` the configured default TTL applies.
    pub fn add(&self, cache_key: &str, value: Value, ttl_ms: Option<u64>) -> FanOutReport {
        let ttl_ms = ttl_ms.or(self.default_ttl_ms);
        let targets = self
            .vnode_manager
            .replication_targets(cache_key, self.replication_count);

        let mut report = FanOutReport::with_capacity(self.replication_count, targets.len());
        for vnode in &targets {
            vnode.set(cache_key, value.clone(), ttl_ms);
            report.push(vnode.vnode_key(), TargetStatus::Stored);
        }

        self.stats.record_write();
        self.note_degraded("add", cache_key, &report);
        report
    }

    /// Delete `cache_key` from every vnode in the replication set
    pub fn remove(&self, cache_key: &str) -> FanOutReport {
        let targets = self
            .vnode_manager
            .replication_targets(cache_key, self.replication_count);

        let mut report = FanOutReport::with_capacity(self.replication_count, targets.len());
        for vnode in &targets {
            let status = if vnode.delete(cache_key) {
                TargetStatus::Removed
            } else {
                TargetStatus::NotPresent
            };
            report.push(vnode.vnode_key(), status);
        }

        self.stats.record_delete();
        self.note_degraded("remove", cache_key, &report);
        report
    }

    fn note_degraded(&self, op: &str, cache_key: &str, report: &FanOutReport) {
        if report.is_degraded() {
            self.stats.record_degraded();
            warn!(
                op,
                cache_key,
                requested = report.requested,
                reached = report.reached(),
                "fan-out reached fewer replicas than configured"
            );
        }
    }

    /// Vnode keys currently responsible for `cache_key`, in ring order
    pub fn owners(&self, cache_key: &str) -> Vec<String> {
        self.vnode_manager
            .next_vnode_keys_for_replication(cache_key, self.replication_count)
    }

    pub fn replication_count(&self) -> usize {
        self.replication_count
    }

    pub fn vnode_manager(&self) -> &Arc<VNodeManager> {
        &self.vnode_manager
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    pub fn snapshot(&self) -> RingSnapshot {
        self.vnode_manager.snapshot()
    }

    /// Sweeper purging expired entries from every vnode of this cache
    pub fn sweeper(&self, interval: Duration) -> TtlSweeper {
        TtlSweeper::new(self.vnode_manager.clone(), self.stats.clone(), interval)
    }

    /// Run the sweeper on the current tokio runtime until `shutdown` fires
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        self.sweeper(interval).spawn(shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hash::PinnedHash;
    use crate::vnode::DEFAULT_SHARDS;
    use serde_json::json;

    fn pinned_cache(replication_count: usize) -> (CacheManager, Arc<ManualClock>) {
        let hasher = PinnedHash::new()
            .pin("v1", 100)
            .pin("v2", 200)
            .pin("v3", 300)
            .pin("user:7", 50);
        let clock = Arc::new(ManualClock::default());
        let manager = Arc::new(VNodeManager::with_components(
            DEFAULT_SHARDS,
            Arc::new(hasher),
            clock.clone(),
        ));
        manager.add_vnode("v1", "shardA").unwrap();
        manager.add_vnode("v2", "shardB").unwrap();
        manager.add_vnode("v3", "shardC").unwrap();
        (CacheManager::with_replication_count(manager, replication_count), clock)
    }

    #[test]
    fn test_add_fans_out_in_ring_order() {
        let (cache, _) = pinned_cache(2);
        let report = cache.add("user:7", json!("X"), None);

        assert_eq!(report.vnode_keys(), vec!["v1", "v2"]);
        assert_eq!(report.count(TargetStatus::Stored), 2);
        assert!(!report.is_degraded());
        assert_eq!(cache.snapshot().holders_of("user:7"), vec!["v1", "v2"]);
        assert_eq!(cache.owners("user:7"), vec!["v1", "v2"]);
    }

    #[test]
    fn test_get_reads_first_live_replica() {
        let (cache, _) = pinned_cache(2);
        cache.add("user:7", json!("X"), None);

        // Diverge the replicas; the primary wins
        cache
            .vnode_manager()
            .get_vnode("v2")
            .unwrap()
            .set("user:7", json!("stale"), None);
        assert_eq!(cache.get("user:7"), Some(json!("X")));

        cache.vnode_manager().get_vnode("v1").unwrap().delete("user:7");
        assert_eq!(cache.get("user:7"), Some(json!("stale")));
    }

    #[test]
    fn test_remove_reports_each_target() {
        let (cache, _) = pinned_cache(2);
        cache.add("user:7", json!("X"), None);
        cache.vnode_manager().get_vnode("v2").unwrap().delete("user:7");

        let report = cache.remove("user:7");
        assert_eq!(report.targets[0].status, TargetStatus::Removed);
        assert_eq!(report.targets[1].status, TargetStatus::NotPresent);
        assert_eq!(cache.get("user:7"), None);
    }

    #[test]
    fn test_ttl_applies_to_every_replica() {
        let (cache, clock) = pinned_cache(3);
        cache.add("user:7", json!("X"), Some(100));

        clock.advance_ms(150);
        assert_eq!(cache.get("user:7"), None);
        assert_eq!(cache.snapshot().entry_count(), 0);
    }

    #[test]
    fn test_default_ttl() {
        let hasher = PinnedHash::new().pin("v1", 100);
        let clock = Arc::new(ManualClock::default());
        let manager = Arc::new(VNodeManager::with_components(
            DEFAULT_SHARDS,
            Arc::new(hasher),
            clock.clone(),
        ));
        manager.add_vnode("v1", "shardA").unwrap();
        let settings = CacheSettings {
            replication_count: 1,
            default_ttl_ms: Some(1000),
            sweep_interval_ms: 0,
        };
        let cache = CacheManager::with_settings(manager, &settings);

        cache.add("a", json!(1), None);
        cache.add("b", json!(2), Some(5000));
        clock.advance_ms(2000);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_empty_ring_degrades_without_error() {
        let cache = CacheManager::new(Arc::new(VNodeManager::new()));
        assert_eq!(cache.replication_count(), DEFAULT_REPLICATION_COUNT);

        let report = cache.add("k", json!(1), None);
        assert!(report.is_degraded());
        assert_eq!(report.reached(), 0);
        assert_eq!(cache.get("k"), None);
        assert!(cache.remove("k").targets.is_empty());
        assert_eq!(cache.stats().snapshot().degraded_fanouts, 2);
    }

    #[test]
    fn test_capacity_shortfall_is_degraded() {
        let (cache, _) = pinned_cache(5);
        let report = cache.add("user:7", json!("X"), None);
        assert_eq!(report.reached(), 3);
        assert!(report.is_degraded());
        assert_eq!(cache.get("user:7"), Some(json!("X")));
    }

    #[test]
    fn test_oversized_replication_count_is_degraded() {
        let manager = Arc::new(VNodeManager::new());
        manager.add_vnode("v1", "shardA").unwrap();
        let mut config = crate::config::RingCacheConfig::default();
        config.cache.replication_count = 1 << 60;
        crate::config::ConfigManager::validate_config(&config).unwrap();
        let cache = CacheManager::with_settings(manager, &config.cache);

        let report = cache.add("k", json!(1), None);
        assert_eq!(report.vnode_keys(), vec!["v1"]);
        assert!(report.is_degraded());
        assert_eq!(cache.get("k"), Some(json!(1)));

        let report = cache.remove("k");
        assert_eq!(report.count(TargetStatus::Removed), 1);
        assert_eq!(cache.owners("k"), vec!["v1"]);
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let (cache, _) = pinned_cache(2);
        cache.add("user:7", json!("X"), None);
        cache.get("user:7");
        cache.get("nobody");

        let stats = cache.stats().snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_spawn_sweeper_with_zero_interval_exits_cleanly() {
        let (cache, _) = pinned_cache(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        assert!(cache.spawn_sweeper(Duration::ZERO, shutdown_rx).await.is_ok());
    }
}
