//! Virtual node storage
//!
//! Each vnode owns its own concurrent key/value table, so replicated
//! operations on distinct vnodes never contend with each other.

pub mod manager;

pub use manager::*;

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Stored value with its expiry metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    /// Lifetime in milliseconds, counted from `created_at`
    pub ttl_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: Value, ttl_ms: Option<u64>, created_at: DateTime<Utc>) -> Self {
        Self {
            value,
            ttl_ms,
            created_at,
        }
    }

    /// True once more than `ttl_ms` has elapsed since creation
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_ms {
            Some(ttl_ms) => {
                let age_ms = now.signed_duration_since(self.created_at).num_milliseconds();
                age_ms > i64::try_from(ttl_ms).unwrap_or(i64::MAX)
            }
            None => false,
        }
    }
}

/// A named storage partition bound to one shard
pub struct VNode {
    vnode_key: String,
    shard_key: String,
    storage: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    operation_count: AtomicU64,
}

impl VNode {
    /// Create a vnode on the wall clock
    pub fn new(vnode_key: impl Into<String>, shard_key: impl Into<String>) -> Self {
        Self::with_clock(vnode_key, shard_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        vnode_key: impl Into<String>,
        shard_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vnode_key: vnode_key.into(),
            shard_key: shard_key.into(),
            storage: DashMap::new(),
            clock,
            operation_count: AtomicU64::new(0),
        }
    }

    pub fn vnode_key(&self) -> &str {
        &self.vnode_key
    }

    pub fn shard_key(&self) -> &str {
        &self.shard_key
    }

    /// Read a live value.
    ///
    /// An expired entry is removed on this read and reported as missing.
    pub fn get(&self, cache_key: &str) -> Option<Value> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();

        match self.storage.get(cache_key) {
            Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Re-check under the shard write lock so a concurrent fresh write survives
        if self
            .storage
            .remove_if(cache_key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            debug!(vnode = %self.vnode_key, cache_key, "expired entry evicted on read");
        }
        None
    }

    /// Store `value`, replacing any previous entry and restarting its TTL
    pub fn set(&self, cache_key: impl Into<String>, value: Value, ttl_ms: Option<u64>) {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry::new(value, ttl_ms, self.clock.now());
        self.storage.insert(cache_key.into(), entry);
    }

    /// Remove `cache_key`; returns whether an entry was present
    pub fn delete(&self, cache_key: &str) -> bool {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        self.storage.remove(cache_key).is_some()
    }

    /// Every stored entry, expired or not, sorted by key
    pub fn list(&self) -> Vec<(String, CacheEntry)> {
        let mut entries: Vec<_> = self
            .storage
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;
        self.storage.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn stats(&self) -> VNodeStats {
        VNodeStats {
            operation_count: self.operation_count.load(Ordering::Relaxed),
            entry_count: self.storage.len() as u64,
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("vnode_key", &self.vnode_key)
            .field("shard_key", &self.shard_key)
            .field("entries", &self.storage.len())
            .finish()
    }
}

/// Vnode statistics
#[derive(Debug, Clone)]
pub struct VNodeStats {
    pub operation_count: u64,
    pub entry_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn vnode_with_clock() -> (VNode, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let vnode = VNode::with_clock("v1", "shardA", clock.clone());
        (vnode, clock)
    }

    #[test]
    fn test_set_get_delete() {
        let (vnode, _) = vnode_with_clock();
        assert_eq!(vnode.vnode_key(), "v1");
        assert_eq!(vnode.shard_key(), "shardA");

        vnode.set("user:7", json!("X"), None);
        assert_eq!(vnode.get("user:7"), Some(json!("X")));

        assert!(vnode.delete("user:7"));
        assert_eq!(vnode.get("user:7"), None);
        // Idempotent
        assert!(!vnode.delete("user:7"));
    }

    #[test]
    fn test_set_overwrites() {
        let (vnode, _) = vnode_with_clock();
        vnode.set("k", json!(1), None);
        vnode.set("k", json!({"n": 2}), None);
        assert_eq!(vnode.get("k"), Some(json!({"n": 2})));
        assert_eq!(vnode.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let (vnode, clock) = vnode_with_clock();
        vnode.set("session", json!("abc"), Some(100));

        clock.advance_ms(150);
        assert_eq!(vnode.get("session"), None);
        assert!(vnode.list().is_empty());
    }

    #[test]
    fn test_entry_live_at_exact_ttl() {
        let (vnode, clock) = vnode_with_clock();
        vnode.set("session", json!("abc"), Some(100));

        clock.advance_ms(100);
        assert_eq!(vnode.get("session"), Some(json!("abc")));

        clock.advance_ms(1);
        assert_eq!(vnode.get("session"), None);
    }

    #[test]
    fn test_reads_do_not_refresh_ttl() {
        let (vnode, clock) = vnode_with_clock();
        vnode.set("k", json!(true), Some(100));

        clock.advance_ms(80);
        assert!(vnode.get("k").is_some());
        clock.advance_ms(80);
        assert!(vnode.get("k").is_none());
    }

    #[test]
    fn test_rewrite_restarts_ttl() {
        let (vnode, clock) = vnode_with_clock();
        vnode.set("k", json!(1), Some(100));
        clock.advance_ms(80);
        vnode.set("k", json!(2), Some(100));
        clock.advance_ms(80);
        assert_eq!(vnode.get("k"), Some(json!(2)));
    }

    #[test]
    fn test_list_keeps_unread_expired_entries() {
        let (vnode, clock) = vnode_with_clock();
        vnode.set("b", json!(2), Some(10));
        vnode.set("a", json!(1), None);
        clock.advance_ms(50);

        let keys: Vec<_> = vnode.list().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_purge_expired() {
        let (vnode, clock) = vnode_with_clock();
        vnode.set("short", json!(1), Some(10));
        vnode.set("long", json!(2), Some(10_000));
        vnode.set("forever", json!(3), None);

        clock.advance_ms(20);
        assert_eq!(vnode.purge_expired(), 1);
        assert_eq!(vnode.len(), 2);
        assert_eq!(vnode.purge_expired(), 0);
    }

    #[test]
    fn test_stats() {
        let (vnode, _) = vnode_with_clock();
        vnode.set("a", json!(1), None);
        vnode.get("a");
        vnode.get("missing");

        let stats = vnode.stats();
        assert_eq!(stats.operation_count, 3);
        assert_eq!(stats.entry_count, 1);
    }
}
