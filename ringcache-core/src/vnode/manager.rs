//! Vnode, shard and ring bookkeeping
//!
//! The vnode map, the shard map and the hash ring are guarded together by a
//! single lock: adding or removing a vnode touches all three, and readers
//! resolving a replication set must never see a partial update. Storage
//! operations on a resolved vnode happen outside this lock.

use super::VNode;
use crate::clock::{Clock, SystemClock};
use crate::config::TopologySettings;
use crate::error::{CacheError, CacheResult};
use crate::hash::{HashFunction, Sha256Hash};
use crate::ring::ConsistentHashRing;
use crate::snapshot::{RingPointView, RingSnapshot, SnapshotEntry};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Shards every manager starts with unless configured otherwise
pub const DEFAULT_SHARDS: [&str; 4] = ["shardA", "shardB", "shardC", "shardD"];

struct Topology {
    vnodes: HashMap<String, Arc<VNode>>,
    shards: BTreeMap<String, BTreeSet<String>>,
    ring: ConsistentHashRing,
}

/// Owner of the ring, the shards and every vnode
pub struct VNodeManager {
    topology: RwLock<Topology>,
    clock: Arc<dyn Clock>,
}

impl VNodeManager {
    /// Manager with the default shards, SHA-256 placement and the wall clock
    pub fn new() -> Self {
        Self::with_components(DEFAULT_SHARDS, Arc::new(Sha256Hash), Arc::new(SystemClock))
    }

    /// Manager seeded with `shards`, placing keys with `hasher` and stamping
    /// entries of the vnodes it creates with `clock`
    pub fn with_components<I, S>(
        shards: I,
        hasher: Arc<dyn HashFunction>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shards = shards
            .into_iter()
            .map(|shard| (shard.into(), BTreeSet::new()))
            .collect();

        Self {
            topology: RwLock::new(Topology {
                vnodes: HashMap::new(),
                shards,
                ring: ConsistentHashRing::new(hasher),
            }),
            clock,
        }
    }

    /// Build the topology described by `settings`
    pub fn from_settings(
        settings: &TopologySettings,
        hasher: Arc<dyn HashFunction>,
        clock: Arc<dyn Clock>,
    ) -> CacheResult<Self> {
        let manager = Self::with_components(settings.shards.iter().cloned(), hasher, clock);
        for vnode in &settings.vnodes {
            manager.add_vnode(&vnode.key, &vnode.shard)?;
        }
        Ok(manager)
    }

    /// Register a new vnode in `shard_key`
    pub fn add_vnode(&self, vnode_key: &str, shard_key: &str) -> CacheResult<()> {
        self.add_vnode_with(vnode_key, shard_key, None)
    }

    /// Register a vnode, optionally supplying its backing storage.
    ///
    /// With `existing`, an already registered key is allowed and its storage
    /// is swapped for the supplied one; ring position and shard membership
    /// stay as they are.
    pub fn add_vnode_with(
        &self,
        vnode_key: &str,
        shard_key: &str,
        existing: Option<Arc<VNode>>,
    ) -> CacheResult<()> {
        let mut topology = self.topology.write();

        if !topology.shards.contains_key(shard_key) {
            return Err(CacheError::ShardNotFound(shard_key.to_string()));
        }

        if vnode_key.is_empty() {
            return Err(CacheError::InvalidKey(vnode_key.to_string()));
        }

        if let Some(vnode) = &existing {
            if vnode.vnode_key() != vnode_key {
                return Err(CacheError::InvalidKey(vnode.vnode_key().to_string()));
            }
            if vnode.shard_key() != shard_key {
                return Err(CacheError::ShardMismatch {
                    vnode_key: vnode_key.to_string(),
                    bound: vnode.shard_key().to_string(),
                    requested: shard_key.to_string(),
                });
            }
        }

        if let Some(current) = topology.vnodes.get(vnode_key) {
            let Some(replacement) = existing else {
                return Err(CacheError::DuplicateVNode(vnode_key.to_string()));
            };
            if current.shard_key() != shard_key {
                return Err(CacheError::ShardMismatch {
                    vnode_key: vnode_key.to_string(),
                    bound: current.shard_key().to_string(),
                    requested: shard_key.to_string(),
                });
            }
            topology.vnodes.insert(vnode_key.to_string(), replacement);
            info!(vnode_key, shard_key, "vnode storage replaced");
            return Ok(());
        }

        let point = topology.ring.hash(vnode_key);
        if let Some(owner) = topology.ring.vnode_at(point) {
            return Err(CacheError::HashCollision {
                vnode_key: vnode_key.to_string(),
                owner: owner.to_string(),
                point,
            });
        }

        let vnode = existing.unwrap_or_else(|| {
            Arc::new(VNode::with_clock(vnode_key, shard_key, self.clock.clone()))
        });

        let topology = &mut *topology;
        topology.vnodes.insert(vnode_key.to_string(), vnode);
        if let Some(members) = topology.shards.get_mut(shard_key) {
            members.insert(vnode_key.to_string());
        }
        topology.ring.add_point(vnode_key);

        info!(vnode_key, shard_key, point, "vnode added");
        Ok(())
    }

    /// Unregister a vnode; returns `false` (and logs) when nothing was removed
    pub fn delete_vnode(&self, vnode_key: &str) -> bool {
        let mut topology = self.topology.write();

        let Some(vnode) = topology.vnodes.get(vnode_key).cloned() else {
            warn!(vnode_key, "No vnode exists by key");
            return false;
        };

        if !topology.shards.contains_key(vnode.shard_key()) {
            warn!(vnode_key, shard_key = vnode.shard_key(), "No shard exists for vnode");
            return false;
        }

        topology.vnodes.remove(vnode_key);
        topology.ring.delete_point(vnode_key);
        if let Some(members) = topology.shards.get_mut(vnode.shard_key()) {
            members.remove(vnode_key);
        }

        info!(vnode_key, shard_key = vnode.shard_key(), "vnode deleted");
        true
    }

    pub fn get_vnode(&self, vnode_key: &str) -> Option<Arc<VNode>> {
        self.topology.read().vnodes.get(vnode_key).cloned()
    }

    /// Primary owner of `cache_key`
    pub fn vnode_key_for_cache_key(&self, cache_key: &str) -> Option<String> {
        self.topology
            .read()
            .ring
            .immediate_next_point(cache_key)
            .map(str::to_string)
    }

    /// Ordered keys of up to `replication_count` distinct vnodes for `cache_key`
    pub fn next_vnode_keys_for_replication(
        &self,
        cache_key: &str,
        replication_count: usize,
    ) -> Vec<String> {
        let topology = self.topology.read();
        if topology.ring.is_empty() {
            return Vec::new();
        }
        topology
            .ring
            .immediate_next_n_points(cache_key, replication_count)
    }

    /// Replication set for `cache_key` resolved to vnode handles under one
    /// read of the topology
    pub fn replication_targets(
        &self,
        cache_key: &str,
        replication_count: usize,
    ) -> Vec<Arc<VNode>> {
        let topology = self.topology.read();
        if topology.ring.is_empty() {
            return Vec::new();
        }
        let keys = topology
            .ring
            .immediate_next_n_points(cache_key, replication_count);
        let targets = keys
            .iter()
            .filter_map(|key| topology.vnodes.get(key).cloned())
            .collect();
        targets
    }

    /// Create an empty shard
    pub fn add_shard(&self, shard_key: &str) -> CacheResult<()> {
        if shard_key.is_empty() {
            return Err(CacheError::InvalidKey(shard_key.to_string()));
        }

        let mut topology = self.topology.write();
        if topology.shards.contains_key(shard_key) {
            return Err(CacheError::DuplicateShard(shard_key.to_string()));
        }
        topology.shards.insert(shard_key.to_string(), BTreeSet::new());

        info!(shard_key, "shard added");
        Ok(())
    }

    /// Remove a shard that no longer holds any vnode
    pub fn remove_shard(&self, shard_key: &str) -> CacheResult<()> {
        let mut topology = self.topology.write();

        let members = topology
            .shards
            .get(shard_key)
            .map(BTreeSet::len)
            .ok_or_else(|| CacheError::ShardNotFound(shard_key.to_string()))?;

        if members > 0 {
            return Err(CacheError::ShardNotEmpty {
                shard_key: shard_key.to_string(),
                members,
            });
        }
        topology.shards.remove(shard_key);

        info!(shard_key, "shard removed");
        Ok(())
    }

    /// Shard keys in ascending order
    pub fn shards(&self) -> Vec<String> {
        self.topology.read().shards.keys().cloned().collect()
    }

    /// Vnode keys assigned to `shard_key`
    pub fn shard_members(&self, shard_key: &str) -> Option<Vec<String>> {
        self.topology
            .read()
            .shards
            .get(shard_key)
            .map(|members| members.iter().cloned().collect())
    }

    /// Every registered vnode, in ring order
    pub fn vnodes(&self) -> Vec<Arc<VNode>> {
        let topology = self.topology.read();
        let vnodes = topology
            .ring
            .points()
            .filter_map(|(_, key)| topology.vnodes.get(key).cloned())
            .collect();
        vnodes
    }

    pub fn vnode_count(&self) -> usize {
        self.topology.read().vnodes.len()
    }

    pub fn ring_len(&self) -> usize {
        self.topology.read().ring.len()
    }

    /// Diagnostic view of every ring point in ascending order
    pub fn snapshot(&self) -> RingSnapshot {
        let topology = self.topology.read();

        let points = topology
            .ring
            .points()
            .map(|(point, vnode_key)| {
                let vnode = topology.vnodes.get(vnode_key);
                RingPointView {
                    point,
                    vnode_key: vnode_key.to_string(),
                    shard_key: vnode.map(|v| v.shard_key().to_string()).unwrap_or_default(),
                    entries: vnode
                        .map(|v| {
                            v.list()
                                .into_iter()
                                .map(|(cache_key, entry)| SnapshotEntry {
                                    cache_key,
                                    value: entry.value,
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();

        RingSnapshot { points }
    }

    /// Cross-structure invariant violations, empty when consistent.
    ///
    /// Every registered vnode must sit on the ring exactly once and belong
    /// to exactly one shard (its own), and neither the ring nor any shard
    /// may reference an unregistered vnode.
    pub fn consistency_violations(&self) -> Vec<String> {
        let topology = self.topology.read();
        let mut violations = Vec::new();

        for (key, vnode) in &topology.vnodes {
            if vnode.vnode_key() != key {
                violations.push(format!("vnode {} stored under key {}", vnode.vnode_key(), key));
            }
            if topology.ring.point_of(key).is_none() {
                violations.push(format!("vnode {} is not on the ring", key));
            }

            let holders: Vec<&String> = topology
                .shards
                .iter()
                .filter(|(_, members)| members.contains(key))
                .map(|(shard, _)| shard)
                .collect();
            match holders.as_slice() {
                [shard] if shard.as_str() == vnode.shard_key() => {}
                _ => violations.push(format!(
                    "vnode {} bound to {} but held by shards {:?}",
                    key,
                    vnode.shard_key(),
                    holders
                )),
            }
        }

        for (point, key) in topology.ring.points() {
            if !topology.vnodes.contains_key(key) {
                violations.push(format!("ring point {} references unknown vnode {}", point, key));
            }
        }

        for (shard, members) in &topology.shards {
            for key in members {
                if !topology.vnodes.contains_key(key) {
                    violations.push(format!("shard {} references unknown vnode {}", shard, key));
                }
            }
        }

        violations
    }

    pub fn is_consistent(&self) -> bool {
        self.consistency_violations().is_empty()
    }
}

impl Default for VNodeManager {
    fn default() -> Self {
        Self::new()
    }
}
