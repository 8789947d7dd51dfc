//! Consistent hash ring
//!
//! Every vnode occupies one point on a circular 32-bit space. A cache key is
//! served by the first vnode at or after its own hash, walking clockwise and
//! wrapping from the largest point back to the smallest. Removing a point
//! only shifts the keys that resolved to it onto the next point; nothing
//! else moves.

use crate::hash::{HashFunction, Sha256Hash};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sorted hash points mapped to the vnode keys that own them
#[derive(Clone)]
pub struct ConsistentHashRing {
    /// Ring position -> vnode key, kept in ascending order
    points: BTreeMap<u32, String>,
    hasher: Arc<dyn HashFunction>,
}

impl ConsistentHashRing {
    /// Create an empty ring placing keys with `hasher`
    pub fn new(hasher: Arc<dyn HashFunction>) -> Self {
        Self {
            points: BTreeMap::new(),
            hasher,
        }
    }

    /// Position of `key` on the ring
    pub fn hash(&self, key: &str) -> u32 {
        self.hasher.hash(key)
    }

    /// Place `vnode_key` on the ring.
    ///
    /// Returns `false` without touching the ring if its point is already
    /// taken, whether by the same key or by a colliding one.
    pub fn add_point(&mut self, vnode_key: &str) -> bool {
        let point = self.hash(vnode_key);

        if let Some(owner) = self.points.get(&point) {
            if owner == vnode_key {
                debug!(vnode_key, point, "vnode already on ring");
            } else {
                warn!(vnode_key, point, owner = %owner, "hash point collision, vnode not placed");
            }
            return false;
        }

        self.points.insert(point, vnode_key.to_string());
        debug!(vnode_key, point, "added point to ring");
        true
    }

    /// Remove the point owned by `vnode_key`.
    ///
    /// A point owned by a different key is left alone.
    pub fn delete_point(&mut self, vnode_key: &str) -> bool {
        let point = self.hash(vnode_key);

        match self.points.get(&point) {
            Some(owner) if owner == vnode_key => {
                self.points.remove(&point);
                debug!(vnode_key, point, "removed point from ring");
                true
            }
            _ => false,
        }
    }

    /// Vnode owning the first point at or after `key`'s hash, wrapping to
    /// the smallest point. `None` on an empty ring.
    pub fn immediate_next_point(&self, key: &str) -> Option<&str> {
        let hash = self.hash(key);

        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, vnode_key)| vnode_key.as_str())
    }

    /// Up to `n` distinct vnode keys walking clockwise from `key`'s hash.
    ///
    /// The first element always equals [`immediate_next_point`](Self::immediate_next_point).
    /// Fewer than `n` keys are returned when the ring is too small.
    pub fn immediate_next_n_points(&self, key: &str, n: usize) -> Vec<String> {
        if n == 0 || self.points.is_empty() {
            return Vec::new();
        }

        let hash = self.hash(key);
        let mut found: Vec<String> = Vec::with_capacity(n.min(self.points.len()));

        let after = self.points.range(hash..);
        let before = self.points.range(..hash);

        for (_, vnode_key) in after.chain(before) {
            if !found.iter().any(|k| k == vnode_key) {
                found.push(vnode_key.clone());
                if found.len() == n {
                    break;
                }
            }
        }

        if found.len() < n {
            warn!(
                key,
                requested = n,
                available = found.len(),
                "Only {} replicas could be created due to vnode limitations",
                found.len()
            );
        }

        found
    }

    /// Point `vnode_key` occupies, if it is on the ring
    pub fn point_of(&self, vnode_key: &str) -> Option<u32> {
        let point = self.hash(vnode_key);
        match self.points.get(&point) {
            Some(owner) if owner == vnode_key => Some(point),
            _ => None,
        }
    }

    /// Vnode key at exactly `point`
    pub fn vnode_at(&self, point: u32) -> Option<&str> {
        self.points.get(&point).map(String::as_str)
    }

    /// All points in ascending order
    pub fn points(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.points.iter().map(|(point, key)| (*point, key.as_str()))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for ConsistentHashRing {
    fn default() -> Self {
        Self::new(Arc::new(Sha256Hash))
    }
}

impl fmt::Debug for ConsistentHashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.points.iter()).finish()
    }
}
