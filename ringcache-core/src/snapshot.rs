//! Diagnostic view of the ring
//!
//! A [`RingSnapshot`] is plain data: one record per ring point in ascending
//! order. Rendering (the `Display` impl, JSON via serde) is kept separate
//! from how the snapshot is collected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One cached key and its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub cache_key: String,
    pub value: Value,
}

/// A ring point with the vnode that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingPointView {
    pub point: u32,
    pub vnode_key: String,
    pub shard_key: String,
    pub entries: Vec<SnapshotEntry>,
}

/// Every ring point, ascending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RingSnapshot {
    pub points: Vec<RingPointView>,
}

impl RingSnapshot {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total number of stored entries across all points
    pub fn entry_count(&self) -> usize {
        self.points.iter().map(|p| p.entries.len()).sum()
    }

    /// Vnode keys holding `cache_key`, in ring order
    pub fn holders_of(&self, cache_key: &str) -> Vec<&str> {
        self.points
            .iter()
            .filter(|p| p.entries.iter().any(|e| e.cache_key == cache_key))
            .map(|p| p.vnode_key.as_str())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RingPointView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} => [ shard: {}, key: {}, data: ",
            self.point, self.shard_key, self.vnode_key
        )?;
        if self.entries.is_empty() {
            write!(f, "-")?;
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", entry.cache_key, entry.value)?;
        }
        write!(f, " ]")
    }
}

impl fmt::Display for RingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.points.is_empty() {
            return writeln!(f, "(empty ring)");
        }
        for point in &self.points {
            writeln!(f, "{}", point)?;
        }
        Ok(())
    }
}
