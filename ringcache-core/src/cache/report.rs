//! Per-target outcomes of replicated writes and deletes

use serde::{Deserialize, Serialize};

/// What a single vnode did with a fanned-out operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Value written (or overwritten)
    Stored,
    /// Existing entry removed
    Removed,
    /// Delete found nothing to remove
    NotPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub vnode_key: String,
    pub status: TargetStatus,
}

/// Result of fanning one operation out to a replication set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutReport {
    /// Replication factor the operation asked for
    pub requested: usize,
    /// One outcome per reached vnode, in ring order
    pub targets: Vec<TargetOutcome>,
}

impl FanOutReport {
    pub fn new(requested: usize) -> Self {
        Self::with_capacity(requested, 0)
    }

    /// Empty report with room for `resolved` outcomes
    pub fn with_capacity(requested: usize, resolved: usize) -> Self {
        Self {
            requested,
            targets: Vec::with_capacity(resolved),
        }
    }

    pub(crate) fn push(&mut self, vnode_key: impl Into<String>, status: TargetStatus) {
        self.targets.push(TargetOutcome {
            vnode_key: vnode_key.into(),
            status,
        });
    }

    /// Number of vnodes reached
    pub fn reached(&self) -> usize {
        self.targets.len()
    }

    /// True when fewer vnodes than requested were reached
    pub fn is_degraded(&self) -> bool {
        self.targets.len() < self.requested
    }

    pub fn vnode_keys(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.vnode_key.as_str()).collect()
    }

    /// Number of targets that reported `status`
    pub fn count(&self, status: TargetStatus) -> usize {
        self.targets.iter().filter(|t| t.status == status).count()
    }
}
