//! Background purge of expired entries
//!
//! Reads already evict expired entries lazily; the sweeper only reclaims
//! memory held by keys nobody reads again.

use crate::monitoring::CacheStats;
use crate::vnode::VNodeManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct TtlSweeper {
    vnode_manager: Arc<VNodeManager>,
    stats: Arc<CacheStats>,
    interval: Duration,
}

impl TtlSweeper {
    pub fn new(
        vnode_manager: Arc<VNodeManager>,
        stats: Arc<CacheStats>,
        interval: Duration,
    ) -> Self {
        Self {
            vnode_manager,
            stats,
            interval,
        }
    }

    /// Purge every vnode once, returning the number of entries removed
    pub fn sweep_once(&self) -> usize {
        // Handles are collected under the topology lock; purging happens outside it
        let vnodes = self.vnode_manager.vnodes();

        let purged: usize = vnodes.iter().map(|vnode| vnode.purge_expired()).sum();
        if purged > 0 {
            self.stats.record_swept(purged);
            debug!(purged, vnodes = vnodes.len(), "expired entries swept");
        }
        purged
    }

    /// Sweep every `interval` until `shutdown` fires or its sender is dropped.
    ///
    /// A zero interval disables sweeping; the task exits immediately.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.interval.is_zero() {
                warn!("TTL sweeper interval is zero, sweeper disabled");
                return;
            }

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_ms = self.interval.as_millis() as u64, "TTL sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    _ = shutdown.recv() => {
                        info!("TTL sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}
