//! Prometheus text exposition of cache and topology metrics
//!
//! There is no HTTP endpoint here; callers decide where the rendered text
//! goes (the CLI prints it from the `stats` command).

use crate::monitoring::metrics::CacheStats;
use crate::vnode::VNodeManager;
use anyhow::Result;
use prometheus::{
    register_gauge_with_registry, register_int_counter_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry, Encoder, Gauge,
    IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Renders [`CacheStats`] and ring size as Prometheus metrics
pub struct PrometheusExporter {
    registry: Registry,
    metrics: PrometheusMetrics,
    stats: Arc<CacheStats>,
    vnode_manager: Arc<VNodeManager>,
}

struct PrometheusMetrics {
    hits: IntCounter,
    misses: IntCounter,
    writes: IntCounter,
    deletes: IntCounter,
    degraded_fanouts: IntCounter,
    swept_entries: IntCounter,
    hit_rate: Gauge,
    vnodes: IntGauge,
    shards: IntGauge,
    vnode_entries: IntGaugeVec,
    vnode_operations: IntGaugeVec,
}

impl PrometheusExporter {
    pub fn new(stats: Arc<CacheStats>, vnode_manager: Arc<VNodeManager>) -> Result<Self> {
        let registry = Registry::new();
        let metrics = PrometheusMetrics::new(&registry)?;

        Ok(Self {
            registry,
            metrics,
            stats,
            vnode_manager,
        })
    }

    /// Copy the current counters into the registry
    pub fn update_metrics(&self) {
        let snapshot = self.stats.snapshot();

        set_counter(&self.metrics.hits, snapshot.hits);
        set_counter(&self.metrics.misses, snapshot.misses);
        set_counter(&self.metrics.writes, snapshot.writes);
        set_counter(&self.metrics.deletes, snapshot.deletes);
        set_counter(&self.metrics.degraded_fanouts, snapshot.degraded_fanouts);
        set_counter(&self.metrics.swept_entries, snapshot.swept_entries);
        self.metrics.hit_rate.set(snapshot.hit_rate);

        self.metrics.vnodes.set(self.vnode_manager.vnode_count() as i64);
        self.metrics.shards.set(self.vnode_manager.shards().len() as i64);

        // Deleted vnodes must not keep reporting
        self.metrics.vnode_entries.reset();
        self.metrics.vnode_operations.reset();
        for vnode in self.vnode_manager.vnodes() {
            let labels = [vnode.vnode_key(), vnode.shard_key()];
            let stats = vnode.stats();
            self.metrics
                .vnode_entries
                .with_label_values(&labels)
                .set(stats.entry_count as i64);
            self.metrics
                .vnode_operations
                .with_label_values(&labels)
                .set(stats.operation_count as i64);
        }
    }

    /// Update and encode every metric in text exposition format
    pub fn render(&self) -> Result<String> {
        self.update_metrics();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn set_counter(counter: &IntCounter, value: u64) {
    counter.reset();
    counter.inc_by(value);
}

impl PrometheusMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let hits = register_int_counter_with_registry!(
            Opts::new("ringcache_hits_total", "Reads that found a live value"),
            registry
        )?;

        let misses = register_int_counter_with_registry!(
            Opts::new("ringcache_misses_total", "Reads that found no live value"),
            registry
        )?;

        let writes = register_int_counter_with_registry!(
            Opts::new("ringcache_writes_total", "Replicated writes issued"),
            registry
        )?;

        let deletes = register_int_counter_with_registry!(
            Opts::new("ringcache_deletes_total", "Replicated deletes issued"),
            registry
        )?;

        let degraded_fanouts = register_int_counter_with_registry!(
            Opts::new(
                "ringcache_degraded_fanouts_total",
                "Fan-outs that reached fewer vnodes than the replication factor"
            ),
            registry
        )?;

        let swept_entries = register_int_counter_with_registry!(
            Opts::new("ringcache_swept_entries_total", "Expired entries removed by the sweeper"),
            registry
        )?;

        let hit_rate = register_gauge_with_registry!(
            Opts::new("ringcache_hit_rate", "Fraction of reads that hit"),
            registry
        )?;

        let vnodes = register_int_gauge_with_registry!(
            Opts::new("ringcache_vnodes", "Vnodes currently on the ring"),
            registry
        )?;

        let shards = register_int_gauge_with_registry!(
            Opts::new("ringcache_shards", "Configured shards"),
            registry
        )?;

        let vnode_entries = register_int_gauge_vec_with_registry!(
            Opts::new("ringcache_vnode_entries", "Entries stored per vnode"),
            &["vnode", "shard"],
            registry
        )?;

        let vnode_operations = register_int_gauge_vec_with_registry!(
            Opts::new("ringcache_vnode_operations", "Storage operations served per vnode"),
            &["vnode", "shard"],
            registry
        )?;

        Ok(Self {
            hits,
            misses,
            writes,
            deletes,
            degraded_fanouts,
            swept_entries,
            hit_rate,
            vnodes,
            shards,
            vnode_entries,
            vnode_operations,
        })
    }
}
