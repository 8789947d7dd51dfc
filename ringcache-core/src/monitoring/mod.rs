//! Monitoring for RingCache
//!
//! - Cache operation counters
//! - Prometheus text export
//! - Structured logging with tracing

pub mod logging;
pub mod metrics;
pub mod prometheus_exporter;

pub use logging::*;
pub use metrics::*;
pub use prometheus_exporter::*;
