//! RingCache Core - replicated in-memory cache on a consistent hash ring
//!
//! This crate provides the building blocks for RingCache:
//! - Deterministic key hashing onto a 32-bit ring
//! - Consistent hash ring with clockwise replica resolution
//! - Per-vnode storage with lazy TTL expiry
//! - Vnode/shard topology management
//! - Replication-aware cache manager with fan-out reports

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod monitoring;
pub mod ring;
pub mod snapshot;
pub mod vnode;

pub use cache::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use hash::*;
pub use monitoring::*;
pub use ring::*;
pub use snapshot::*;
pub use vnode::*;
