//! Replicated cache layer
//!
//! This module fans cache operations out over the consistent hash ring

pub mod manager;
pub mod report;
pub mod sweeper;

pub use manager::*;
pub use report::*;
pub use sweeper::*;
