//! Key hashing onto the 32-bit ring

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Maps a string to a position on the ring.
///
/// Implementations must be deterministic and stable across process restarts:
/// ring placement of vnodes and cache keys depends on it.
pub trait HashFunction: Send + Sync {
    fn hash(&self, key: &str) -> u32;
}

/// SHA-256 digest truncated to its first 4 bytes, read big-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hash;

impl HashFunction for Sha256Hash {
    fn hash(&self, key: &str) -> u32 {
        let digest = Sha256::digest(key.as_bytes());
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

/// Hash function with explicitly pinned points.
///
/// Keys present in the table hash to their pinned point; every other key
/// falls back to [`Sha256Hash`]. Used to lay out rings with known geometry.
#[derive(Debug, Clone, Default)]
pub struct PinnedHash {
    pinned: HashMap<String, u32>,
}

impl PinnedHash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `key` to `point`
    pub fn pin(mut self, key: impl Into<String>, point: u32) -> Self {
        self.pinned.insert(key.into(), point);
        self
    }
}

impl HashFunction for PinnedHash {
    fn hash(&self, key: &str) -> u32 {
        match self.pinned.get(key) {
            Some(point) => *point,
            None => Sha256Hash.hash(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hash_is_deterministic() {
        let h = Sha256Hash;
        assert_eq!(h.hash("vnode-1"), h.hash("vnode-1"));
        assert_ne!(h.hash("vnode-1"), h.hash("vnode-2"));
    }

    #[test]
    fn test_sha256_hash_uses_leading_bytes_big_endian() {
        // sha256("") = e3b0c442...
        assert_eq!(Sha256Hash.hash(""), 0xe3b0_c442);
        // sha256("abc") = ba7816bf...
        assert_eq!(Sha256Hash.hash("abc"), 0xba78_16bf);
    }

    #[test]
    fn test_pinned_hash_falls_back() {
        let h = PinnedHash::new().pin("v1", 100).pin("v2", 200);
        assert_eq!(h.hash("v1"), 100);
        assert_eq!(h.hash("v2"), 200);
        assert_eq!(h.hash("abc"), Sha256Hash.hash("abc"));
    }
}
