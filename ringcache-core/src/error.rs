//! Error taxonomy for topology administration
//!
//! Only configuration-time calls raise. Runtime reads and writes degrade to
//! `None` or to a degraded [`FanOutReport`](crate::cache::FanOutReport)
//! instead of returning an error.

use thiserror::Error;

/// Broad class of a topology error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown shard, empty key, mismatched override
    Configuration,
    /// Key or point already taken, shard still in use
    Conflict,
}

/// Topology errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("No shard exists by key: {0}")]
    ShardNotFound(String),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("A vnode already exists by key: {0}")]
    DuplicateVNode(String),

    #[error("Vnode {vnode_key} hashes to point {point}, already owned by {owner}")]
    HashCollision {
        vnode_key: String,
        owner: String,
        point: u32,
    },

    #[error("Vnode {vnode_key} is bound to shard {bound}, not {requested}")]
    ShardMismatch {
        vnode_key: String,
        bound: String,
        requested: String,
    },

    #[error("A shard already exists by key: {0}")]
    DuplicateShard(String),

    #[error("Shard {shard_key} still holds {members} vnode(s)")]
    ShardNotEmpty { shard_key: String, members: usize },
}

impl CacheError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::ShardNotFound(_)
            | CacheError::InvalidKey(_)
            | CacheError::ShardMismatch { .. } => ErrorKind::Configuration,
            CacheError::DuplicateVNode(_)
            | CacheError::HashCollision { .. }
            | CacheError::DuplicateShard(_)
            | CacheError::ShardNotEmpty { .. } => ErrorKind::Conflict,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CacheError::ShardNotFound("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(CacheError::InvalidKey(String::new()).kind(), ErrorKind::Configuration);
        assert_eq!(CacheError::DuplicateVNode("v1".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            CacheError::HashCollision {
                vnode_key: "a".into(),
                owner: "b".into(),
                point: 7,
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_error_messages() {
        let err = CacheError::ShardNotFound("shardZ".into());
        assert_eq!(err.to_string(), "No shard exists by key: shardZ");

        let err = CacheError::ShardNotEmpty {
            shard_key: "shardA".into(),
            members: 2,
        };
        assert_eq!(err.to_string(), "Shard shardA still holds 2 vnode(s)");
    }
}
