use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or hashing a block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// A header field has no canonical textual form, so no hash can be derived.
    #[error("block {id}: malformed header: {reason}")]
    MalformedHeader { id: u32, reason: String },

    /// The Merkle root was requested before a reward transaction was set.
    #[error("block {id}: no reward transaction set")]
    MissingReward { id: u32 },

    /// The block already carries its reward transaction.
    #[error("block {id} already has a reward transaction")]
    RewardAlreadySet { id: u32 },

    /// The block is the last one a `u32` id can address.
    #[error("block {id} has no successor id")]
    IdOverflow { id: u32 },

    /// The block has already been written to the chain store.
    #[error("block {id} is persisted and can no longer be modified")]
    Persisted { id: u32 },
}

/// Errors raised by the on-disk chain store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot (de)serialize block record {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The block's Merkle root cannot be computed, e.g. it has no reward.
    #[error("block {id} is not finished: {source}")]
    Unfinished {
        id: u32,
        #[source]
        source: BlockError,
    },

    /// The header's Merkle root does not match the block data.
    #[error("block {id} carries a stale merkle root")]
    StaleMerkleRoot { id: u32 },

    #[error("block {id} not found")]
    NotFound { id: u32 },

    #[error("block {id} already stored")]
    AlreadyExists { id: u32 },

    #[error("block id {id} does not fit the 9-digit record name")]
    IdOutOfRange { id: u32 },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while loading chain configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
