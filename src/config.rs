//! Chain configuration.
//!
//! Values are consumed as constants by the core. They are layered from
//! built-in defaults, an optional configuration file and `PEPECHAIN_*`
//! environment variables.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hash the genesis block points back to. Opaque, never re-derived.
pub const GENESIS_PREV_HASH: &str =
    "aeebad4a796fcc2e15dc4c6061b45ed9b373f26adfc798ca7d2d8cc58182718e";

pub const DEFAULT_TARGET_PREFIX_LENGTH: usize = 5;

const ENV_PREFIX: &str = "PEPECHAIN";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChainConfig {
    /// Number of leading `'0'` hex characters a block hash must carry.
    pub target_prefix_length: usize,
    /// Same as `target_prefix_length`, for the genesis block only.
    pub genesis_target_prefix_length: usize,
    pub genesis_prev_hash: String,
    pub genesis_bits: u32,
    /// Directory holding one record per block.
    pub storage_root_dir: PathBuf,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            target_prefix_length: DEFAULT_TARGET_PREFIX_LENGTH,
            genesis_target_prefix_length: DEFAULT_TARGET_PREFIX_LENGTH,
            genesis_prev_hash: GENESIS_PREV_HASH.to_string(),
            genesis_bits: 0,
            storage_root_dir: PathBuf::from("chain"),
        }
    }
}

impl ChainConfig {
    /// Loads the configuration from `path` (any format the `config` crate
    /// recognises by extension) and the environment, on top of the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let cfg: ChainConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.genesis_prev_hash.len() != 64
            || !self.genesis_prev_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ConfigError::Invalid {
                field: "genesis_prev_hash",
                reason: format!("expected 64 hex characters, got {:?}", self.genesis_prev_hash),
            });
        }
        for (field, len) in [
            ("target_prefix_length", self.target_prefix_length),
            ("genesis_target_prefix_length", self.genesis_target_prefix_length),
        ] {
            if len > 64 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{len} exceeds the 64 characters of a hash"),
                });
            }
        }
        Ok(())
    }

    /// Proof-of-work prefix length required for the block with this id.
    pub fn target_for(&self, id: u32) -> usize {
        if id == 0 {
            self.genesis_target_prefix_length
        } else {
            self.target_prefix_length
        }
    }
}
