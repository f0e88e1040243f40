//! Validation and persistence core of the cryptopepe chain.
//!
//! - [`blockchain`]: headers, block data and blocks, with the canonical
//!   header hash
//! - [`merkle`]: the flat Merkle root over a block's transactions
//! - [`validity`]: the proof-of-work and consistency checks a block must pass
//! - [`store`]: append-only, file-per-block persistence
//! - [`config`]: chain constants, loaded from file and environment
//!
//! Transaction kinds plug in through the [`tx::Transaction`] trait.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod merkle;
pub mod store;
pub mod tx;
pub mod validity;

#[cfg(test)]
pub(crate) mod test_utils;

pub use blockchain::{Block, Data, Header};
pub use config::ChainConfig;
pub use error::{BlockError, ConfigError, StorageError};
pub use store::ChainStore;
pub use tx::{Coinbase, PepeTransaction, SchTransaction, Transaction, TxHash};
pub use validity::{check, is_valid, ValidationFailure};
