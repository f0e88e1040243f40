//! Block admission rules.
//!
//! [`check`] runs four checks in a fixed order and stops at the first
//! failure: proof of work, Merkle root, header hash, then the validity of
//! every ordinary transaction. The reward transaction is not re-validated.

use crate::blockchain::Block;
use crate::config::ChainConfig;
use crate::error::BlockError;
use crate::tx::Transaction;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Which transaction collection a failing transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Sch,
    Pepe,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Sch => write!(f, "sch"),
            TxKind::Pepe => write!(f, "pepe"),
        }
    }
}

/// Why a block was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("hash does not start with {required} zeros")]
    ProofOfWork { required: usize },

    #[error("merkle root does not match block data")]
    MerkleMismatch,

    #[error("block has no reward transaction")]
    MissingReward,

    #[error("stored hash does not match header contents")]
    HeaderHashMismatch,

    #[error("header cannot be hashed: {0}")]
    MalformedHeader(String),

    #[error("{kind} transaction #{index} is invalid")]
    TransactionInvalid { kind: TxKind, index: usize },

    #[error("block {id} does not extend its predecessor")]
    BrokenLink { id: u32 },

    #[error("first block is not a genesis block")]
    GenesisMismatch,
}

/// Runs every admission check against `block`.
pub fn check<S, P>(block: &Block<S, P>, config: &ChainConfig) -> Result<(), ValidationFailure>
where
    S: Transaction,
    P: Transaction,
{
    debug!(id = block.id(), "checking block validity");

    let result = check_proof_of_work(block, config)
        .and_then(|_| check_merkle_root(block))
        .and_then(|_| check_header_hash(block))
        .and_then(|_| check_transactions(block));

    if let Err(reason) = &result {
        warn!(id = block.id(), %reason, "block rejected");
    }
    result
}

/// Boolean view of [`check`].
pub fn is_valid<S, P>(block: &Block<S, P>, config: &ChainConfig) -> bool
where
    S: Transaction,
    P: Transaction,
{
    check(block, config).is_ok()
}

pub fn check_proof_of_work<S, P>(
    block: &Block<S, P>,
    config: &ChainConfig,
) -> Result<(), ValidationFailure> {
    let required = config.target_for(block.id());
    if meets_target(&block.header.hash, required) {
        Ok(())
    } else {
        Err(ValidationFailure::ProofOfWork { required })
    }
}

/// Whether a hex hash starts with `prefix_len` zero characters.
pub fn meets_target(hash: &str, prefix_len: usize) -> bool {
    hash.len() >= prefix_len && hash.bytes().take(prefix_len).all(|b| b == b'0')
}

pub fn check_merkle_root<S, P>(block: &Block<S, P>) -> Result<(), ValidationFailure>
where
    S: Transaction,
    P: Transaction,
{
    match block.data.merkle_root(block.id()) {
        Ok(root) if root == block.header.merkle_root => Ok(()),
        Ok(_) => Err(ValidationFailure::MerkleMismatch),
        Err(BlockError::MissingReward { .. }) => Err(ValidationFailure::MissingReward),
        Err(e) => Err(ValidationFailure::MalformedHeader(e.to_string())),
    }
}

pub fn check_header_hash<S, P>(block: &Block<S, P>) -> Result<(), ValidationFailure> {
    match block.header.sum256() {
        Ok(hash) if hash == block.header.hash => Ok(()),
        Ok(_) => Err(ValidationFailure::HeaderHashMismatch),
        Err(e) => Err(ValidationFailure::MalformedHeader(e.to_string())),
    }
}

pub fn check_transactions<S, P>(block: &Block<S, P>) -> Result<(), ValidationFailure>
where
    S: Transaction,
    P: Transaction,
{
    if let Some(index) = block.data.sch_transactions.iter().position(|t| !t.validate()) {
        return Err(ValidationFailure::TransactionInvalid {
            kind: TxKind::Sch,
            index,
        });
    }
    if let Some(index) = block.data.pepe_transactions.iter().position(|t| !t.validate()) {
        return Err(ValidationFailure::TransactionInvalid {
            kind: TxKind::Pepe,
            index,
        });
    }
    Ok(())
}

/// Checks that `next` directly extends `prev`.
pub fn check_link<S, P>(prev: &Block<S, P>, next: &Block<S, P>) -> Result<(), ValidationFailure> {
    if prev.id().checked_add(1) != Some(next.id()) || next.header.prev_hash != prev.header.hash {
        return Err(ValidationFailure::BrokenLink { id: next.id() });
    }
    Ok(())
}

/// Validates an ordered chain: genesis first, every block valid and linked
/// to its predecessor.
pub fn check_chain<S, P>(blocks: &[Block<S, P>], config: &ChainConfig) -> Result<(), ValidationFailure>
where
    S: Transaction,
    P: Transaction,
{
    let Some(genesis) = blocks.first() else {
        return Ok(());
    };
    if genesis.id() != 0 || genesis.header.prev_hash != config.genesis_prev_hash {
        return Err(ValidationFailure::GenesisMismatch);
    }
    check(genesis, config)?;

    for pair in blocks.windows(2) {
        check_link(&pair[0], &pair[1])?;
        check(&pair[1], config)?;
    }
    Ok(())
}
