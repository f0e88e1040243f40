//! Flat Merkle aggregation over a block's transaction set.
//!
//! The root is SHA-256 over the raw 32-byte hashes of the reward, then every
//! sch transaction, then every pepe transaction, each in collection order.
//! This is a single flat hash rather than a binary tree, so it does not
//! support inclusion proofs.

use crate::tx::Transaction;
use sha2::{Digest, Sha256};

pub fn merkle_root<S, P>(reward: &S, sch: &[S], pepe: &[P]) -> String
where
    S: Transaction,
    P: Transaction,
{
    let mut hashes = Vec::with_capacity(32 * (1 + sch.len() + pepe.len()));
    hashes.extend_from_slice(&reward.hash());
    for t in sch {
        hashes.extend_from_slice(&t.hash());
    }
    for t in pepe {
        hashes.extend_from_slice(&t.hash());
    }
    hex::encode(Sha256::digest(&hashes))
}
