use crate::config::ChainConfig;
use crate::error::BlockError;
use crate::merkle::merkle_root;
use crate::tx::{Coinbase, PepeTransaction, SchTransaction, Transaction, NULL_ADDRESS};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Represents the header of a block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Position in the chain. 0 is the genesis block.
    pub id: u32,
    /// Creation time. Informational, but part of the hash.
    pub timestamp: DateTime<Utc>,
    /// Difficulty the block was mined for.
    pub bits: u32,
    /// Value varied by the miner until `hash` meets the target.
    pub nonce: u32,
    /// Root hash of the block's transactions, hex.
    pub merkle_root: String,
    /// Hash of the previous block's header, hex.
    pub prev_hash: String,
    /// Cached `sum256()` of all other fields, hex.
    pub hash: String,
}

impl Header {
    /// Hashes every field but `hash`, in the fixed order
    /// `id, timestamp, bits, nonce, merkle_root, prev_hash`.
    pub fn sum256(&self) -> Result<String, BlockError> {
        let header_string = format!(
            "{}{}{}{}{}{}",
            self.id,
            self.canonical_timestamp()?,
            self.bits,
            self.nonce,
            self.merkle_root,
            self.prev_hash
        );
        Ok(hex::encode(Sha256::digest(header_string.as_bytes())))
    }

    /// Recomputes and stores `hash`.
    pub fn rehash(&mut self) -> Result<(), BlockError> {
        self.hash = self.sum256()?;
        Ok(())
    }

    /// RFC3339 in UTC with nanosecond precision, e.g.
    /// `2017-11-20T10:04:05.000000000Z`.
    fn canonical_timestamp(&self) -> Result<String, BlockError> {
        let year = self.timestamp.year();
        if !(0..=9999).contains(&year) {
            return Err(BlockError::MalformedHeader {
                id: self.id,
                reason: format!("timestamp year {year} has no RFC3339 form"),
            });
        }
        Ok(self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(
            f,
            "Date: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )?;
        writeln!(f, "Bits: {}", self.bits)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "Merkle Root: {}", self.merkle_root)?;
        writeln!(f, "Previous Hash: {}", self.prev_hash)?;
        writeln!(f, "Hash: {}", self.hash)
    }
}

/// Transactions carried by a block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Data<S = SchTransaction, P = PepeTransaction> {
    /// The minted-coin transaction. Exactly one per finished block.
    pub reward: Option<S>,
    pub sch_transactions: Vec<S>,
    pub pepe_transactions: Vec<P>,
}

impl<S, P> Default for Data<S, P> {
    fn default() -> Self {
        Self {
            reward: None,
            sch_transactions: Vec::new(),
            pepe_transactions: Vec::new(),
        }
    }
}

impl<S: Transaction, P: Transaction> Data<S, P> {
    /// Computes the Merkle root of this data. `id` only labels the error.
    pub fn merkle_root(&self, id: u32) -> Result<String, BlockError> {
        let reward = self
            .reward
            .as_ref()
            .ok_or(BlockError::MissingReward { id })?;
        Ok(merkle_root(
            reward,
            &self.sch_transactions,
            &self.pepe_transactions,
        ))
    }
}

/// Represents a block in the chain.
///
/// A block is mutable only through append-only operations, each of which
/// refreshes the Merkle root and the header hash. Once written to a
/// [`ChainStore`](crate::store::ChainStore) it is read-only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Block<S = SchTransaction, P = PepeTransaction> {
    pub header: Header,
    pub data: Data<S, P>,
    #[serde(skip)]
    persisted: bool,
}

impl<S, P> Block<S, P> {
    /// Creates an empty block stamped with the current time.
    ///
    /// The block has no reward, no Merkle root and no hash yet.
    pub fn new(id: u32, bits: u32, prev_hash: impl Into<String>) -> Self {
        Self::with_timestamp(id, bits, prev_hash, Utc::now())
    }

    pub fn with_timestamp(
        id: u32,
        bits: u32,
        prev_hash: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            header: Header {
                id,
                timestamp,
                bits,
                nonce: 0,
                merkle_root: String::new(),
                prev_hash: prev_hash.into(),
                hash: String::new(),
            },
            data: Data::default(),
            persisted: false,
        }
    }

    /// Creates the empty successor of this block.
    pub fn next(&self, bits: u32) -> Result<Self, BlockError> {
        let id = self
            .header
            .id
            .checked_add(1)
            .ok_or(BlockError::IdOverflow { id: self.header.id })?;
        Ok(Self::new(id, bits, self.header.hash.clone()))
    }

    pub fn id(&self) -> u32 {
        self.header.id
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

impl<S: Transaction, P: Transaction> Block<S, P> {
    /// Sets the block's reward. A block takes exactly one.
    pub fn set_reward(&mut self, reward: S) -> Result<(), BlockError> {
        self.ensure_mutable()?;
        if self.data.reward.is_some() {
            return Err(BlockError::RewardAlreadySet { id: self.header.id });
        }
        self.data.reward = Some(reward);
        self.refresh()
    }

    pub fn add_sch_transaction(&mut self, tx: S) -> Result<(), BlockError> {
        self.ensure_mutable()?;
        self.data.sch_transactions.push(tx);
        self.refresh()
    }

    pub fn add_pepe_transaction(&mut self, tx: P) -> Result<(), BlockError> {
        self.ensure_mutable()?;
        self.data.pepe_transactions.push(tx);
        self.refresh()
    }

    /// Sets the proof-of-work nonce and rehashes the header.
    pub fn set_nonce(&mut self, nonce: u32) -> Result<(), BlockError> {
        self.ensure_mutable()?;
        self.header.nonce = nonce;
        self.header.rehash()
    }

    /// Recomputes the Merkle root (once a reward is set) and the header hash.
    pub fn refresh(&mut self) -> Result<(), BlockError> {
        self.ensure_mutable()?;
        if self.data.reward.is_some() {
            self.header.merkle_root = self.data.merkle_root(self.header.id)?;
        }
        self.header.rehash()
    }

    fn ensure_mutable(&self) -> Result<(), BlockError> {
        if self.persisted {
            return Err(BlockError::Persisted { id: self.header.id });
        }
        Ok(())
    }
}

impl<S: Coinbase, P: Transaction> Block<S, P> {
    /// Builds the first block of the chain, rewarding the null address.
    ///
    /// The nonce still has to be mined before the block is valid.
    pub fn genesis(config: &ChainConfig) -> Result<Self, BlockError> {
        let mut block = Self::new(0, config.genesis_bits, config.genesis_prev_hash.clone());
        block.set_reward(S::coinbase(NULL_ADDRESS))?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixed_time, TestTx};
    use chrono::TimeZone;

    fn sample_block() -> Block<TestTx, TestTx> {
        let mut block = Block::with_timestamp(3, 7, "ab".repeat(32), fixed_time());
        block.set_reward(TestTx::with_seed(1)).unwrap();
        block.add_sch_transaction(TestTx::with_seed(2)).unwrap();
        block.add_pepe_transaction(TestTx::with_seed(3)).unwrap();
        block
    }

    #[test]
    fn sum256_is_deterministic() {
        let block = sample_block();
        assert_eq!(
            block.header.sum256().unwrap(),
            block.header.sum256().unwrap()
        );
        assert_eq!(block.header.hash, block.header.sum256().unwrap());
    }

    #[test]
    fn sum256_matches_canonical_concatenation() {
        let header = Header {
            id: 1,
            timestamp: Utc.with_ymd_and_hms(2017, 11, 20, 10, 4, 5).unwrap(),
            bits: 2,
            nonce: 3,
            merkle_root: "aa".into(),
            prev_hash: "bb".into(),
            hash: String::new(),
        };
        let expected = hex::encode(Sha256::digest(
            b"12017-11-20T10:04:05.000000000Z23aabb",
        ));
        assert_eq!(header.sum256().unwrap(), expected);
    }

    #[test]
    fn every_header_field_changes_the_hash() {
        let base = sample_block().header;
        let original = base.sum256().unwrap();

        let mutations: [fn(&mut Header); 6] = [
            |h| h.id += 1,
            |h| h.timestamp = h.timestamp + chrono::Duration::nanoseconds(1),
            |h| h.bits += 1,
            |h| h.nonce += 1,
            |h| h.merkle_root.push('0'),
            |h| h.prev_hash.push('0'),
        ];
        for mutate in mutations {
            let mut header = base.clone();
            mutate(&mut header);
            assert_ne!(header.sum256().unwrap(), original);
        }
    }

    #[test]
    fn stored_hash_is_not_an_input() {
        let mut header = sample_block().header;
        let before = header.sum256().unwrap();
        header.hash = "ff".repeat(32);
        assert_eq!(header.sum256().unwrap(), before);
    }

    #[test]
    fn out_of_range_timestamp_is_malformed() {
        let mut header = sample_block().header;
        header.timestamp = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            header.sum256(),
            Err(BlockError::MalformedHeader { id: 3, .. })
        ));
    }

    #[test]
    fn mutations_refresh_root_and_hash() {
        let mut block = sample_block();
        let root = block.header.merkle_root.clone();
        let hash = block.header.hash.clone();

        block.add_sch_transaction(TestTx::with_seed(9)).unwrap();
        assert_ne!(block.header.merkle_root, root);
        assert_ne!(block.header.hash, hash);
        assert_eq!(
            block.header.merkle_root,
            block.data.merkle_root(block.id()).unwrap()
        );
        assert_eq!(block.header.hash, block.header.sum256().unwrap());
    }

    #[test]
    fn set_nonce_rehashes() {
        let mut block = sample_block();
        let hash = block.header.hash.clone();
        block.set_nonce(42).unwrap();
        assert_eq!(block.header.nonce, 42);
        assert_ne!(block.header.hash, hash);
    }

    #[test]
    fn root_requires_reward() {
        let mut block: Block<TestTx, TestTx> = Block::new(1, 0, "00".repeat(32));
        assert_eq!(
            block.data.merkle_root(1),
            Err(BlockError::MissingReward { id: 1 })
        );
        // Adding transactions before the reward leaves the root unset.
        block.add_sch_transaction(TestTx::with_seed(2)).unwrap();
        assert!(block.header.merkle_root.is_empty());
    }

    #[test]
    fn persisted_block_rejects_mutation() {
        let mut block = sample_block();
        block.mark_persisted();
        let err = block.add_pepe_transaction(TestTx::with_seed(5)).unwrap_err();
        assert_eq!(err, BlockError::Persisted { id: 3 });
        assert!(block.set_nonce(1).is_err());
        assert!(block.set_reward(TestTx::with_seed(6)).is_err());
    }

    #[test]
    fn genesis_uses_config() {
        let config = ChainConfig {
            genesis_bits: 1,
            ..Default::default()
        };
        let genesis: Block = Block::genesis(&config).unwrap();
        assert_eq!(genesis.id(), 0);
        assert_eq!(genesis.header.bits, 1);
        assert_eq!(genesis.header.prev_hash, config.genesis_prev_hash);
        assert_eq!(
            genesis.data.reward,
            Some(SchTransaction::coinbase(NULL_ADDRESS))
        );
        assert!(!genesis.header.merkle_root.is_empty());
    }

    #[test]
    fn next_links_to_parent() {
        let block = sample_block();
        let next = block.next(9).unwrap();
        assert_eq!(next.id(), 4);
        assert_eq!(next.header.bits, 9);
        assert_eq!(next.header.prev_hash, block.header.hash);
        assert!(next.data.reward.is_none());
    }

    #[test]
    fn last_id_has_no_successor() {
        let mut last: Block<TestTx, TestTx> = Block::new(u32::MAX, 0, "00".repeat(32));
        last.set_reward(TestTx::with_seed(1)).unwrap();
        assert_eq!(
            last.next(0).unwrap_err(),
            BlockError::IdOverflow { id: u32::MAX }
        );
    }

    #[test]
    fn reward_is_set_once() {
        let mut block = sample_block();
        let root = block.header.merkle_root.clone();
        assert_eq!(
            block.set_reward(TestTx::with_seed(8)),
            Err(BlockError::RewardAlreadySet { id: 3 })
        );
        assert_eq!(block.data.reward, Some(TestTx::with_seed(1)));
        assert_eq!(block.header.merkle_root, root);
    }

    #[test]
    fn display_lists_all_fields() {
        let block = sample_block();
        let text = block.header.to_string();
        for label in [
            "ID: 3",
            "Bits: 7",
            "Nonce: 0",
            "Merkle Root: ",
            "Previous Hash: ",
            "Hash: ",
        ] {
            assert!(text.contains(label), "missing {label} in {text}");
        }
        assert_eq!(text.lines().count(), 7);
    }
}
