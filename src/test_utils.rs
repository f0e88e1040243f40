use crate::blockchain::Block;
use crate::config::ChainConfig;
use crate::tx::{Coinbase, Transaction, TxHash};
use crate::validity::meets_target;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Transaction with a fixed hash and a controllable validity flag.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestTx {
    pub hash: TxHash,
    pub valid: bool,
}

impl TestTx {
    pub fn with_seed(seed: u8) -> Self {
        Self {
            hash: Sha256::digest([seed]).into(),
            valid: true,
        }
    }

    pub fn invalid(seed: u8) -> Self {
        Self {
            valid: false,
            ..Self::with_seed(seed)
        }
    }
}

impl Transaction for TestTx {
    fn hash(&self) -> TxHash {
        self.hash
    }

    fn validate(&self) -> bool {
        self.valid
    }
}

impl Coinbase for TestTx {
    fn coinbase(address: &str) -> Self {
        Self {
            hash: Sha256::digest(address.as_bytes()).into(),
            valid: true,
        }
    }
}

/// Targets of one leading zero so mining stays fast.
pub fn easy_config() -> ChainConfig {
    ChainConfig {
        target_prefix_length: 1,
        genesis_target_prefix_length: 1,
        ..Default::default()
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 11, 20, 10, 4, 5).unwrap()
}

/// Brute-forces the nonce until the header hash meets `prefix_len`.
pub fn mine<S: Transaction, P: Transaction>(block: &mut Block<S, P>, prefix_len: usize) {
    for nonce in 0..=u32::MAX {
        block.set_nonce(nonce).unwrap();
        if meets_target(&block.header.hash, prefix_len) {
            return;
        }
    }
    panic!("no nonce satisfies a {prefix_len}-zero target");
}
