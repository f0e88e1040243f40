use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw SHA-256 digest identifying a transaction.
pub type TxHash = [u8; 32];

/// Address that receives the genesis reward. Nobody owns it.
pub const NULL_ADDRESS: &str = "000000";

/// Amount minted by a coinbase transaction.
pub const BLOCK_REWARD: u64 = 50;

/// Capabilities the chain core needs from any transaction kind.
///
/// The core never looks inside a transaction: it only feeds `hash` into the
/// Merkle root and asks `validate` whether the transaction may be included.
pub trait Transaction {
    fn hash(&self) -> TxHash;
    fn validate(&self) -> bool;
}

/// A transaction kind able to carry a block reward.
pub trait Coinbase: Transaction {
    /// Builds the reward transaction paying `address`.
    fn coinbase(address: &str) -> Self;
}

/// Represents a schmekles coin transfer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SchTransaction {
    /// Sending address. Empty for minted coins.
    pub from: String,
    /// Receiving address.
    pub to: String,
    /// Amount of schmekles moved.
    pub amount: u64,
}

impl Transaction for SchTransaction {
    fn hash(&self) -> TxHash {
        // Field order is fixed by the struct, so the JSON form is canonical.
        let serialized = serde_json::to_vec(self).expect("serialize transaction");
        Sha256::digest(&serialized).into()
    }

    fn validate(&self) -> bool {
        !self.from.is_empty() && !self.to.is_empty() && self.from != self.to && self.amount > 0
    }
}

impl Coinbase for SchTransaction {
    fn coinbase(address: &str) -> Self {
        Self {
            from: String::new(),
            to: address.to_string(),
            amount: BLOCK_REWARD,
        }
    }
}

/// Represents a pepe changing owner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PepeTransaction {
    pub hash: TxHash,
}

impl Transaction for PepeTransaction {
    fn hash(&self) -> TxHash {
        self.hash
    }

    fn validate(&self) -> bool {
        true
    }
}
