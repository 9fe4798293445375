//! # Core Ledger Entities
//!
//! ## Clusters
//!
//! - **Identity**: `TxId`, `ChaincodeIdentity`
//! - **Ledger**: `BlockEvent`, `TransactionEvent`, `TxValidationCode`

use crate::errors::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Transaction identifier: lowercase hex of a 32-byte digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    /// Build a transaction id from the digest it encodes.
    pub fn from_digest(digest: &Hash) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a transaction id from its hex form.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let valid = value.len() == 64
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(TypeError::InvalidTxId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TxId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> Self {
        id.0
    }
}

/// Identifies deployed chaincode. Two identities are the same deployment
/// only when name, path and version all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeIdentity {
    pub name: String,
    pub path: String,
    pub version: String,
}

impl ChaincodeIdentity {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let identity = Self {
            name: name.into(),
            path: path.into(),
            version: version.into(),
        };
        if identity.name.is_empty() {
            return Err(TypeError::EmptyChaincodeField { field: "name" });
        }
        if identity.version.is_empty() {
            return Err(TypeError::EmptyChaincodeField { field: "version" });
        }
        Ok(identity)
    }
}

impl fmt::Display for ChaincodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.name, self.version, self.path)
    }
}

// =============================================================================
// CLUSTER B: LEDGER
// =============================================================================

/// Commit-time validation result the ledger assigns to each transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxValidationCode {
    Valid,
    MvccReadConflict,
    PhantomReadConflict,
    EndorsementPolicyFailure,
    BadPayload,
    DuplicateTxId,
    Other(i32),
}

impl TxValidationCode {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// A transaction as it appears inside a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub tx_id: TxId,
    pub validation_code: TxValidationCode,
}

impl TransactionEvent {
    pub fn valid(tx_id: TxId) -> Self {
        Self {
            tx_id,
            validation_code: TxValidationCode::Valid,
        }
    }
}

/// Notification that a block was appended to a channel's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvent {
    /// Channel the block belongs to.
    pub channel: String,
    /// Block number (height - 1).
    pub number: u64,
    /// Hash over the block's data section.
    pub data_hash: Hash,
    /// Header hash of the previous block.
    pub previous_hash: Hash,
    /// Transactions contained, in block order.
    pub transactions: Vec<TransactionEvent>,
}

impl BlockEvent {
    /// Look up a transaction by id.
    pub fn find(&self, tx_id: &TxId) -> Option<&TransactionEvent> {
        self.transactions.iter().find(|tx| &tx.tx_id == tx_id)
    }

    pub fn tx_ids(&self) -> impl Iterator<Item = &TxId> {
        self.transactions.iter().map(|tx| &tx.tx_id)
    }
}
