//! Error types for the channel client.

use super::commit::TransactionState;
use shared_types::{TxId, TypeError};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors, raised before any network contact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    EmptyField { field: &'static str },

    #[error("Node {node} has an empty url")]
    EmptyUrl { node: String },

    #[error("Duplicate {role} name: {name}")]
    DuplicateNode { role: &'static str, name: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors surfaced by channel operations.
///
/// Per-peer failures never appear here: they are absorbed into failed
/// proposal responses. Commit failures reach callers through the commit
/// handle and only become errors via `CommitOutcome::into_result`.
#[derive(Debug, Error)]
pub enum ChannelError {
    // =========================================================================
    // ASSEMBLY
    // =========================================================================
    /// A peer does not report the channel among its joined channels.
    #[error("Peer {peer} does not appear to belong to channel {channel}")]
    MembershipMismatch { peer: String, channel: String },

    /// A node could not be contacted.
    #[error("Node {node} unreachable: {reason}")]
    NodeUnreachable { node: String, reason: String },

    /// Registration attempted after initialization.
    #[error("Channel {channel} is initialized, topology is frozen")]
    TopologyFrozen { channel: String },

    #[error("Channel {channel} failed to initialize: {reason}")]
    InitializationFailed { channel: String, reason: String },

    #[error("Channel {channel} is not initialized")]
    NotInitialized { channel: String },

    /// The ordering service refused to create a channel.
    #[error("Channel {channel} could not be created: {reason}")]
    ChannelCreationFailed { channel: String, reason: String },

    #[error("Chaincode {chaincode} is not deployed on peer {peer}")]
    ChaincodeNotDeployed { chaincode: String, peer: String },

    // =========================================================================
    // ENDORSEMENT
    // =========================================================================
    /// No endorser returned an acceptable response.
    #[error("No consistent proposal response: {failed} of {total} endorsers failed")]
    NoConsistentResponse { total: usize, failed: usize },

    /// Endorsers disagreed and the strict consistency policy is active.
    #[error("Expected one set of consistent proposal responses but got {sets}")]
    AmbiguousConsistency { sets: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid endorsement policy: {0}")]
    PolicyInvalid(String),

    // =========================================================================
    // COMMIT
    // =========================================================================
    #[error("Transaction {tx_id} rejected: {reason}")]
    CommitRejected { tx_id: TxId, reason: String },

    #[error("Transaction {tx_id} not committed within {waited:?}")]
    CommitTimeout { tx_id: TxId, waited: Duration },

    #[error("Invalid transaction transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionState,
        to: TransactionState,
    },

    /// The commit tracker dropped a pending commit without resolving it.
    #[error("Commit tracker for channel {channel} stopped")]
    TrackerStopped { channel: String },

    // =========================================================================
    // INFRASTRUCTURE
    // =========================================================================
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

impl From<bincode::Error> for ChannelError {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
