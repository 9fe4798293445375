//! # Outbound Ports
//!
//! Transport, signing and verification are supplied by the embedding
//! application. The client never opens sockets or touches key material
//! itself.

use crate::config::NodeConfig;
use crate::domain::{
    BroadcastAck, ChannelCreateRequest, ChannelResult, Endorsement, SignedProposal,
    TransactionEnvelope,
};
use async_trait::async_trait;
use futures::Stream;
use shared_types::{BlockEvent, ChaincodeIdentity};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

/// Blocks delivered by one event source, in ledger order.
pub type BlockEventStream = Pin<Box<dyn Stream<Item = BlockEvent> + Send>>;

/// The caller's credentials.
pub trait SigningIdentity: Send + Sync {
    fn msp_id(&self) -> &str;

    /// Serialized identity embedded in proposals.
    fn creator(&self) -> &[u8];

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, String>;
}

/// Checks an endorser's signature over its response.
pub trait EndorsementVerifier: Send + Sync {
    fn verify(&self, proposal: &SignedProposal, endorsement: &Endorsement) -> bool;
}

/// An endorsing peer.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Simulate a proposal and return the peer's endorsement.
    async fn process_proposal(&self, proposal: &SignedProposal) -> ChannelResult<Endorsement>;

    /// Channels this peer has joined.
    async fn list_channels(&self, identity: &dyn SigningIdentity) -> ChannelResult<HashSet<String>>;

    async fn list_installed(
        &self,
        identity: &dyn SigningIdentity,
    ) -> ChannelResult<Vec<ChaincodeIdentity>>;

    async fn list_instantiated(
        &self,
        channel: &str,
        identity: &dyn SigningIdentity,
    ) -> ChannelResult<Vec<ChaincodeIdentity>>;

    /// Current ledger height of the channel on this peer.
    async fn block_height(&self, channel: &str, identity: &dyn SigningIdentity)
        -> ChannelResult<u64>;

    /// Join the channel whose genesis block is given.
    async fn join_channel(
        &self,
        genesis: &BlockEvent,
        identity: &dyn SigningIdentity,
    ) -> ChannelResult<()>;
}

/// An ordering node.
#[async_trait]
pub trait OrdererConnection: Send + Sync {
    async fn broadcast(&self, envelope: &TransactionEnvelope) -> ChannelResult<BroadcastAck>;

    /// Create a channel and return its genesis block.
    async fn create_channel(&self, request: &ChannelCreateRequest) -> ChannelResult<BlockEvent>;
}

/// A node that streams committed blocks.
#[async_trait]
pub trait EventSourceConnection: Send + Sync {
    async fn subscribe(&self, channel: &str) -> ChannelResult<BlockEventStream>;
}

/// Creates connection handles from configuration.
///
/// Creating a handle does not contact the node.
pub trait NetworkConnector: Send + Sync {
    fn peer(&self, node: &NodeConfig) -> ChannelResult<Arc<dyn PeerConnection>>;

    fn orderer(&self, node: &NodeConfig) -> ChannelResult<Arc<dyn OrdererConnection>>;

    fn event_source(&self, node: &NodeConfig) -> ChannelResult<Arc<dyn EventSourceConnection>>;
}
