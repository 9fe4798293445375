//! # In-Memory Network
//!
//! Scriptable peers, orderers that cut single-transaction blocks onto a
//! shared event bus, and event sources reading from that bus.

use super::verifier::endorsement_tag;
use crate::config::{NetworkConfig, NodeConfig};
use crate::domain::{
    BroadcastAck, ChannelCreateRequest, ChannelError, ChannelResult, Endorsement, ProposalKind,
    ProposalStatus, ReadWriteSet, SignedProposal, TransactionEnvelope,
};
use crate::ports::outbound::{
    BlockEventStream, EventSourceConnection, NetworkConnector, OrdererConnection, PeerConnection,
    SigningIdentity,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, LedgerEvent};
use shared_types::{BlockEvent, ChaincodeIdentity, Hash, TransactionEvent, TxValidationCode};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::debug;

fn unreachable_error(node: &str) -> ChannelError {
    ChannelError::NodeUnreachable {
        node: node.to_string(),
        reason: "connection refused".into(),
    }
}

// =============================================================================
// PEERS
// =============================================================================

/// How a mock peer answers proposals.
#[derive(Debug, Clone)]
pub enum PeerBehavior {
    /// Sign and return the given simulation result.
    Endorse { payload: Vec<u8>, rwset: ReadWriteSet },
    /// Return a successful response whose signature does not verify.
    Tamper { payload: Vec<u8>, rwset: ReadWriteSet },
    /// Return a failed response.
    Fail(String),
    /// Fail the send.
    Unreachable,
    /// Never answer.
    Hang,
}

pub struct MockPeer {
    name: String,
    channels: Mutex<HashSet<String>>,
    installed: Mutex<Vec<ChaincodeIdentity>>,
    instantiated: HashMap<String, Vec<ChaincodeIdentity>>,
    height: Option<u64>,
    reachable: bool,
    delay: Duration,
    behavior: Mutex<PeerBehavior>,
    proposals: AtomicUsize,
}

impl MockPeer {
    /// A reachable peer at height 1 that endorses with an empty result.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Mutex::new(HashSet::new()),
            installed: Mutex::new(Vec::new()),
            instantiated: HashMap::new(),
            height: Some(1),
            reachable: true,
            delay: Duration::ZERO,
            behavior: Mutex::new(PeerBehavior::Endorse {
                payload: Vec::new(),
                rwset: ReadWriteSet::default(),
            }),
            proposals: AtomicUsize::new(0),
        }
    }

    pub fn joined(mut self, channel: &str) -> Self {
        self.channels.get_mut().insert(channel.to_string());
        self
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = Some(height);
        self
    }

    /// Fail block height queries.
    pub fn without_height(mut self) -> Self {
        self.height = None;
        self
    }

    pub fn with_installed(self, chaincode: ChaincodeIdentity) -> Self {
        self.installed.lock().push(chaincode);
        self
    }

    pub fn with_instantiated(mut self, channel: &str, chaincode: ChaincodeIdentity) -> Self {
        self.instantiated
            .entry(channel.to_string())
            .or_default()
            .push(chaincode);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn endorsing(self, payload: Vec<u8>, rwset: ReadWriteSet) -> Self {
        self.with_behavior(PeerBehavior::Endorse { payload, rwset })
    }

    pub fn with_behavior(self, behavior: PeerBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    /// Fail every request, including membership queries.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self.with_behavior(PeerBehavior::Unreachable)
    }

    pub fn set_behavior(&self, behavior: PeerBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn proposals_received(&self) -> usize {
        self.proposals.load(Ordering::Relaxed)
    }

    pub fn installed(&self) -> Vec<ChaincodeIdentity> {
        self.installed.lock().clone()
    }

    /// Joined channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.lock().iter().cloned().collect();
        channels.sort();
        channels
    }

    fn ensure_reachable(&self) -> ChannelResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(unreachable_error(&self.name))
        }
    }

    fn endorse(
        &self,
        proposal: &SignedProposal,
        payload: Vec<u8>,
        rwset: ReadWriteSet,
        tamper: bool,
    ) -> ChannelResult<Endorsement> {
        let endorser = self.name.as_bytes().to_vec();
        let digest = rwset.digest()?;
        let mut signature = endorsement_tag(&endorser, proposal.tx_id(), &payload, &digest);
        if tamper {
            signature[0] ^= 0xff;
        }
        Ok(Endorsement {
            status: ProposalStatus::Success,
            message: String::new(),
            payload,
            rwset,
            endorser,
            signature,
        })
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn process_proposal(&self, proposal: &SignedProposal) -> ChannelResult<Endorsement> {
        self.proposals.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = self.behavior.lock().clone();
        match behavior {
            PeerBehavior::Endorse { payload, rwset } => {
                let endorsement = self.endorse(proposal, payload, rwset, false)?;
                if let ProposalKind::Install { .. } = proposal.proposal.kind {
                    self.installed.lock().push(proposal.proposal.chaincode.clone());
                }
                Ok(endorsement)
            }
            PeerBehavior::Tamper { payload, rwset } => self.endorse(proposal, payload, rwset, true),
            PeerBehavior::Fail(message) => Ok(Endorsement::failure(message)),
            PeerBehavior::Unreachable => Err(unreachable_error(&self.name)),
            PeerBehavior::Hang => std::future::pending::<ChannelResult<Endorsement>>().await,
        }
    }

    async fn list_channels(&self, _identity: &dyn SigningIdentity) -> ChannelResult<HashSet<String>> {
        self.ensure_reachable()?;
        Ok(self.channels.lock().clone())
    }

    async fn list_installed(
        &self,
        _identity: &dyn SigningIdentity,
    ) -> ChannelResult<Vec<ChaincodeIdentity>> {
        self.ensure_reachable()?;
        Ok(self.installed())
    }

    async fn list_instantiated(
        &self,
        channel: &str,
        _identity: &dyn SigningIdentity,
    ) -> ChannelResult<Vec<ChaincodeIdentity>> {
        self.ensure_reachable()?;
        Ok(self.instantiated.get(channel).cloned().unwrap_or_default())
    }

    async fn block_height(
        &self,
        channel: &str,
        _identity: &dyn SigningIdentity,
    ) -> ChannelResult<u64> {
        self.ensure_reachable()?;
        self.height.ok_or_else(|| ChannelError::NodeUnreachable {
            node: self.name.clone(),
            reason: format!("no ledger for channel {channel}"),
        })
    }

    async fn join_channel(
        &self,
        genesis: &BlockEvent,
        _identity: &dyn SigningIdentity,
    ) -> ChannelResult<()> {
        self.ensure_reachable()?;
        if genesis.number != 0 {
            return Err(ChannelError::InvalidRequest(format!(
                "block {} of {} is not a genesis block",
                genesis.number, genesis.channel
            )));
        }
        self.channels.lock().insert(genesis.channel.clone());
        debug!(peer = %self.name, channel = %genesis.channel, "Joined channel");
        Ok(())
    }
}

// =============================================================================
// ORDERERS
// =============================================================================

enum OrdererMode {
    Accept,
    CutBlocks {
        bus: Arc<InMemoryEventBus>,
        code: TxValidationCode,
    },
    Reject(String),
    Unreachable,
}

pub struct MockOrderer {
    name: String,
    mode: OrdererMode,
    received: Mutex<Vec<TransactionEnvelope>>,
    channels: Mutex<HashSet<String>>,
    next_block: AtomicU64,
    last_hash: Mutex<Hash>,
}

impl MockOrderer {
    /// Accepts every envelope without producing blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: OrdererMode::Accept,
            received: Mutex::new(Vec::new()),
            channels: Mutex::new(HashSet::new()),
            next_block: AtomicU64::new(1),
            last_hash: Mutex::new([0; 32]),
        }
    }

    /// Publish a block holding each accepted transaction as `Valid`.
    pub fn cutting_blocks(self, bus: Arc<InMemoryEventBus>) -> Self {
        self.cutting_blocks_with(bus, TxValidationCode::Valid)
    }

    /// Publish a block holding each accepted transaction with `code`.
    pub fn cutting_blocks_with(mut self, bus: Arc<InMemoryEventBus>, code: TxValidationCode) -> Self {
        self.mode = OrdererMode::CutBlocks { bus, code };
        self
    }

    /// Treat `channel` as already created.
    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channels.get_mut().insert(channel.to_string());
        self
    }

    pub fn rejecting(mut self, reason: impl Into<String>) -> Self {
        self.mode = OrdererMode::Reject(reason.into());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.mode = OrdererMode::Unreachable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channels created through this orderer or declared with `with_channel`, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.lock().iter().cloned().collect();
        channels.sort();
        channels
    }

    /// Envelopes that reached this orderer, in arrival order.
    pub fn received(&self) -> Vec<TransactionEnvelope> {
        self.received.lock().clone()
    }

    fn cut_block(&self, envelope: &TransactionEnvelope, code: TxValidationCode) -> BlockEvent {
        let mut last_hash = self.last_hash.lock();
        let number = self.next_block.fetch_add(1, Ordering::Relaxed);
        let data_hash: Hash = Sha256::digest(envelope.tx_id.as_str().as_bytes()).into();
        let block = BlockEvent {
            channel: envelope.channel.clone(),
            number,
            data_hash,
            previous_hash: *last_hash,
            transactions: vec![TransactionEvent {
                tx_id: envelope.tx_id.clone(),
                validation_code: code,
            }],
        };

        *last_hash = header_hash(&block);
        block
    }
}

fn header_hash(block: &BlockEvent) -> Hash {
    let mut header = Sha256::new();
    header.update(block.number.to_be_bytes());
    header.update(block.previous_hash);
    header.update(block.data_hash);
    header.finalize().into()
}

#[async_trait]
impl OrdererConnection for MockOrderer {
    async fn broadcast(&self, envelope: &TransactionEnvelope) -> ChannelResult<BroadcastAck> {
        if let OrdererMode::Unreachable = self.mode {
            return Err(unreachable_error(&self.name));
        }
        self.received.lock().push(envelope.clone());

        match &self.mode {
            OrdererMode::Reject(reason) => Ok(BroadcastAck::Rejected {
                reason: reason.clone(),
            }),
            OrdererMode::CutBlocks { bus, code } => {
                let block = self.cut_block(envelope, *code);
                debug!(orderer = %self.name, block_number = block.number, "Block cut");
                bus.publish(LedgerEvent::BlockCommitted(block)).await;
                Ok(BroadcastAck::Accepted)
            }
            OrdererMode::Accept | OrdererMode::Unreachable => Ok(BroadcastAck::Accepted),
        }
    }

    async fn create_channel(&self, request: &ChannelCreateRequest) -> ChannelResult<BlockEvent> {
        let refuse = |reason: String| ChannelError::ChannelCreationFailed {
            channel: request.channel.clone(),
            reason,
        };
        match &self.mode {
            OrdererMode::Unreachable => return Err(unreachable_error(&self.name)),
            OrdererMode::Reject(reason) => return Err(refuse(reason.clone())),
            OrdererMode::Accept | OrdererMode::CutBlocks { .. } => {}
        }
        if request.signatures.is_empty() {
            return Err(refuse("configuration is not signed".into()));
        }
        if !self.channels.lock().insert(request.channel.clone()) {
            return Err(refuse("channel already exists".into()));
        }

        let genesis = BlockEvent {
            channel: request.channel.clone(),
            number: 0,
            data_hash: Sha256::digest(&request.configuration).into(),
            previous_hash: [0; 32],
            transactions: Vec::new(),
        };
        debug!(
            orderer = %self.name,
            channel = %request.channel,
            genesis = %hex::encode(header_hash(&genesis)),
            "Channel created"
        );
        Ok(genesis)
    }
}

// =============================================================================
// EVENT SOURCES
// =============================================================================

/// Streams a channel's blocks from an event bus until the bus announces
/// this source's disconnection.
pub struct BusEventSource {
    name: String,
    bus: Arc<InMemoryEventBus>,
    reachable: bool,
}

impl BusEventSource {
    pub fn new(name: impl Into<String>, bus: Arc<InMemoryEventBus>) -> Self {
        Self {
            name: name.into(),
            bus,
            reachable: true,
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// End this source's streams for `channel`.
    pub async fn disconnect(&self, channel: &str) {
        self.bus
            .publish(LedgerEvent::SourceDisconnected {
                channel: channel.to_string(),
                source: self.name.clone(),
            })
            .await;
    }
}

#[async_trait]
impl EventSourceConnection for BusEventSource {
    async fn subscribe(&self, channel: &str) -> ChannelResult<BlockEventStream> {
        if !self.reachable {
            return Err(unreachable_error(&self.name));
        }
        let name = self.name.clone();
        let stream = self
            .bus
            .event_stream(EventFilter::channel(channel))
            .take_while(move |event| {
                !matches!(event, LedgerEvent::SourceDisconnected { source, .. } if *source == name)
            })
            .filter_map(|event| match event {
                LedgerEvent::BlockCommitted(block) => Some(block),
                LedgerEvent::SourceDisconnected { .. } => None,
            });
        Ok(Box::pin(stream))
    }
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Resolves node configs to registered in-memory nodes by name.
#[derive(Default)]
pub struct InMemoryNetwork {
    peers: Vec<Arc<MockPeer>>,
    orderers: Vec<Arc<MockOrderer>>,
    event_sources: Vec<Arc<BusEventSource>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, peer: impl Into<Arc<MockPeer>>) -> Self {
        self.peers.push(peer.into());
        self
    }

    pub fn with_orderer(mut self, orderer: impl Into<Arc<MockOrderer>>) -> Self {
        self.orderers.push(orderer.into());
        self
    }

    pub fn with_event_source(mut self, source: impl Into<Arc<BusEventSource>>) -> Self {
        self.event_sources.push(source.into());
        self
    }

    /// Configuration listing every registered node, in registration order.
    pub fn network_config(&self, organization: &str, channel: &str) -> NetworkConfig {
        let node = |name: &str| NodeConfig::new(name, format!("inmem://{name}"));
        NetworkConfig {
            organization: organization.to_string(),
            channel: channel.to_string(),
            orderers: self.orderers.iter().map(|o| node(o.name())).collect(),
            peers: self.peers.iter().map(|p| node(p.name())).collect(),
            event_sources: self.event_sources.iter().map(|s| node(s.name())).collect(),
        }
    }
}

impl NetworkConnector for InMemoryNetwork {
    fn peer(&self, node: &NodeConfig) -> ChannelResult<Arc<dyn PeerConnection>> {
        self.peers
            .iter()
            .find(|p| p.name() == node.name)
            .map(|p| p.clone() as Arc<dyn PeerConnection>)
            .ok_or_else(|| unreachable_error(&node.name))
    }

    fn orderer(&self, node: &NodeConfig) -> ChannelResult<Arc<dyn OrdererConnection>> {
        self.orderers
            .iter()
            .find(|o| o.name() == node.name)
            .map(|o| o.clone() as Arc<dyn OrdererConnection>)
            .ok_or_else(|| unreachable_error(&node.name))
    }

    fn event_source(&self, node: &NodeConfig) -> ChannelResult<Arc<dyn EventSourceConnection>> {
        self.event_sources
            .iter()
            .find(|s| s.name() == node.name)
            .map(|s| s.clone() as Arc<dyn EventSourceConnection>)
            .ok_or_else(|| unreachable_error(&node.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(channel: &str, number: u64) -> LedgerEvent {
        LedgerEvent::BlockCommitted(BlockEvent {
            channel: channel.to_string(),
            number,
            data_hash: [0; 32],
            previous_hash: [0; 32],
            transactions: vec![],
        })
    }

    #[tokio::test]
    async fn test_bus_source_ends_on_disconnect() {
        let bus = Arc::new(InMemoryEventBus::new());
        let source = BusEventSource::new("hub0", bus.clone());
        let other = BusEventSource::new("hub1", bus.clone());
        let mut stream = source.subscribe("mychannel").await.unwrap();

        bus.publish(block("mychannel", 1)).await;
        other.disconnect("mychannel").await;
        bus.publish(block("mychannel", 2)).await;
        source.disconnect("mychannel").await;
        bus.publish(block("mychannel", 3)).await;

        let mut numbers = Vec::new();
        while let Some(block) = stream.next().await {
            numbers.push(block.number);
        }
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unknown_node_is_unreachable() {
        let net = InMemoryNetwork::new();
        let err = net
            .peer(&NodeConfig::new("ghost", "inmem://ghost"))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::NodeUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_orderer_chains_block_hashes() {
        let bus = Arc::new(InMemoryEventBus::new());
        let orderer = MockOrderer::new("orderer0").cutting_blocks(bus.clone());
        let mut stream = bus.event_stream(EventFilter::all());

        let envelope = |n: u8| TransactionEnvelope {
            tx_id: shared_types::TxId::from_digest(&[n; 32]),
            channel: "mychannel".into(),
            proposal: vec![],
            payload: vec![],
            effect_digest: [0; 32],
            endorsements: vec![],
            signature: vec![],
        };
        orderer.broadcast(&envelope(1)).await.unwrap();
        orderer.broadcast(&envelope(2)).await.unwrap();

        let mut blocks = Vec::new();
        for _ in 0..2 {
            if let Some(LedgerEvent::BlockCommitted(block)) = stream.next().await {
                blocks.push(block);
            }
        }
        assert_eq!(blocks[0].number, 1);
        assert_eq!(blocks[1].number, 2);
        assert_eq!(blocks[0].previous_hash, [0; 32]);
        assert_ne!(blocks[1].previous_hash, [0; 32]);
        assert_eq!(orderer.received().len(), 2);
    }
}
