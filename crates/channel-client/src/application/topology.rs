//! # Channel Topology
//!
//! The set of nodes serving one channel. Nodes are kept in flat vectors
//! indexed by their dense ids, with connection handles in a parallel side
//! table. A topology is mutable while it is assembled and frozen once
//! `initialize` succeeds; after that it is shared read-only behind `Arc`.

use super::tracker::CommitTracker;
use crate::config::{ChannelClientConfig, NetworkConfig, NodeConfig};
use crate::domain::{
    ChannelConfiguration, ChannelCreateRequest, ChannelError, ChannelResult, EventSourceId,
    OrdererId, PeerId,
};
use crate::events::{BlockObserver, ObserverList};
use crate::ports::outbound::{
    EventSourceConnection, NetworkConnector, OrdererConnection, PeerConnection, SigningIdentity,
};
use futures::future::join_all;
use shared_types::ChaincodeIdentity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A registered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry<Id> {
    pub id: Id,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyState {
    Assembling,
    Initialized { block_height: u64 },
}

#[derive(Default)]
struct Connections {
    peers: Vec<Arc<dyn PeerConnection>>,
    orderers: Vec<Arc<dyn OrdererConnection>>,
    event_sources: Vec<Arc<dyn EventSourceConnection>>,
}

pub struct ChannelTopology {
    name: String,
    identity: Arc<dyn SigningIdentity>,
    peers: Vec<NodeEntry<PeerId>>,
    orderers: Vec<NodeEntry<OrdererId>>,
    event_sources: Vec<NodeEntry<EventSourceId>>,
    connections: Connections,
    proposal_wait: Duration,
    commit_wait: Duration,
    observers: ObserverList,
    state: TopologyState,
    tracker: Option<CommitTracker>,
}

impl ChannelTopology {
    /// Empty topology with the block logger registered.
    pub fn new(
        name: impl Into<String>,
        identity: Arc<dyn SigningIdentity>,
        config: &ChannelClientConfig,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            peers: Vec::new(),
            orderers: Vec::new(),
            event_sources: Vec::new(),
            connections: Connections::default(),
            proposal_wait: config.proposal_wait(),
            commit_wait: config.commit_wait(),
            observers: ObserverList::with_logger(),
            state: TopologyState::Assembling,
            tracker: None,
        }
    }

    /// Bind every configured node to a new topology for `channel`.
    ///
    /// Peers must report membership in the channel. Orderers and event
    /// sources are registered without contact.
    pub async fn assemble(
        network: &NetworkConfig,
        channel: &str,
        identity: Arc<dyn SigningIdentity>,
        connector: &dyn NetworkConnector,
        config: &ChannelClientConfig,
    ) -> ChannelResult<Self> {
        network.validate()?;
        let mut topology = Self::new(channel, identity, config);

        for node in &network.orderers {
            let connection = connector.orderer(node)?;
            topology.add_orderer(node, connection)?;
        }
        for node in &network.peers {
            let connection = connector.peer(node)?;
            topology.add_peer(node, connection).await?;
        }
        topology.add_event_sources(network, connector)?;

        info!(
            channel = %channel,
            peers = topology.peers.len(),
            orderers = topology.orderers.len(),
            event_sources = topology.event_sources.len(),
            "Channel assembled"
        );
        Ok(topology)
    }

    /// Create `channel` on the ordering service, join every configured peer
    /// to it and return the initialized topology.
    ///
    /// The first orderer receives the creation request. The others are
    /// registered once it has returned the genesis block.
    pub async fn create(
        network: &NetworkConfig,
        channel: &str,
        configuration: &ChannelConfiguration,
        identity: Arc<dyn SigningIdentity>,
        connector: &dyn NetworkConnector,
        config: &ChannelClientConfig,
    ) -> ChannelResult<Self> {
        network.validate()?;
        let Some((first, rest)) = network.orderers.split_first() else {
            return Err(ChannelError::ChannelCreationFailed {
                channel: channel.to_string(),
                reason: "no ordering node configured".into(),
            });
        };

        let request = ChannelCreateRequest::sign(channel, configuration, identity.as_ref())?;
        let creator = connector.orderer(first)?;
        let genesis = creator.create_channel(&request).await?;
        if genesis.channel != channel || genesis.number != 0 {
            return Err(ChannelError::ChannelCreationFailed {
                channel: channel.to_string(),
                reason: format!(
                    "orderer {} answered with block {} of {}",
                    first.name, genesis.number, genesis.channel
                ),
            });
        }
        info!(channel = %channel, orderer = %first.name, "Channel created");

        let mut topology = Self::new(channel, identity, config);
        topology.add_orderer(first, creator)?;
        for node in &network.peers {
            let connection = connector.peer(node)?;
            connection
                .join_channel(&genesis, topology.identity.as_ref())
                .await?;
            info!(channel = %channel, peer = %node.name, "Peer joined channel");
            topology.add_peer(node, connection).await?;
        }
        for node in rest {
            let connection = connector.orderer(node)?;
            topology.add_orderer(node, connection)?;
        }
        topology.add_event_sources(network, connector)?;

        topology.initialize().await?;
        Ok(topology)
    }

    /// Register every event source the connector can reach.
    fn add_event_sources(
        &mut self,
        network: &NetworkConfig,
        connector: &dyn NetworkConnector,
    ) -> ChannelResult<()> {
        for node in &network.event_sources {
            match connector.event_source(node) {
                Ok(connection) => {
                    self.add_event_source(node, connection)?;
                }
                Err(e) => warn!(
                    channel = %self.name,
                    source = %node.name,
                    error = %e,
                    "Skipping event source"
                ),
            }
        }
        Ok(())
    }

    fn ensure_assembling(&self) -> ChannelResult<()> {
        match self.state {
            TopologyState::Assembling => Ok(()),
            TopologyState::Initialized { .. } => Err(ChannelError::TopologyFrozen {
                channel: self.name.clone(),
            }),
        }
    }

    /// Register a peer after confirming it joined this channel.
    pub async fn add_peer(
        &mut self,
        node: &NodeConfig,
        connection: Arc<dyn PeerConnection>,
    ) -> ChannelResult<PeerId> {
        self.ensure_assembling()?;
        let channels = connection
            .list_channels(self.identity.as_ref())
            .await
            .map_err(|e| ChannelError::NodeUnreachable {
                node: node.name.clone(),
                reason: e.to_string(),
            })?;
        if !channels.contains(&self.name) {
            return Err(ChannelError::MembershipMismatch {
                peer: node.name.clone(),
                channel: self.name.clone(),
            });
        }

        let id = PeerId(self.peers.len() as u32);
        debug!(channel = %self.name, peer = %node.name, %id, "Peer bound");
        self.peers.push(NodeEntry {
            id,
            name: node.name.clone(),
            url: node.url.clone(),
        });
        self.connections.peers.push(connection);
        Ok(id)
    }

    pub fn add_orderer(
        &mut self,
        node: &NodeConfig,
        connection: Arc<dyn OrdererConnection>,
    ) -> ChannelResult<OrdererId> {
        self.ensure_assembling()?;
        let id = OrdererId(self.orderers.len() as u32);
        self.orderers.push(NodeEntry {
            id,
            name: node.name.clone(),
            url: node.url.clone(),
        });
        self.connections.orderers.push(connection);
        Ok(id)
    }

    pub fn add_event_source(
        &mut self,
        node: &NodeConfig,
        connection: Arc<dyn EventSourceConnection>,
    ) -> ChannelResult<EventSourceId> {
        self.ensure_assembling()?;
        let id = EventSourceId(self.event_sources.len() as u32);
        self.event_sources.push(NodeEntry {
            id,
            name: node.name.clone(),
            url: node.url.clone(),
        });
        self.connections.event_sources.push(connection);
        Ok(id)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BlockObserver>) -> ChannelResult<()> {
        self.ensure_assembling()?;
        self.observers.push(observer);
        Ok(())
    }

    /// Resolve the block height, subscribe to event sources and start the
    /// commit tracker. Calling it again on an initialized topology is a no-op.
    pub async fn initialize(&mut self) -> ChannelResult<()> {
        if let TopologyState::Initialized { block_height } = self.state {
            debug!(channel = %self.name, block_height, "Channel already initialized");
            return Ok(());
        }

        let block_height = self.resolve_block_height().await?;

        let channel = self.name.as_str();
        let subscriptions = join_all(
            self.event_sources
                .iter()
                .zip(&self.connections.event_sources)
                .map(|(entry, connection)| async move {
                    (entry, connection.subscribe(channel).await)
                }),
        )
        .await;
        let mut streams = Vec::with_capacity(subscriptions.len());
        for (entry, result) in subscriptions {
            match result {
                Ok(stream) => streams.push((entry.name.clone(), stream)),
                Err(e) => warn!(
                    channel = %self.name,
                    source = %entry.name,
                    error = %e,
                    "Event source unreachable, continuing without it"
                ),
            }
        }
        if streams.is_empty() && !self.event_sources.is_empty() {
            warn!(channel = %self.name, "No event source reachable, commits can only time out");
        }

        self.tracker = Some(CommitTracker::spawn(
            &self.name,
            streams,
            self.observers.clone(),
            self.commit_wait,
        ));
        self.state = TopologyState::Initialized { block_height };
        info!(channel = %self.name, block_height, "Channel initialized");
        Ok(())
    }

    async fn resolve_block_height(&self) -> ChannelResult<u64> {
        if self.peers.is_empty() {
            return Ok(0);
        }
        let identity = self.identity.as_ref();
        let heights = join_all(
            self.connections
                .peers
                .iter()
                .map(|peer| peer.block_height(&self.name, identity)),
        )
        .await;

        let mut best: Option<u64> = None;
        let mut failures = Vec::new();
        for (entry, height) in self.peers.iter().zip(heights) {
            match height {
                Ok(h) => best = Some(best.map_or(h, |b| b.max(h))),
                Err(e) => {
                    warn!(channel = %self.name, peer = %entry.name, error = %e, "Block height query failed");
                    failures.push(format!("{}: {e}", entry.name));
                }
            }
        }
        best.ok_or_else(|| ChannelError::InitializationFailed {
            channel: self.name.clone(),
            reason: format!("no peer reported a block height ({})", failures.join("; ")),
        })
    }

    /// Every bound peer lists the chaincode as installed and instantiated
    /// on this channel.
    pub async fn verify_deployment(&self, chaincode: &ChaincodeIdentity) -> bool {
        self.missing_deployment(chaincode).await.is_none()
    }

    /// Name of the first peer lacking the chaincode, if any.
    pub async fn missing_deployment(&self, chaincode: &ChaincodeIdentity) -> Option<String> {
        let identity = self.identity.as_ref();
        for (entry, peer) in self.peers.iter().zip(&self.connections.peers) {
            info!(channel = %self.name, peer = %entry.name, chaincode = %chaincode, "Checking installed chaincode");
            let installed = match peer.list_installed(identity).await {
                Ok(list) => list.contains(chaincode),
                Err(e) => {
                    warn!(peer = %entry.name, error = %e, "Installed chaincode query failed");
                    false
                }
            };
            if !installed {
                warn!(peer = %entry.name, chaincode = %chaincode, "Peer is missing chaincode");
                return Some(entry.name.clone());
            }

            let instantiated = match peer.list_instantiated(&self.name, identity).await {
                Ok(list) => list.contains(chaincode),
                Err(e) => {
                    warn!(peer = %entry.name, error = %e, "Instantiated chaincode query failed");
                    false
                }
            };
            if !instantiated {
                warn!(
                    channel = %self.name,
                    peer = %entry.name,
                    chaincode = %chaincode,
                    "Peer has chaincode installed but not instantiated"
                );
                return Some(entry.name.clone());
            }
        }
        None
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &Arc<dyn SigningIdentity> {
        &self.identity
    }

    pub fn state(&self) -> TopologyState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, TopologyState::Initialized { .. })
    }

    pub fn block_height(&self) -> Option<u64> {
        match self.state {
            TopologyState::Initialized { block_height } => Some(block_height),
            TopologyState::Assembling => None,
        }
    }

    pub fn proposal_wait(&self) -> Duration {
        self.proposal_wait
    }

    pub fn peers(&self) -> &[NodeEntry<PeerId>] {
        &self.peers
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|p| p.id).collect()
    }

    pub fn orderers(&self) -> &[NodeEntry<OrdererId>] {
        &self.orderers
    }

    pub fn event_sources(&self) -> &[NodeEntry<EventSourceId>] {
        &self.event_sources
    }

    pub fn peer_name(&self, id: PeerId) -> Option<&str> {
        self.peers.get(id.index()).map(|p| p.name.as_str())
    }

    pub fn peer_connection(&self, id: PeerId) -> Option<&Arc<dyn PeerConnection>> {
        self.connections.peers.get(id.index())
    }

    pub fn orderer_connection(&self, id: OrdererId) -> Option<&Arc<dyn OrdererConnection>> {
        self.connections.orderers.get(id.index())
    }

    pub fn tracker(&self) -> ChannelResult<&CommitTracker> {
        self.tracker.as_ref().ok_or_else(|| ChannelError::NotInitialized {
            channel: self.name.clone(),
        })
    }
}

impl std::fmt::Debug for ChannelTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTopology")
            .field("name", &self.name)
            .field("peers", &self.peers)
            .field("orderers", &self.orderers)
            .field("event_sources", &self.event_sources)
            .field("state", &self.state)
            .finish()
    }
}
