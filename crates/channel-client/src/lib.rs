//! # Channel Client
//!
//! Client-side orchestration of the channel transaction protocol used by
//! permissioned, peer-endorsed ledgers.
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Protocol
//!
//! 1. **Endorse**: a signed proposal goes to every bound peer; each one
//!    simulates the chaincode call and returns a signed read/write set.
//! 2. **Evaluate**: successful responses are grouped by read/write set
//!    digest. One group is expected; divergence is reported and the largest
//!    group is chosen.
//! 3. **Order**: an envelope built from the chosen group goes to every
//!    ordering node; one acceptance is enough.
//! 4. **Commit**: a block listing the transaction arrives on an event
//!    source and resolves the commit handle, or the wait budget runs out.
//!
//! ## Module Structure
//!
//! ```text
//! channel-client/
//! ├── domain/          # Proposals, responses, lifecycle states, policy, errors
//! ├── algorithms/      # Consistency evaluation
//! ├── ports/           # ChannelClientApi (inbound) + network/signing traits (outbound)
//! ├── application/     # Topology, broadcaster, submitter, tracker, service
//! ├── events/          # Passive block observers
//! ├── adapters/        # In-memory network for tests and local runs
//! └── config.rs        # ChannelClientConfig, NetworkConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod events;
pub mod ports;

// Re-exports
pub use algorithms::{accepts, evaluate};
pub use application::{
    ChannelClientDependencies, ChannelClientService, ChannelTopology, CommitHandle, CommitSubmitter,
    CommitTracker, LifecycleOrchestrator, ProposalBroadcaster, QueryExecutor, QueryPayload,
    SubmitReceipt, TopologyState,
};
pub use config::{ChannelClientConfig, ConsistencyPolicy, NetworkConfig, NodeConfig, TlsMaterial};
pub use domain::{
    ChannelConfiguration, ChannelCreateRequest, ChannelError, ChannelResult, CommitOutcome,
    CommitStatus, CommittedTransaction, ConfigError, ConsistencySet, ConsistencyVerdict,
    EndorsementPolicy, EndorsementSummary, Evaluation, InstallReport, PeerId, ProposalKind,
    ProposalRequest, ProposalResponse, ReadWriteSet, TransactionState,
};
pub use events::{BlockLogger, BlockObserver};
pub use ports::{
    BlockEventStream, ChannelClientApi, EndorsementVerifier, EventSourceConnection,
    NetworkConnector, OrdererConnection, PeerConnection, SigningIdentity,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
