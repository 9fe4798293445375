//! Application layer: channel topology, the transaction pipeline and the
//! service implementing `ChannelClientApi`.

pub mod broadcaster;
pub mod lifecycle;
pub mod query;
pub mod service;
pub mod submitter;
pub mod topology;
pub mod tracker;

pub use broadcaster::ProposalBroadcaster;
pub use lifecycle::LifecycleOrchestrator;
pub use query::{QueryExecutor, QueryPayload};
pub use service::{ChannelClientDependencies, ChannelClientService};
pub use submitter::{CommitSubmitter, SubmitReceipt};
pub use topology::{ChannelTopology, NodeEntry, TopologyState};
pub use tracker::{CommitHandle, CommitTracker};
