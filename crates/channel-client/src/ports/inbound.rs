//! # Inbound Ports
//!
//! The API the client exposes to applications.

use crate::application::{ChannelTopology, QueryPayload, SubmitReceipt};
use crate::config::NetworkConfig;
use crate::domain::{
    ChannelConfiguration, ChannelResult, EndorsementPolicy, InstallReport, ProposalRequest,
};
use crate::ports::outbound::SigningIdentity;
use async_trait::async_trait;
use shared_types::ChaincodeIdentity;
use std::path::PathBuf;
use std::sync::Arc;

#[async_trait]
pub trait ChannelClientApi: Send + Sync {
    /// Bind and initialize a channel topology from configuration.
    async fn assemble_channel(
        &self,
        config: &NetworkConfig,
        channel: &str,
        identity: Arc<dyn SigningIdentity>,
    ) -> ChannelResult<Arc<ChannelTopology>>;

    /// Create a new channel from a configuration transaction, join every
    /// configured peer to it and return the initialized topology.
    async fn create_channel(
        &self,
        config: &NetworkConfig,
        channel: &str,
        configuration: ChannelConfiguration,
        identity: Arc<dyn SigningIdentity>,
    ) -> ChannelResult<Arc<ChannelTopology>>;

    /// Endorse, order and track a state-changing transaction.
    ///
    /// Returns once the transaction is submitted; the receipt's commit handle
    /// resolves when the ledger decides.
    async fn submit_transaction(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        request: ProposalRequest,
    ) -> ChannelResult<SubmitReceipt>;

    /// Evaluate a read-only request. `None` when no peer returned a verified
    /// successful answer.
    async fn query_chaincode(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        request: ProposalRequest,
    ) -> ChannelResult<Option<QueryPayload>>;

    /// Install chaincode on every peer of the topology, or of a freshly
    /// assembled one for the default channel.
    async fn install_chaincode(
        &self,
        topology: Option<Arc<ChannelTopology>>,
        identity: Arc<dyn SigningIdentity>,
        chaincode: ChaincodeIdentity,
        source: PathBuf,
    ) -> ChannelResult<InstallReport>;

    /// Instantiate installed chaincode with an endorsement policy.
    async fn instantiate_chaincode(
        &self,
        topology: Option<Arc<ChannelTopology>>,
        identity: Arc<dyn SigningIdentity>,
        chaincode: ChaincodeIdentity,
        policy: EndorsementPolicy,
        init_args: Vec<String>,
    ) -> ChannelResult<SubmitReceipt>;
}
