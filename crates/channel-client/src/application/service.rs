//! # Channel Client Service
//!
//! Wires the broadcaster, submitter, query executor and lifecycle
//! orchestrator behind `ChannelClientApi`.

use super::broadcaster::ProposalBroadcaster;
use super::lifecycle::LifecycleOrchestrator;
use super::query::{QueryExecutor, QueryPayload};
use super::submitter::{CommitSubmitter, SubmitReceipt};
use super::topology::ChannelTopology;
use crate::config::{ChannelClientConfig, NetworkConfig};
use crate::domain::{
    ChannelConfiguration, ChannelError, ChannelResult, EndorsementPolicy, InstallReport,
    ProposalKind, ProposalRequest,
};
use crate::ports::inbound::ChannelClientApi;
use crate::ports::outbound::{EndorsementVerifier, NetworkConnector, SigningIdentity};
use async_trait::async_trait;
use shared_types::ChaincodeIdentity;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Dependencies for the channel client service.
pub struct ChannelClientDependencies {
    pub connector: Arc<dyn NetworkConnector>,
    pub verifier: Arc<dyn EndorsementVerifier>,
    pub network: NetworkConfig,
    pub config: ChannelClientConfig,
}

pub struct ChannelClientService {
    connector: Arc<dyn NetworkConnector>,
    network: NetworkConfig,
    config: ChannelClientConfig,
    submitter: CommitSubmitter,
    query: QueryExecutor,
    lifecycle: LifecycleOrchestrator,
}

impl ChannelClientService {
    pub fn new(deps: ChannelClientDependencies) -> ChannelResult<Self> {
        deps.config.validate()?;
        deps.network.validate()?;

        let broadcaster = Arc::new(ProposalBroadcaster::new(deps.verifier));
        Ok(Self {
            submitter: CommitSubmitter::new(broadcaster.clone(), deps.config.consistency_policy),
            query: QueryExecutor::new(broadcaster.clone()),
            lifecycle: LifecycleOrchestrator::new(broadcaster, deps.config.lifecycle_wait()),
            connector: deps.connector,
            network: deps.network,
            config: deps.config,
        })
    }

    pub fn config(&self) -> &ChannelClientConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    async fn assemble_initialized(
        &self,
        network: &NetworkConfig,
        channel: &str,
        identity: Arc<dyn SigningIdentity>,
    ) -> ChannelResult<ChannelTopology> {
        let mut topology = ChannelTopology::assemble(
            network,
            channel,
            identity,
            self.connector.as_ref(),
            &self.config,
        )
        .await?;
        topology.initialize().await?;
        Ok(topology)
    }

    /// Assemble and initialize a channel, then check that every peer has
    /// the chaincode installed and instantiated.
    pub async fn connect_channel(
        &self,
        channel: &str,
        identity: Arc<dyn SigningIdentity>,
        chaincode: &ChaincodeIdentity,
    ) -> ChannelResult<Arc<ChannelTopology>> {
        let topology = self
            .assemble_initialized(&self.network, channel, identity)
            .await?;
        if let Some(peer) = topology.missing_deployment(chaincode).await {
            return Err(ChannelError::ChaincodeNotDeployed {
                chaincode: chaincode.to_string(),
                peer,
            });
        }
        info!(channel = %channel, chaincode = %chaincode, "Channel connected");
        Ok(Arc::new(topology))
    }

    /// Use the given topology or build one for the default channel.
    async fn topology_or_default(
        &self,
        topology: Option<Arc<ChannelTopology>>,
        identity: &Arc<dyn SigningIdentity>,
    ) -> ChannelResult<Arc<ChannelTopology>> {
        match topology {
            Some(topology) => Ok(topology),
            None => {
                info!(channel = %self.network.channel, "No topology given, assembling default channel");
                let topology = self
                    .assemble_initialized(&self.network, &self.network.channel, identity.clone())
                    .await?;
                Ok(Arc::new(topology))
            }
        }
    }
}

#[async_trait]
impl ChannelClientApi for ChannelClientService {
    async fn assemble_channel(
        &self,
        config: &NetworkConfig,
        channel: &str,
        identity: Arc<dyn SigningIdentity>,
    ) -> ChannelResult<Arc<ChannelTopology>> {
        let topology = self.assemble_initialized(config, channel, identity).await?;
        Ok(Arc::new(topology))
    }

    async fn create_channel(
        &self,
        config: &NetworkConfig,
        channel: &str,
        configuration: ChannelConfiguration,
        identity: Arc<dyn SigningIdentity>,
    ) -> ChannelResult<Arc<ChannelTopology>> {
        let topology = ChannelTopology::create(
            config,
            channel,
            &configuration,
            identity,
            self.connector.as_ref(),
            &self.config,
        )
        .await?;
        Ok(Arc::new(topology))
    }

    async fn submit_transaction(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        request: ProposalRequest,
    ) -> ChannelResult<SubmitReceipt> {
        if request.kind != ProposalKind::Invoke {
            return Err(ChannelError::InvalidRequest(format!(
                "{} proposals cannot be submitted as transactions",
                request.kind.label()
            )));
        }
        self.submitter
            .propose_and_submit(topology, identity, request, topology.proposal_wait())
            .await
    }

    async fn query_chaincode(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        request: ProposalRequest,
    ) -> ChannelResult<Option<QueryPayload>> {
        self.query
            .query(topology, identity, request, topology.proposal_wait())
            .await
    }

    async fn install_chaincode(
        &self,
        topology: Option<Arc<ChannelTopology>>,
        identity: Arc<dyn SigningIdentity>,
        chaincode: ChaincodeIdentity,
        source: PathBuf,
    ) -> ChannelResult<InstallReport> {
        let topology = self.topology_or_default(topology, &identity).await?;
        self.lifecycle
            .install(&topology, identity.as_ref(), chaincode, source)
            .await
    }

    async fn instantiate_chaincode(
        &self,
        topology: Option<Arc<ChannelTopology>>,
        identity: Arc<dyn SigningIdentity>,
        chaincode: ChaincodeIdentity,
        policy: EndorsementPolicy,
        init_args: Vec<String>,
    ) -> ChannelResult<SubmitReceipt> {
        let topology = self.topology_or_default(topology, &identity).await?;
        self.lifecycle
            .instantiate(
                &self.submitter,
                &topology,
                identity.as_ref(),
                chaincode,
                policy,
                init_args,
            )
            .await
    }
}
