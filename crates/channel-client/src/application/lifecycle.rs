//! # Chaincode Lifecycle
//!
//! Installation places chaincode on peers and is never committed.
//! Instantiation runs the chaincode's `init` function under an endorsement
//! policy and goes through ordering like any transaction.

use super::broadcaster::ProposalBroadcaster;
use super::submitter::{CommitSubmitter, SubmitReceipt};
use super::topology::ChannelTopology;
use crate::algorithms::accepts;
use crate::domain::{
    ChannelResult, EndorsementPolicy, InstallReport, Proposal, ProposalRequest, SignedProposal,
};
use crate::ports::outbound::SigningIdentity;
use shared_types::ChaincodeIdentity;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Transient key marking an instantiation request.
pub const INSTANTIATE_TRANSIENT_KEY: &str = "method";

pub struct LifecycleOrchestrator {
    broadcaster: Arc<ProposalBroadcaster>,
    lifecycle_wait: Duration,
}

impl LifecycleOrchestrator {
    pub fn new(broadcaster: Arc<ProposalBroadcaster>, lifecycle_wait: Duration) -> Self {
        Self {
            broadcaster,
            lifecycle_wait,
        }
    }

    /// Send an install proposal to every bound peer and tally the answers.
    pub async fn install(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        chaincode: ChaincodeIdentity,
        source: PathBuf,
    ) -> ChannelResult<InstallReport> {
        info!(
            channel = %topology.name(),
            chaincode = %chaincode,
            source = %source.display(),
            peers = topology.peers().len(),
            "Installing chaincode"
        );
        let request = ProposalRequest::install(chaincode.clone(), source);
        let kind = request.kind.clone();
        let proposal = Proposal::new(topology.name(), identity, request, self.lifecycle_wait);
        let signed = SignedProposal::sign(proposal, identity)?;

        let responses = self
            .broadcaster
            .broadcast(topology, &signed, &topology.peer_ids())
            .await;

        let mut report = InstallReport {
            chaincode,
            success_count: 0,
            fail_count: 0,
        };
        for response in &responses {
            if accepts(&kind, response) {
                report.success_count += 1;
                info!(peer = %response.peer_name, chaincode = %report.chaincode, "Chaincode installed");
            } else {
                report.fail_count += 1;
                error!(
                    peer = %response.peer_name,
                    status = ?response.status,
                    message = %response.message,
                    "Chaincode install failed"
                );
            }
        }
        if report.fail_count > 0 {
            warn!(
                chaincode = %report.chaincode,
                success = report.success_count,
                failed = report.fail_count,
                "Not enough endorsers for install"
            );
        }
        Ok(report)
    }

    /// Endorse and submit an instantiation.
    pub async fn instantiate(
        &self,
        submitter: &CommitSubmitter,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        chaincode: ChaincodeIdentity,
        policy: EndorsementPolicy,
        init_args: Vec<String>,
    ) -> ChannelResult<SubmitReceipt> {
        policy.validate()?;
        info!(
            channel = %topology.name(),
            chaincode = %chaincode,
            identities = policy.identities.len(),
            "Instantiating chaincode"
        );
        let request = ProposalRequest::instantiate(chaincode, policy, init_args)
            .with_transient(INSTANTIATE_TRANSIENT_KEY, b"InstantiateProposalRequest".to_vec());
        submitter
            .propose_and_submit(topology, identity, request, self.lifecycle_wait)
            .await
    }
}
