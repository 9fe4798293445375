//! # Commit Submitter
//!
//! Drives a state-changing proposal from PROPOSED to SUBMITTED: broadcast
//! to every peer, evaluate, build an envelope from the chosen consistency
//! set, register with the commit tracker and hand the envelope to every
//! ordering node.

use super::broadcaster::ProposalBroadcaster;
use super::topology::ChannelTopology;
use super::tracker::CommitHandle;
use crate::algorithms::evaluate;
use crate::config::ConsistencyPolicy;
use crate::domain::{
    BroadcastAck, ChannelError, ChannelResult, ConsistencySet, ConsistencyVerdict, EndorsementSummary,
    Proposal, ProposalRequest, SignedProposal, TransactionEnvelope, TransactionState, TxLifecycle,
};
use crate::ports::outbound::SigningIdentity;
use futures::future::join_all;
use shared_types::TxId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned once a transaction is handed to ordering.
#[derive(Debug)]
pub struct SubmitReceipt {
    pub tx_id: TxId,
    pub endorsement: EndorsementSummary,
    /// Always `Submitted`; later states arrive through `commit`.
    pub state: TransactionState,
    pub commit: CommitHandle,
}

pub struct CommitSubmitter {
    broadcaster: Arc<ProposalBroadcaster>,
    policy: ConsistencyPolicy,
}

impl CommitSubmitter {
    pub fn new(broadcaster: Arc<ProposalBroadcaster>, policy: ConsistencyPolicy) -> Self {
        Self {
            broadcaster,
            policy,
        }
    }

    /// Endorse a request on every bound peer and submit the result.
    pub async fn propose_and_submit(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        request: ProposalRequest,
        default_wait: Duration,
    ) -> ChannelResult<SubmitReceipt> {
        if !request.kind.is_committed() {
            return Err(ChannelError::InvalidRequest(format!(
                "{} proposals are not ordered",
                request.kind.label()
            )));
        }
        // Fail before any network traffic if the channel cannot track commits.
        topology.tracker()?;

        let kind = request.kind.clone();
        let proposal = Proposal::new(topology.name(), identity, request, default_wait);
        let signed = SignedProposal::sign(proposal, identity)?;
        let mut lifecycle = TxLifecycle::new(signed.tx_id().clone());
        info!(
            channel = %topology.name(),
            tx_id = %signed.tx_id(),
            kind = kind.label(),
            chaincode = %signed.proposal.chaincode,
            "Sending transaction proposal"
        );

        let responses = self
            .broadcaster
            .broadcast(topology, &signed, &topology.peer_ids())
            .await;
        let evaluation = evaluate(responses, &kind);
        for failed in &evaluation.failed {
            warn!(
                tx_id = %signed.tx_id(),
                peer = %failed.peer_name,
                status = ?failed.status,
                verified = failed.verified,
                message = %failed.message,
                "Endorsement failed"
            );
        }
        info!(
            tx_id = %signed.tx_id(),
            successful = evaluation.successful.len(),
            failed = evaluation.failed.len(),
            "Received transaction proposal responses"
        );

        let (endorsed, summary) = evaluation.into_endorsed(self.policy)?;
        if let ConsistencyVerdict::Ambiguous { sets } = summary.verdict {
            warn!(
                tx_id = %signed.tx_id(),
                sets,
                chosen = summary.chosen,
                "Submitting the largest of several divergent endorsement sets"
            );
        }
        lifecycle.advance(TransactionState::Endorsed)?;

        let commit = self
            .submit(topology, identity, &signed, &endorsed, &mut lifecycle)
            .await?;
        Ok(SubmitReceipt {
            tx_id: lifecycle.tx_id().clone(),
            endorsement: summary,
            state: lifecycle.state(),
            commit,
        })
    }

    /// Hand an endorsed transaction to every ordering node.
    ///
    /// The commit handle is registered before any broadcast. If no ordering
    /// node accepts, it resolves as rejected.
    pub async fn submit(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        proposal: &SignedProposal,
        endorsed: &ConsistencySet,
        lifecycle: &mut TxLifecycle,
    ) -> ChannelResult<CommitHandle> {
        let tracker = topology.tracker()?;
        let envelope = TransactionEnvelope::assemble(proposal, endorsed, identity)?;
        lifecycle.advance(TransactionState::Submitted)?;
        let handle = tracker.register(envelope.tx_id.clone());

        let acks = join_all(topology.orderers().iter().filter_map(|entry| {
            let connection = topology.orderer_connection(entry.id)?;
            let envelope = &envelope;
            Some(async move { (entry, connection.broadcast(envelope).await) })
        }))
        .await;

        let mut accepted = 0usize;
        let mut reasons = Vec::new();
        for (entry, ack) in acks {
            match ack {
                Ok(BroadcastAck::Accepted) => {
                    debug!(tx_id = %envelope.tx_id, orderer = %entry.name, "Envelope accepted");
                    accepted += 1;
                }
                Ok(BroadcastAck::Rejected { reason }) => {
                    warn!(tx_id = %envelope.tx_id, orderer = %entry.name, reason = %reason, "Envelope rejected");
                    reasons.push(format!("{}: {reason}", entry.name));
                }
                Err(e) => {
                    warn!(tx_id = %envelope.tx_id, orderer = %entry.name, error = %e, "Envelope broadcast failed");
                    reasons.push(format!("{}: {e}", entry.name));
                }
            }
        }

        if accepted == 0 {
            let reason = if reasons.is_empty() {
                "no ordering nodes bound to channel".to_string()
            } else {
                reasons.join("; ")
            };
            tracker.reject(&envelope.tx_id, reason);
        } else {
            info!(
                channel = %topology.name(),
                tx_id = %envelope.tx_id,
                accepted,
                endorsers = endorsed.len(),
                "Transaction submitted to ordering"
            );
        }
        Ok(handle)
    }
}
