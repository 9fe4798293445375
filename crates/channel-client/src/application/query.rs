//! # Query Executor
//!
//! Read-only evaluation. The first successful, verified response wins; a
//! query nobody could answer is `None`, not an error.

use super::broadcaster::ProposalBroadcaster;
use super::topology::ChannelTopology;
use crate::algorithms::accepts;
use crate::domain::{ChannelResult, Proposal, ProposalKind, ProposalRequest, SignedProposal};
use crate::ports::outbound::SigningIdentity;
use futures::StreamExt;
use shared_types::TxId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPayload {
    pub tx_id: TxId,
    pub payload: Vec<u8>,
    /// Peer that answered.
    pub peer: String,
    pub elapsed: Duration,
}

impl QueryPayload {
    pub fn as_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

pub struct QueryExecutor {
    broadcaster: Arc<ProposalBroadcaster>,
}

impl QueryExecutor {
    pub fn new(broadcaster: Arc<ProposalBroadcaster>) -> Self {
        Self { broadcaster }
    }

    pub async fn query(
        &self,
        topology: &ChannelTopology,
        identity: &dyn SigningIdentity,
        mut request: ProposalRequest,
        default_wait: Duration,
    ) -> ChannelResult<Option<QueryPayload>> {
        request.kind = ProposalKind::Query;
        let proposal = Proposal::new(topology.name(), identity, request, default_wait);
        let signed = SignedProposal::sign(proposal, identity)?;
        let started = Instant::now();
        info!(
            channel = %topology.name(),
            tx_id = %signed.tx_id(),
            chaincode = %signed.proposal.chaincode,
            "Sending query proposal"
        );

        let targets = topology.peer_ids();
        let mut responses = Box::pin(self.broadcaster.broadcast_unordered(topology, &signed, &targets));
        while let Some(response) = responses.next().await {
            if accepts(&ProposalKind::Query, &response) {
                let elapsed = started.elapsed();
                info!(
                    tx_id = %signed.tx_id(),
                    peer = %response.peer_name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Query answered"
                );
                return Ok(Some(QueryPayload {
                    tx_id: signed.tx_id().clone(),
                    payload: response.payload,
                    peer: response.peer_name,
                    elapsed,
                }));
            }
            error!(
                tx_id = %signed.tx_id(),
                peer = %response.peer_name,
                status = ?response.status,
                verified = response.verified,
                message = %response.message,
                "Failed query proposal"
            );
        }
        Ok(None)
    }
}
