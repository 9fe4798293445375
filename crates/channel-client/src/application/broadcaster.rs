//! # Proposal Broadcaster
//!
//! Sends one signed proposal to many peers at once. Every send is bounded
//! by the proposal's wait time and a peer that errors or stays silent
//! contributes a failed response instead of an error.

use super::topology::ChannelTopology;
use crate::domain::{PeerId, ProposalResponse, SignedProposal};
use crate::ports::outbound::EndorsementVerifier;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, Stream};
use std::sync::Arc;
use tracing::debug;

pub struct ProposalBroadcaster {
    verifier: Arc<dyn EndorsementVerifier>,
}

impl ProposalBroadcaster {
    pub fn new(verifier: Arc<dyn EndorsementVerifier>) -> Self {
        Self { verifier }
    }

    /// Send to every target and collect responses in target order.
    pub async fn broadcast(
        &self,
        topology: &ChannelTopology,
        proposal: &SignedProposal,
        targets: &[PeerId],
    ) -> Vec<ProposalResponse> {
        join_all(
            targets
                .iter()
                .map(|&peer| self.send_one(topology, proposal, peer)),
        )
        .await
    }

    /// Send to every target and yield responses as they complete.
    pub fn broadcast_unordered<'a>(
        &'a self,
        topology: &'a ChannelTopology,
        proposal: &'a SignedProposal,
        targets: &[PeerId],
    ) -> impl Stream<Item = ProposalResponse> + 'a {
        targets
            .iter()
            .map(|&peer| self.send_one(topology, proposal, peer))
            .collect::<FuturesUnordered<_>>()
    }

    async fn send_one(
        &self,
        topology: &ChannelTopology,
        proposal: &SignedProposal,
        peer: PeerId,
    ) -> ProposalResponse {
        let tx_id = proposal.tx_id();
        let name = topology.peer_name(peer).unwrap_or("unknown");
        let Some(connection) = topology.peer_connection(peer) else {
            return ProposalResponse::synthetic_failure(
                peer,
                name,
                tx_id,
                format!("{peer} is not bound to channel {}", topology.name()),
            );
        };

        let wait = proposal.wait_time();
        match tokio::time::timeout(wait, connection.process_proposal(proposal)).await {
            Ok(Ok(endorsement)) => {
                let verified = self.verifier.verify(proposal, &endorsement);
                debug!(
                    tx_id = %tx_id,
                    peer = %name,
                    status = ?endorsement.status,
                    verified,
                    "Proposal response received"
                );
                ProposalResponse::from_endorsement(peer, name, tx_id, endorsement, verified)
                    .unwrap_or_else(|e| {
                        ProposalResponse::synthetic_failure(peer, name, tx_id, e.to_string())
                    })
            }
            Ok(Err(e)) => {
                debug!(tx_id = %tx_id, peer = %name, error = %e, "Proposal send failed");
                ProposalResponse::synthetic_failure(peer, name, tx_id, e.to_string())
            }
            Err(_) => {
                debug!(tx_id = %tx_id, peer = %name, wait_ms = wait.as_millis() as u64, "Proposal timed out");
                ProposalResponse::synthetic_failure(
                    peer,
                    name,
                    tx_id,
                    format!("no response within {wait:?}"),
                )
            }
        }
    }
}
