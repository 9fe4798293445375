//! The commit request sent to ordering nodes.

use super::consistency::ConsistencySet;
use super::errors::{ChannelError, ChannelResult};
use super::proposal::SignedProposal;
use crate::ports::outbound::SigningIdentity;
use serde::{Deserialize, Serialize};
use shared_types::{Hash, TxId};

/// One endorser's contribution to an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementRef {
    pub peer: String,
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx_id: TxId,
    pub channel: String,
    pub proposal: Vec<u8>,
    pub payload: Vec<u8>,
    pub effect_digest: Hash,
    pub endorsements: Vec<EndorsementRef>,
    /// Submitter's signature over the envelope body.
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct EnvelopeBody<'a> {
    tx_id: &'a TxId,
    channel: &'a str,
    proposal: &'a [u8],
    payload: &'a [u8],
    effect_digest: &'a Hash,
    endorsements: &'a [EndorsementRef],
}

impl TransactionEnvelope {
    /// Build and sign an envelope from the chosen consistency set only.
    pub fn assemble(
        proposal: &SignedProposal,
        endorsed: &ConsistencySet,
        identity: &dyn SigningIdentity,
    ) -> ChannelResult<Self> {
        let endorsements: Vec<EndorsementRef> = endorsed
            .responses
            .iter()
            .map(|r| EndorsementRef {
                peer: r.peer_name.clone(),
                endorser: r.endorser.clone(),
                signature: r.signature.clone(),
            })
            .collect();

        let body = EnvelopeBody {
            tx_id: proposal.tx_id(),
            channel: &proposal.proposal.channel,
            proposal: &proposal.bytes,
            payload: endorsed.payload(),
            effect_digest: &endorsed.digest,
            endorsements: &endorsements,
        };
        let signature = identity
            .sign(&bincode::serialize(&body)?)
            .map_err(ChannelError::Signing)?;

        Ok(Self {
            tx_id: proposal.tx_id().clone(),
            channel: proposal.proposal.channel.clone(),
            proposal: proposal.bytes.clone(),
            payload: endorsed.payload().to_vec(),
            effect_digest: endorsed.digest,
            endorsements,
            signature,
        })
    }
}

/// An ordering node's answer to a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastAck {
    Accepted,
    Rejected { reason: String },
}

impl BroadcastAck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
