//! Endorsement verification by digest tag.
//!
//! In-memory peers sign an endorsement with a SHA-256 tag binding the
//! endorser, the transaction id, the response payload and the read/write
//! set digest. Any change to one of them breaks the tag.

use crate::domain::{Endorsement, SignedProposal};
use crate::ports::outbound::EndorsementVerifier;
use sha2::{Digest, Sha256};
use shared_types::{Hash, TxId};

pub fn endorsement_tag(endorser: &[u8], tx_id: &TxId, payload: &[u8], digest: &Hash) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update((endorser.len() as u64).to_be_bytes());
    hasher.update(endorser);
    hasher.update(tx_id.as_str().as_bytes());
    hasher.update((payload.len() as u64).to_be_bytes());
    hasher.update(payload);
    hasher.update(digest);
    hasher.finalize().to_vec()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DigestTagVerifier;

impl EndorsementVerifier for DigestTagVerifier {
    fn verify(&self, proposal: &SignedProposal, endorsement: &Endorsement) -> bool {
        let Ok(digest) = endorsement.rwset.digest() else {
            return false;
        };
        let expected = endorsement_tag(
            &endorsement.endorser,
            proposal.tx_id(),
            &endorsement.payload,
            &digest,
        );
        !endorsement.signature.is_empty() && endorsement.signature == expected
    }
}
