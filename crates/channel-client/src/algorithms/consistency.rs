//! # Consistency Evaluation
//!
//! Classify a round of proposal responses and group the successful ones by
//! the digest of their simulated read/write set. Peers that simulated the
//! same effects land in the same consistency set.

use crate::domain::{
    ConsistencySet, ConsistencyVerdict, Evaluation, ProposalKind, ProposalResponse,
};
use std::collections::HashMap;
use tracing::warn;

/// Whether a response counts as successful for the given proposal kind.
pub fn accepts(kind: &ProposalKind, response: &ProposalResponse) -> bool {
    response.is_success() && (!kind.requires_verification() || response.verified)
}

/// Evaluate a round of responses.
///
/// Sets are ordered largest first; equal sizes are ordered by their lowest
/// peer id, so the chosen set never depends on response arrival order.
pub fn evaluate(responses: Vec<ProposalResponse>, kind: &ProposalKind) -> Evaluation {
    let total = responses.len();
    let (mut successful, failed): (Vec<_>, Vec<_>) =
        responses.into_iter().partition(|r| accepts(kind, r));
    successful.sort_by_key(|r| r.peer);

    let mut index: HashMap<[u8; 32], usize> = HashMap::new();
    let mut consistency_sets: Vec<ConsistencySet> = Vec::new();
    for response in &successful {
        match index.get(&response.effect_digest) {
            Some(&i) => consistency_sets[i].responses.push(response.clone()),
            None => {
                index.insert(response.effect_digest, consistency_sets.len());
                consistency_sets.push(ConsistencySet {
                    digest: response.effect_digest,
                    responses: vec![response.clone()],
                });
            }
        }
    }
    consistency_sets.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.first_peer().cmp(&b.first_peer()))
    });

    let verdict = match consistency_sets.len() {
        0 => ConsistencyVerdict::NoConsistentResponse,
        1 => ConsistencyVerdict::Consistent,
        sets => {
            warn!(
                kind = kind.label(),
                sets,
                chosen = consistency_sets[0].len(),
                chosen_peers = ?consistency_sets[0].peer_names(),
                "Expected one set of consistent proposal responses, endorsers disagree"
            );
            ConsistencyVerdict::Ambiguous { sets }
        }
    };

    Evaluation {
        total,
        successful,
        failed,
        consistency_sets,
        verdict,
    }
}
