//! Result types of endorsement evaluation.

use super::errors::{ChannelError, ChannelResult};
use super::ids::PeerId;
use super::proposal::ProposalResponse;
use crate::config::ConsistencyPolicy;
use shared_types::Hash;

/// Successful responses that agree on the same read/write set digest.
#[derive(Debug, Clone)]
pub struct ConsistencySet {
    pub digest: Hash,
    /// Ordered by peer id.
    pub responses: Vec<ProposalResponse>,
}

impl ConsistencySet {
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Lowest peer id in the set, used to break ties between equal sizes.
    pub fn first_peer(&self) -> Option<PeerId> {
        self.responses.first().map(|r| r.peer)
    }

    pub fn peer_names(&self) -> Vec<&str> {
        self.responses.iter().map(|r| r.peer_name.as_str()).collect()
    }

    /// Response payload shared by the set.
    pub fn payload(&self) -> &[u8] {
        self.responses
            .first()
            .map(|r| r.payload.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyVerdict {
    /// Exactly one consistency set.
    Consistent,
    /// Endorsers disagreed; the largest set was chosen.
    Ambiguous { sets: usize },
    /// No acceptable response at all.
    NoConsistentResponse,
}

/// Outcome of classifying and grouping a round of proposal responses.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub total: usize,
    pub successful: Vec<ProposalResponse>,
    pub failed: Vec<ProposalResponse>,
    /// Largest first, ties broken by lowest peer id.
    pub consistency_sets: Vec<ConsistencySet>,
    pub verdict: ConsistencyVerdict,
}

/// Counts reported back to callers alongside a commit handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndorsementSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub consistency_sets: usize,
    pub chosen: usize,
    pub verdict: ConsistencyVerdict,
}

impl Evaluation {
    pub fn chosen(&self) -> Option<&ConsistencySet> {
        self.consistency_sets.first()
    }

    pub fn summary(&self) -> EndorsementSummary {
        EndorsementSummary {
            total: self.total,
            successful: self.successful.len(),
            failed: self.failed.len(),
            consistency_sets: self.consistency_sets.len(),
            chosen: self.chosen().map_or(0, ConsistencySet::len),
            verdict: self.verdict,
        }
    }

    /// Take the set to submit, applying the consistency policy.
    pub fn into_endorsed(
        mut self,
        policy: ConsistencyPolicy,
    ) -> ChannelResult<(ConsistencySet, EndorsementSummary)> {
        let summary = self.summary();
        match self.verdict {
            ConsistencyVerdict::NoConsistentResponse => Err(ChannelError::NoConsistentResponse {
                total: self.total,
                failed: self.failed.len(),
            }),
            ConsistencyVerdict::Ambiguous { sets } if policy == ConsistencyPolicy::Strict => {
                Err(ChannelError::AmbiguousConsistency { sets })
            }
            _ => {
                if self.consistency_sets.is_empty() {
                    return Err(ChannelError::NoConsistentResponse {
                        total: self.total,
                        failed: self.failed.len(),
                    });
                }
                Ok((self.consistency_sets.swap_remove(0), summary))
            }
        }
    }
}
