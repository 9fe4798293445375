//! # Transaction Lifecycle
//!
//! ```text
//! PROPOSED -> ENDORSED -> SUBMITTED -> { COMMITTED | REJECTED | TIMED_OUT }
//! ```
//!
//! Endorsement failure ends the lifecycle at PROPOSED with an error; the
//! three terminal states are reached only through a commit handle.

use super::errors::{ChannelError, ChannelResult};
use serde::{Deserialize, Serialize};
use shared_types::TxId;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Proposed,
    Endorsed,
    Submitted,
    Committed,
    Rejected,
    TimedOut,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected | Self::TimedOut)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Endorsed)
                | (Self::Endorsed, Self::Submitted)
                | (Self::Submitted, Self::Committed)
                | (Self::Submitted, Self::Rejected)
                | (Self::Submitted, Self::TimedOut)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Proposed => "PROPOSED",
            Self::Endorsed => "ENDORSED",
            Self::Submitted => "SUBMITTED",
            Self::Committed => "COMMITTED",
            Self::Rejected => "REJECTED",
            Self::TimedOut => "TIMED_OUT",
        };
        f.write_str(name)
    }
}

/// Tracks one transaction through the lifecycle, refusing illegal jumps.
#[derive(Debug, Clone)]
pub struct TxLifecycle {
    tx_id: TxId,
    state: TransactionState,
}

impl TxLifecycle {
    pub fn new(tx_id: TxId) -> Self {
        Self {
            tx_id,
            state: TransactionState::Proposed,
        }
    }

    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn advance(&mut self, next: TransactionState) -> ChannelResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ChannelError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Terminal status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitStatus {
    Committed,
    Rejected,
    TimedOut,
}

impl From<CommitStatus> for TransactionState {
    fn from(status: CommitStatus) -> Self {
        match status {
            CommitStatus::Committed => Self::Committed,
            CommitStatus::Rejected => Self::Rejected,
            CommitStatus::TimedOut => Self::TimedOut,
        }
    }
}

/// What a commit handle resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub tx_id: TxId,
    pub status: CommitStatus,
    /// Block that included the transaction, when one did.
    pub block_number: Option<u64>,
    pub reason: Option<String>,
    /// Time between registration and resolution.
    pub elapsed: Duration,
}

/// A transaction confirmed valid on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransaction {
    pub tx_id: TxId,
    pub block_number: u64,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        self.status == CommitStatus::Committed
    }

    /// Map the outcome to a result, turning rejections and timeouts into errors.
    pub fn into_result(self) -> ChannelResult<CommittedTransaction> {
        match (self.status, self.block_number) {
            (CommitStatus::Committed, Some(block_number)) => Ok(CommittedTransaction {
                tx_id: self.tx_id,
                block_number,
            }),
            (CommitStatus::TimedOut, _) => Err(ChannelError::CommitTimeout {
                tx_id: self.tx_id,
                waited: self.elapsed,
            }),
            _ => Err(ChannelError::CommitRejected {
                tx_id: self.tx_id,
                reason: self.reason.unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }
}
