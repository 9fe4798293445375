//! # Error Types
//!
//! Errors raised while constructing shared value types.

use thiserror::Error;

/// Errors produced when parsing or building shared types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Transaction id is not 64 lowercase hex characters.
    #[error("Invalid transaction id: {0}")]
    InvalidTxId(String),

    /// Chaincode identity has an empty component.
    #[error("Invalid chaincode identity: {field} is empty")]
    EmptyChaincodeField { field: &'static str },
}
