//! Chaincode deployment results.

use shared_types::ChaincodeIdentity;

/// Per-peer tally of an install proposal. Installation is not committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub chaincode: ChaincodeIdentity,
    pub success_count: usize,
    pub fail_count: usize,
}

impl InstallReport {
    /// Every targeted peer installed the chaincode.
    pub fn is_complete(&self) -> bool {
        self.success_count > 0 && self.fail_count == 0
    }
}
