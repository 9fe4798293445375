//! Keyed-digest signing identity for tests and local networks.

use crate::ports::outbound::SigningIdentity;
use sha2::{Digest, Sha256};

/// Signs with SHA-256 over a key derived from the identity name.
///
/// Not a real signature scheme.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    msp_id: String,
    creator: Vec<u8>,
    key: [u8; 32],
}

impl StaticIdentity {
    pub fn new(msp_id: impl Into<String>, name: &str) -> Self {
        let msp_id = msp_id.into();
        let creator = format!("{msp_id}:{name}").into_bytes();
        let key: [u8; 32] = Sha256::digest(&creator).into();
        Self {
            msp_id,
            creator,
            key,
        }
    }
}

impl SigningIdentity for StaticIdentity {
    fn msp_id(&self) -> &str {
        &self.msp_id
    }

    fn creator(&self) -> &[u8] {
        &self.creator
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, String> {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(payload);
        Ok(hasher.finalize().to_vec())
    }
}
