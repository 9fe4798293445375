//! # Proposals and Endorsements
//!
//! A proposal is a signed request asking peers to simulate a chaincode
//! function. Each peer answers with an endorsement carrying the simulated
//! read/write set; the client reduces those into `ProposalResponse`s keyed
//! by the responding peer.

use super::errors::{ChannelError, ChannelResult};
use super::ids::PeerId;
use super::policy::EndorsementPolicy;
use crate::ports::outbound::SigningIdentity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{ChaincodeIdentity, Hash, TxId};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Chaincode function invoked by an instantiation proposal.
pub const INIT_FUNCTION: &str = "init";

/// Chaincode function invoked by default for transactions and queries.
pub const INVOKE_FUNCTION: &str = "invoke";

// =============================================================================
// READ/WRITE SETS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyVersion {
    pub block_num: u64,
    pub tx_num: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KvRead {
    pub key: String,
    /// `None` when the key did not exist at simulation time.
    pub version: Option<KeyVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRwSet {
    pub namespace: String,
    pub reads: Vec<KvRead>,
    pub writes: Vec<KvWrite>,
}

/// Simulated reads and writes of one proposal, per chaincode namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWriteSet {
    pub namespaces: Vec<NamespaceRwSet>,
}

impl ReadWriteSet {
    /// Single-namespace set built from `(key, value)` writes.
    pub fn with_writes<K, V>(namespace: &str, writes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            namespaces: vec![NamespaceRwSet {
                namespace: namespace.to_string(),
                reads: Vec::new(),
                writes: writes
                    .into_iter()
                    .map(|(key, value)| KvWrite {
                        key: key.into(),
                        value: value.into(),
                        is_delete: false,
                    })
                    .collect(),
            }],
        }
    }

    /// Copy with namespaces, reads and writes sorted.
    ///
    /// Peers may report entries in any order; two sets describing the same
    /// effects have the same canonical form.
    pub fn canonical(&self) -> Self {
        let mut namespaces = self.namespaces.clone();
        for ns in &mut namespaces {
            ns.reads.sort();
            ns.writes.sort();
        }
        namespaces.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        Self { namespaces }
    }

    /// SHA-256 over the bincode encoding of the canonical form.
    pub fn digest(&self) -> ChannelResult<Hash> {
        let bytes = bincode::serialize(&self.canonical())?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces
            .iter()
            .all(|ns| ns.reads.is_empty() && ns.writes.is_empty())
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// What a proposal asks the peers to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalKind {
    Invoke,
    Query,
    Install { source: PathBuf },
    Instantiate { policy: EndorsementPolicy },
}

impl ProposalKind {
    /// Reads and instantiations only accept responses whose endorsement
    /// signature verified.
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::Query | Self::Instantiate { .. })
    }

    /// Whether this kind goes through ordering and commit.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Invoke | Self::Instantiate { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Invoke => "invoke",
            Self::Query => "query",
            Self::Install { .. } => "install",
            Self::Instantiate { .. } => "instantiate",
        }
    }
}

/// Caller's description of a proposal before it is bound to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    pub kind: ProposalKind,
    pub chaincode: ChaincodeIdentity,
    pub function: String,
    pub args: Vec<String>,
    /// Private inputs; passed to the chaincode but never written to the ledger.
    pub transient: BTreeMap<String, Vec<u8>>,
    /// Per-peer wait budget. Falls back to the client configuration.
    pub wait_time: Option<Duration>,
}

impl ProposalRequest {
    fn new(kind: ProposalKind, chaincode: ChaincodeIdentity, function: &str, args: Vec<String>) -> Self {
        Self {
            kind,
            chaincode,
            function: function.to_string(),
            args,
            transient: BTreeMap::new(),
            wait_time: None,
        }
    }

    pub fn invoke(chaincode: ChaincodeIdentity, args: Vec<String>) -> Self {
        Self::new(ProposalKind::Invoke, chaincode, INVOKE_FUNCTION, args)
    }

    pub fn query(chaincode: ChaincodeIdentity, args: Vec<String>) -> Self {
        Self::new(ProposalKind::Query, chaincode, INVOKE_FUNCTION, args)
    }

    pub fn install(chaincode: ChaincodeIdentity, source: PathBuf) -> Self {
        Self::new(ProposalKind::Install { source }, chaincode, "", Vec::new())
    }

    pub fn instantiate(
        chaincode: ChaincodeIdentity,
        policy: EndorsementPolicy,
        args: Vec<String>,
    ) -> Self {
        Self::new(
            ProposalKind::Instantiate { policy },
            chaincode,
            INIT_FUNCTION,
            args,
        )
    }

    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    #[must_use]
    pub fn with_transient(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.transient.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = Some(wait_time);
        self
    }
}

// =============================================================================
// PROPOSALS
// =============================================================================

/// Derive a transaction id from the proposal nonce and creator bytes.
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> TxId {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    TxId::from_digest(&hasher.finalize().into())
}

/// A request bound to a channel and a creator, with a fresh transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub tx_id: TxId,
    pub channel: String,
    pub msp_id: String,
    pub creator: Vec<u8>,
    pub nonce: [u8; 24],
    pub timestamp_ms: u64,
    pub kind: ProposalKind,
    pub chaincode: ChaincodeIdentity,
    pub function: String,
    pub args: Vec<String>,
    pub transient: BTreeMap<String, Vec<u8>>,
    pub wait_time: Duration,
}

impl Proposal {
    pub fn new(
        channel: &str,
        identity: &dyn SigningIdentity,
        request: ProposalRequest,
        default_wait: Duration,
    ) -> Self {
        let nonce: [u8; 24] = rand::random();
        let creator = identity.creator().to_vec();
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            tx_id: compute_tx_id(&nonce, &creator),
            channel: channel.to_string(),
            msp_id: identity.msp_id().to_string(),
            creator,
            nonce,
            timestamp_ms,
            wait_time: request.wait_time.unwrap_or(default_wait),
            kind: request.kind,
            chaincode: request.chaincode,
            function: request.function,
            args: request.args,
            transient: request.transient,
        }
    }
}

/// A proposal with its canonical bytes and the creator's signature over them.
#[derive(Debug, Clone)]
pub struct SignedProposal {
    pub proposal: Proposal,
    pub bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedProposal {
    pub fn sign(proposal: Proposal, identity: &dyn SigningIdentity) -> ChannelResult<Self> {
        let bytes = bincode::serialize(&proposal)?;
        let signature = identity.sign(&bytes).map_err(ChannelError::Signing)?;
        Ok(Self {
            proposal,
            bytes,
            signature,
        })
    }

    pub fn tx_id(&self) -> &TxId {
        &self.proposal.tx_id
    }

    pub fn wait_time(&self) -> Duration {
        self.proposal.wait_time
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Success,
    Failure,
}

/// What a peer sends back for a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endorsement {
    pub status: ProposalStatus,
    pub message: String,
    pub payload: Vec<u8>,
    pub rwset: ReadWriteSet,
    /// Serialized identity of the endorsing peer.
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Endorsement {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ProposalStatus::Failure,
            message: message.into(),
            payload: Vec::new(),
            rwset: ReadWriteSet::default(),
            endorser: Vec::new(),
            signature: Vec::new(),
        }
    }
}

/// One peer's answer to a proposal, as seen by the client.
#[derive(Debug, Clone)]
pub struct ProposalResponse {
    pub peer: PeerId,
    pub peer_name: String,
    pub tx_id: TxId,
    pub status: ProposalStatus,
    pub verified: bool,
    pub message: String,
    pub payload: Vec<u8>,
    pub rwset: ReadWriteSet,
    pub effect_digest: Hash,
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ProposalResponse {
    pub fn from_endorsement(
        peer: PeerId,
        peer_name: &str,
        tx_id: &TxId,
        endorsement: Endorsement,
        verified: bool,
    ) -> ChannelResult<Self> {
        let effect_digest = endorsement.rwset.digest()?;
        Ok(Self {
            peer,
            peer_name: peer_name.to_string(),
            tx_id: tx_id.clone(),
            status: endorsement.status,
            verified,
            message: endorsement.message,
            payload: endorsement.payload,
            rwset: endorsement.rwset,
            effect_digest,
            endorser: endorsement.endorser,
            signature: endorsement.signature,
        })
    }

    /// Failed response standing in for a peer that never answered.
    pub fn synthetic_failure(peer: PeerId, peer_name: &str, tx_id: &TxId, reason: String) -> Self {
        Self {
            peer,
            peer_name: peer_name.to_string(),
            tx_id: tx_id.clone(),
            status: ProposalStatus::Failure,
            verified: false,
            message: reason,
            payload: Vec::new(),
            rwset: ReadWriteSet::default(),
            effect_digest: [0; 32],
            endorser: Vec::new(),
            signature: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProposalStatus::Success
    }
}
