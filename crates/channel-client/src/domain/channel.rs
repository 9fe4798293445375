//! Channel creation.
//!
//! A channel is created from a configuration transaction produced out of
//! band. The submitter's signature over it authorizes the creation; the
//! ordering service answers with the channel's genesis block.

use super::errors::{ChannelError, ChannelResult};
use crate::ports::outbound::SigningIdentity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opaque channel configuration transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfiguration {
    bytes: Vec<u8>,
}

impl ChannelConfiguration {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn from_file(path: &Path) -> ChannelResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            ChannelError::InvalidRequest(format!(
                "cannot read channel configuration {}: {e}",
                path.display()
            ))
        })?;
        if bytes.is_empty() {
            return Err(ChannelError::InvalidRequest(format!(
                "channel configuration {} is empty",
                path.display()
            )));
        }
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSignature {
    pub msp_id: String,
    pub creator: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct SignedConfig<'a> {
    channel: &'a str,
    configuration: &'a [u8],
}

/// What is sent to an ordering node to create a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCreateRequest {
    pub channel: String,
    pub configuration: Vec<u8>,
    pub signatures: Vec<ConfigSignature>,
}

impl ChannelCreateRequest {
    pub fn sign(
        channel: &str,
        configuration: &ChannelConfiguration,
        identity: &dyn SigningIdentity,
    ) -> ChannelResult<Self> {
        if channel.is_empty() {
            return Err(ChannelError::InvalidRequest("channel name is empty".into()));
        }
        let body = bincode::serialize(&SignedConfig {
            channel,
            configuration: configuration.as_bytes(),
        })?;
        let signature = identity.sign(&body).map_err(ChannelError::Signing)?;
        Ok(Self {
            channel: channel.to_string(),
            configuration: configuration.as_bytes().to_vec(),
            signatures: vec![ConfigSignature {
                msp_id: identity.msp_id().to_string(),
                creator: identity.creator().to_vec(),
                signature,
            }],
        })
    }
}
