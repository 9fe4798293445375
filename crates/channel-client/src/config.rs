//! # Configuration
//!
//! Two layers: `ChannelClientConfig` holds the client's wait budgets and
//! policies, `NetworkConfig` describes the nodes of one organization's view
//! of the network. Both are immutable once loaded.

use crate::domain::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-peer wait for transaction and query proposals.
pub const DEFAULT_PROPOSAL_WAIT_MS: u64 = 12_000;

/// Default per-peer wait for install and instantiate proposals.
pub const DEFAULT_LIFECYCLE_WAIT_MS: u64 = 120_000;

/// Default wait between submission and a commit event.
pub const DEFAULT_COMMIT_WAIT_MS: u64 = 120_000;

/// What to do when endorsers return more than one consistency set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyPolicy {
    /// Submit the largest set and report the disagreement.
    #[default]
    Majority,
    /// Fail with `AmbiguousConsistency`.
    Strict,
}

/// Client-side budgets and policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelClientConfig {
    pub proposal_wait_ms: u64,
    pub lifecycle_wait_ms: u64,
    pub commit_wait_ms: u64,
    pub consistency_policy: ConsistencyPolicy,
}

impl Default for ChannelClientConfig {
    fn default() -> Self {
        Self {
            proposal_wait_ms: DEFAULT_PROPOSAL_WAIT_MS,
            lifecycle_wait_ms: DEFAULT_LIFECYCLE_WAIT_MS,
            commit_wait_ms: DEFAULT_COMMIT_WAIT_MS,
            consistency_policy: ConsistencyPolicy::Majority,
        }
    }
}

impl ChannelClientConfig {
    /// Short budgets for tests.
    pub fn for_testing() -> Self {
        Self {
            proposal_wait_ms: 500,
            lifecycle_wait_ms: 1_000,
            commit_wait_ms: 2_000,
            consistency_policy: ConsistencyPolicy::Majority,
        }
    }

    /// Defaults overridden by `INVOKER_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("INVOKER_PROPOSAL_WAIT_MS") {
            config.proposal_wait_ms = ms;
        }
        if let Some(ms) = env_u64("INVOKER_LIFECYCLE_WAIT_MS") {
            config.lifecycle_wait_ms = ms;
        }
        if let Some(ms) = env_u64("INVOKER_COMMIT_WAIT_MS") {
            config.commit_wait_ms = ms;
        }
        if let Ok(v) = std::env::var("INVOKER_STRICT_CONSISTENCY") {
            if v.eq_ignore_ascii_case("true") || v == "1" {
                config.consistency_policy = ConsistencyPolicy::Strict;
            }
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("proposal_wait_ms", self.proposal_wait_ms),
            ("lifecycle_wait_ms", self.lifecycle_wait_ms),
            ("commit_wait_ms", self.commit_wait_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn proposal_wait(&self) -> Duration {
        Duration::from_millis(self.proposal_wait_ms)
    }

    pub fn lifecycle_wait(&self) -> Duration {
        Duration::from_millis(self.lifecycle_wait_ms)
    }

    pub fn commit_wait(&self) -> Duration {
        Duration::from_millis(self.commit_wait_ms)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

// =============================================================================
// NETWORK
// =============================================================================

/// TLS material for a node connection. Paths are handed to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsMaterial {
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub hostname_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub tls: Option<TlsMaterial>,
    /// Transport-specific settings such as keepalive intervals.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            tls: None,
            properties: BTreeMap::new(),
        }
    }
}

/// One organization's view of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// MSP id of the organization.
    pub organization: String,
    /// Channel used when an operation is not given a topology.
    pub channel: String,
    pub orderers: Vec<NodeConfig>,
    pub peers: Vec<NodeConfig>,
    #[serde(default)]
    pub event_sources: Vec<NodeConfig>,
}

impl NetworkConfig {
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "organization",
            });
        }
        if self.channel.is_empty() {
            return Err(ConfigError::EmptyField { field: "channel" });
        }
        validate_nodes("orderer", &self.orderers)?;
        validate_nodes("peer", &self.peers)?;
        validate_nodes("event source", &self.event_sources)
    }
}

fn validate_nodes(role: &'static str, nodes: &[NodeConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for node in nodes {
        if node.name.is_empty() {
            return Err(ConfigError::EmptyField { field: "name" });
        }
        if node.url.is_empty() {
            return Err(ConfigError::EmptyUrl {
                node: node.name.clone(),
            });
        }
        if !seen.insert(node.name.as_str()) {
            return Err(ConfigError::DuplicateNode {
                role,
                name: node.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK_YAML: &str = r#"
organization: Org1MSP
channel: mychannel
orderers:
  - name: orderer0
    url: grpcs://orderer0.example.com:7050
    tls:
      ca_cert: /etc/tls/orderer-ca.pem
    properties:
      keepalive_ms: "300000"
peers:
  - name: peer0
    url: grpcs://peer0.org1.example.com:7051
  - name: peer1
    url: grpcs://peer1.org1.example.com:7051
event_sources:
  - name: hub0
    url: grpcs://peer0.org1.example.com:7053
"#;

    #[test]
    fn test_default_config() {
        let config = ChannelClientConfig::default();
        assert_eq!(config.proposal_wait(), Duration::from_secs(12));
        assert_eq!(config.lifecycle_wait(), Duration::from_secs(120));
        assert_eq!(config.commit_wait(), Duration::from_secs(120));
        assert_eq!(config.consistency_policy, ConsistencyPolicy::Majority);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = ChannelClientConfig {
            commit_wait_ms: 0,
            ..ChannelClientConfig::for_testing()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "commit_wait_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_client_config_uses_defaults() {
        let config: ChannelClientConfig =
            serde_json::from_str(r#"{"consistency_policy":"strict"}"#).unwrap();
        assert_eq!(config.consistency_policy, ConsistencyPolicy::Strict);
        assert_eq!(config.proposal_wait_ms, DEFAULT_PROPOSAL_WAIT_MS);
    }

    #[test]
    fn test_network_from_yaml() {
        let network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        assert_eq!(network.organization, "Org1MSP");
        assert_eq!(network.peers.len(), 2);
        assert_eq!(network.event_sources[0].name, "hub0");
        let tls = network.orderers[0].tls.as_ref().unwrap();
        assert_eq!(tls.ca_cert.as_deref(), Some(std::path::Path::new("/etc/tls/orderer-ca.pem")));
        assert_eq!(network.orderers[0].properties["keepalive_ms"], "300000");
    }

    #[test]
    fn test_network_duplicate_peer_rejected() {
        let yaml = NETWORK_YAML.replace("name: peer1", "name: peer0");
        assert_eq!(
            NetworkConfig::from_yaml_str(&yaml).unwrap_err(),
            ConfigError::DuplicateNode {
                role: "peer",
                name: "peer0".into()
            }
        );
    }

    #[test]
    fn test_network_from_json_requires_channel() {
        let json = r#"{"organization":"Org1MSP","channel":"","orderers":[],"peers":[]}"#;
        assert_eq!(
            NetworkConfig::from_json_str(json).unwrap_err(),
            ConfigError::EmptyField { field: "channel" }
        );
    }
}
