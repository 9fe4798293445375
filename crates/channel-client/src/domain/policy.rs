//! # Endorsement Policy
//!
//! The rule attached to an instantiation that decides which organizations
//! must endorse future transactions of the chaincode. The client only
//! validates and forwards it; evaluation happens on the peers.
//!
//! ```yaml
//! identities:
//!   - name: member1
//!     msp_id: Org1MSP
//!     role: member
//!   - name: member2
//!     msp_id: Org2MSP
//!     role: member
//! rule:
//!   out_of:
//!     n: 1
//!     rules:
//!       - signed_by: member1
//!       - signed_by: member2
//! ```

use super::errors::{ChannelError, ChannelResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRole {
    Member,
    Admin,
    Peer,
    Client,
}

/// A named principal the rule tree refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyIdentity {
    pub name: String,
    pub msp_id: String,
    pub role: PolicyRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    /// Satisfied by a signature of the named identity.
    SignedBy(String),
    /// Satisfied when `n` of the nested rules are.
    OutOf { n: usize, rules: Vec<PolicyRule> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementPolicy {
    pub identities: Vec<PolicyIdentity>,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub rule: PolicyRule,
}

impl EndorsementPolicy {
    /// Policy satisfied by any single member of the given organizations.
    pub fn any_member_of(msp_ids: &[&str]) -> Self {
        let identities: Vec<PolicyIdentity> = msp_ids
            .iter()
            .enumerate()
            .map(|(i, msp_id)| PolicyIdentity {
                name: format!("member{i}"),
                msp_id: (*msp_id).to_string(),
                role: PolicyRole::Member,
            })
            .collect();
        let rules = identities
            .iter()
            .map(|identity| PolicyRule::SignedBy(identity.name.clone()))
            .collect();
        Self {
            identities,
            rule: PolicyRule::OutOf { n: 1, rules },
        }
    }

    pub fn from_yaml_str(source: &str) -> ChannelResult<Self> {
        let policy: Self =
            serde_yaml::from_str(source).map_err(|e| ChannelError::PolicyInvalid(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_yaml_file(path: &Path) -> ChannelResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ChannelError::PolicyInvalid(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&source)
    }

    /// Check that identity names are unique, every rule refers to a known
    /// identity and every threshold is satisfiable.
    pub fn validate(&self) -> ChannelResult<()> {
        let mut names = HashSet::new();
        for identity in &self.identities {
            if identity.name.is_empty() || identity.msp_id.is_empty() {
                return Err(ChannelError::PolicyInvalid(
                    "identity name and msp_id must be non-empty".into(),
                ));
            }
            if !names.insert(identity.name.as_str()) {
                return Err(ChannelError::PolicyInvalid(format!(
                    "duplicate identity {}",
                    identity.name
                )));
            }
        }
        validate_rule(&self.rule, &names)
    }
}

fn validate_rule(rule: &PolicyRule, names: &HashSet<&str>) -> ChannelResult<()> {
    match rule {
        PolicyRule::SignedBy(name) => {
            if names.contains(name.as_str()) {
                Ok(())
            } else {
                Err(ChannelError::PolicyInvalid(format!(
                    "rule refers to unknown identity {name}"
                )))
            }
        }
        PolicyRule::OutOf { n, rules } => {
            if *n == 0 || *n > rules.len() {
                return Err(ChannelError::PolicyInvalid(format!(
                    "out_of threshold {n} not in 1..={}",
                    rules.len()
                )));
            }
            rules.iter().try_for_each(|r| validate_rule(r, names))
        }
    }
}
