//! # Chaincode Lifecycle
//!
//! Install and instantiate against an in-memory network, followed by the
//! deployment check a channel connection performs.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use channel_client::adapters::{BusEventSource, InMemoryNetwork, MockOrderer, MockPeer, PeerBehavior};
    use channel_client::domain::PolicyRule;
    use channel_client::{
        ChannelClientApi, ChannelClientConfig, ChannelError, CommitStatus, EndorsementPolicy,
    };
    use shared_bus::InMemoryEventBus;

    const POLICY: &str = r#"
identities:
  - name: org1
    msp_id: Org1MSP
    role: member
  - name: org2
    msp_id: Org2MSP
    role: member
rule:
  out_of:
    n: 1
    rules:
      - signed_by: org1
      - signed_by: org2
"#;

    /// A peer on the channel with nothing deployed yet.
    fn bare_peer(name: &str) -> Arc<MockPeer> {
        Arc::new(
            MockPeer::new(name)
                .joined(CHANNEL)
                .endorsing(b"OK".to_vec(), writes("deployed")),
        )
    }

    fn source() -> PathBuf {
        PathBuf::from("chaincode/asset_transfer")
    }

    // =========================================================================
    // INSTALL
    // =========================================================================

    #[tokio::test]
    async fn test_install_records_chaincode_on_endorsing_peers() {
        let bus = Arc::new(InMemoryEventBus::new());
        let peer1 = bare_peer("peer1");
        let peer2 = bare_peer("peer2");
        let peer3 = bare_peer("peer3");
        peer3.set_behavior(PeerBehavior::Fail("disk full".into()));
        let net = InMemoryNetwork::new()
            .with_peer(peer1.clone())
            .with_peer(peer2.clone())
            .with_peer(peer3.clone())
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());

        let report = service
            .install_chaincode(None, admin(), chaincode(), source())
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.fail_count, 1);
        assert!(!report.is_complete());
        assert_eq!(peer1.installed(), vec![chaincode()]);
        assert_eq!(peer2.installed(), vec![chaincode()]);
        assert!(peer3.installed().is_empty());
    }

    #[tokio::test]
    async fn test_installed_but_not_instantiated_is_not_deployed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let peer1 = bare_peer("peer1");
        let net = InMemoryNetwork::new()
            .with_peer(peer1.clone())
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();

        let report = service
            .install_chaincode(None, identity.clone(), chaincode(), source())
            .await
            .unwrap();
        assert!(report.is_complete());

        let err = service
            .connect_channel(CHANNEL, identity, &chaincode())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::ChaincodeNotDeployed { ref peer, .. } if peer == "peer1"
        ));
    }

    // =========================================================================
    // INSTANTIATE
    // =========================================================================

    #[tokio::test]
    async fn test_instantiate_with_yaml_policy_commits() {
        let bus = Arc::new(InMemoryEventBus::new());
        let orderer = Arc::new(MockOrderer::new("orderer0").cutting_blocks(bus.clone()));
        let net = InMemoryNetwork::new()
            .with_peer(bare_peer("peer1"))
            .with_peer(bare_peer("peer2"))
            .with_orderer(orderer.clone())
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let policy = EndorsementPolicy::from_yaml_str(POLICY).unwrap();
        let receipt = service
            .instantiate_chaincode(
                Some(topology),
                identity,
                chaincode(),
                policy,
                vec!["init".into(), "a".into(), "100".into()],
            )
            .await
            .unwrap();

        assert_eq!(receipt.endorsement.successful, 2);
        let outcome = receipt.commit.await.unwrap();
        assert_eq!(outcome.status, CommitStatus::Committed);
        assert_eq!(orderer.received().len(), 1);
        assert_eq!(orderer.received()[0].payload, b"OK");
    }

    #[tokio::test]
    async fn test_invalid_policy_sends_nothing() {
        let bus = Arc::new(InMemoryEventBus::new());
        let peer1 = bare_peer("peer1");
        let orderer = Arc::new(MockOrderer::new("orderer0"));
        let net = InMemoryNetwork::new()
            .with_peer(peer1.clone())
            .with_orderer(orderer.clone())
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());

        let mut policy = EndorsementPolicy::any_member_of(&[ORG]);
        policy.rule = PolicyRule::OutOf {
            n: 2,
            rules: vec![PolicyRule::SignedBy("member0".into())],
        };

        let err = service
            .instantiate_chaincode(None, admin(), chaincode(), policy, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::PolicyInvalid(_)));
        assert_eq!(peer1.proposals_received(), 0);
        assert!(orderer.received().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_instantiation_resolves_rejected() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(bare_peer("peer1"))
            .with_orderer(MockOrderer::new("orderer0").rejecting("BAD_REQUEST"))
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());

        let receipt = service
            .instantiate_chaincode(
                None,
                admin(),
                chaincode(),
                EndorsementPolicy::any_member_of(&[ORG]),
                vec![],
            )
            .await
            .unwrap();
        let outcome = receipt.commit.await.unwrap();
        assert_eq!(outcome.status, CommitStatus::Rejected);
        assert!(outcome.reason.unwrap_or_default().contains("BAD_REQUEST"));
    }
}
