//! # Channel Creation
//!
//! Creating a channel on the ordering service, joining the configured
//! peers and transacting on the result.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use std::sync::Arc;

    use channel_client::adapters::{BusEventSource, InMemoryNetwork, MockOrderer, MockPeer};
    use channel_client::{
        ChannelClientApi, ChannelClientConfig, ChannelConfiguration, ChannelError, CommitStatus,
        ProposalRequest,
    };
    use shared_bus::InMemoryEventBus;

    const NEW_CHANNEL: &str = "tradechannel";

    /// A peer on no channel yet, ready to endorse once it joins `NEW_CHANNEL`.
    fn unjoined_peer(name: &str) -> Arc<MockPeer> {
        Arc::new(
            MockPeer::new(name)
                .with_installed(chaincode())
                .with_instantiated(NEW_CHANNEL, chaincode())
                .endorsing(b"OK".to_vec(), writes("alice")),
        )
    }

    fn configuration() -> ChannelConfiguration {
        ChannelConfiguration::from_bytes(b"tradechannel-config-tx".to_vec())
    }

    #[tokio::test]
    async fn test_created_channel_commits_transactions() {
        let bus = Arc::new(InMemoryEventBus::new());
        let peer0 = unjoined_peer("peer0");
        let peer1 = unjoined_peer("peer1");
        let orderer0 = Arc::new(MockOrderer::new("orderer0").cutting_blocks(bus.clone()));
        let orderer1 = Arc::new(MockOrderer::new("orderer1"));
        let net = InMemoryNetwork::new()
            .with_peer(peer0.clone())
            .with_peer(peer1.clone())
            .with_orderer(orderer0.clone())
            .with_orderer(orderer1.clone())
            .with_event_source(BusEventSource::new("hub0", bus));
        let network = net.network_config(ORG, NEW_CHANNEL);
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();

        let topology = service
            .create_channel(&network, NEW_CHANNEL, configuration(), identity.clone())
            .await
            .unwrap();

        assert_eq!(topology.name(), NEW_CHANNEL);
        assert!(topology.is_initialized());
        assert_eq!(orderer0.channels(), vec![NEW_CHANNEL.to_string()]);
        assert!(orderer1.channels().is_empty());
        assert_eq!(peer0.channels(), vec![NEW_CHANNEL.to_string()]);
        assert_eq!(peer1.channels(), vec![NEW_CHANNEL.to_string()]);
        assert_eq!(topology.orderers().len(), 2);

        let receipt = service
            .submit_transaction(
                &topology,
                identity.as_ref(),
                ProposalRequest::invoke(chaincode(), vec!["create".into(), "asset1".into()]),
            )
            .await
            .unwrap();
        let outcome = receipt.commit.await.unwrap();
        assert_eq!(outcome.status, CommitStatus::Committed);
        assert_eq!(outcome.block_number, Some(1));
        assert_eq!(orderer0.received()[0].channel, NEW_CHANNEL);
    }

    #[tokio::test]
    async fn test_creating_existing_channel_fails() {
        let bus = Arc::new(InMemoryEventBus::new());
        let peer0 = unjoined_peer("peer0");
        let net = InMemoryNetwork::new()
            .with_peer(peer0.clone())
            .with_orderer(MockOrderer::new("orderer0").with_channel(NEW_CHANNEL))
            .with_event_source(BusEventSource::new("hub0", bus));
        let network = net.network_config(ORG, NEW_CHANNEL);
        let service = service(net, ChannelClientConfig::for_testing());

        let err = service
            .create_channel(&network, NEW_CHANNEL, configuration(), admin())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChannelError::ChannelCreationFailed { ref channel, ref reason }
                if channel == NEW_CHANNEL && reason.contains("already exists")
        ));
        assert!(peer0.channels().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_peer_fails_creation_after_orderer_accepts() {
        let bus = Arc::new(InMemoryEventBus::new());
        let orderer0 = Arc::new(MockOrderer::new("orderer0"));
        let net = InMemoryNetwork::new()
            .with_peer(unjoined_peer("peer0"))
            .with_peer(MockPeer::new("peer1").unreachable())
            .with_orderer(orderer0.clone())
            .with_event_source(BusEventSource::new("hub0", bus));
        let network = net.network_config(ORG, NEW_CHANNEL);
        let service = service(net, ChannelClientConfig::for_testing());

        let err = service
            .create_channel(&network, NEW_CHANNEL, configuration(), admin())
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::NodeUnreachable { ref node, .. } if node == "peer1"));
        assert_eq!(orderer0.channels(), vec![NEW_CHANNEL.to_string()]);
    }
}
