//! # Transaction Flows
//!
//! Endorse → order → commit across the channel client, the in-memory
//! network and the shared block-event bus.
//!
//! ## Flows Tested:
//!
//! 1. **Partial endorsement**: one failing endorser does not block a commit
//! 2. **Commit budget**: a transaction no block includes times out, not earlier
//! 3. **Duplicate delivery**: two event sources delivering one block resolve once
//! 4. **Divergence**: split endorsers submit the larger agreeing set
//! 5. **Queries**: first verified answer, or nothing

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    use channel_client::adapters::{BusEventSource, InMemoryNetwork, MockOrderer, MockPeer, PeerBehavior};
    use channel_client::{
        BlockObserver, ChannelClientApi, ChannelClientConfig, ChannelError, ChannelTopology,
        CommitStatus, ConsistencyVerdict, ProposalRequest, TransactionState,
    };
    use shared_bus::{EventPublisher, InMemoryEventBus, LedgerEvent};
    use shared_types::{BlockEvent, TransactionEvent, TxValidationCode};

    fn transfer() -> ProposalRequest {
        ProposalRequest::invoke(
            chaincode(),
            vec!["transfer".into(), "asset1".into(), "bob".into()],
        )
    }

    // =========================================================================
    // COMMIT FLOWS
    // =========================================================================

    #[tokio::test]
    async fn test_two_of_three_endorsers_commit_with_block_number() {
        let bus = Arc::new(InMemoryEventBus::new());
        let orderer = Arc::new(MockOrderer::new("orderer0").cutting_blocks(bus.clone()));
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_peer(endorsing_peer("peer2", "bob"))
            .with_peer(
                endorsing_peer("peer3", "bob")
                    .with_behavior(PeerBehavior::Fail("chaincode panicked".into())),
            )
            .with_orderer(orderer.clone())
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();

        let topology = service
            .connect_channel(CHANNEL, identity.clone(), &chaincode())
            .await
            .unwrap();
        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();

        assert_eq!(receipt.state, TransactionState::Submitted);
        assert_eq!(receipt.endorsement.successful, 2);
        assert_eq!(receipt.endorsement.failed, 1);
        assert_eq!(receipt.endorsement.verdict, ConsistencyVerdict::Consistent);

        let outcome = receipt.commit.await.unwrap();
        assert_eq!(outcome.status, CommitStatus::Committed);
        assert_eq!(outcome.tx_id, receipt.tx_id);
        assert_eq!(outcome.block_number, Some(1));

        let envelope = &orderer.received()[0];
        let endorsers: Vec<&str> = envelope.endorsements.iter().map(|e| e.peer.as_str()).collect();
        assert_eq!(endorsers, vec!["peer1", "peer2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_budget_times_out_never_early() {
        let bus = Arc::new(InMemoryEventBus::new());
        // Accepts but never cuts a block.
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_orderer(MockOrderer::new("orderer0"))
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let config = ChannelClientConfig {
            commit_wait_ms: 2_000,
            ..ChannelClientConfig::for_testing()
        };
        let service = service(net, config);
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let started = Instant::now();
        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();
        let mut commit = receipt.commit;

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(commit.try_outcome().is_none());

        let outcome = (&mut commit).await.unwrap();
        assert_eq!(outcome.status, CommitStatus::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(matches!(
            outcome.into_result(),
            Err(ChannelError::CommitTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_resolves_once() {
        let bus = Arc::new(InMemoryEventBus::new());
        // Both sources read the same bus, so every block arrives twice.
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_orderer(MockOrderer::new("orderer0").cutting_blocks(bus.clone()))
            .with_event_source(BusEventSource::new("hub0", bus.clone()))
            .with_event_source(BusEventSource::new("hub1", bus.clone()));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();
        let tx_id = receipt.tx_id.clone();
        let outcome = receipt.commit.await.unwrap();
        assert_eq!(outcome.status, CommitStatus::Committed);

        // A late replay of the same transaction is ignored.
        bus.publish(LedgerEvent::BlockCommitted(BlockEvent {
            channel: CHANNEL.into(),
            number: 9,
            data_hash: [9; 32],
            previous_hash: [8; 32],
            transactions: vec![TransactionEvent::valid(tx_id)],
        }))
        .await;
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        let tracker = topology.tracker().unwrap();
        assert_eq!(tracker.resolved_count(), 1);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidated_transaction_is_rejected() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_orderer(
                MockOrderer::new("orderer0")
                    .cutting_blocks_with(bus.clone(), TxValidationCode::MvccReadConflict),
            )
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();
        let outcome = receipt.commit.await.unwrap();
        assert_eq!(outcome.status, CommitStatus::Rejected);
        assert_eq!(outcome.block_number, Some(1));
        assert!(matches!(
            outcome.into_result(),
            Err(ChannelError::CommitRejected { reason, .. }) if reason == "MvccReadConflict"
        ));
    }

    #[tokio::test]
    async fn test_divergent_endorsers_submit_larger_set() {
        let bus = Arc::new(InMemoryEventBus::new());
        let orderer = Arc::new(MockOrderer::new("orderer0").cutting_blocks(bus.clone()));
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "alice"))
            .with_peer(endorsing_peer("peer2", "bob"))
            .with_peer(endorsing_peer("peer3", "bob"))
            .with_orderer(orderer.clone())
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();
        assert_eq!(receipt.endorsement.verdict, ConsistencyVerdict::Ambiguous { sets: 2 });
        assert_eq!(receipt.endorsement.chosen, 2);

        let envelope = &orderer.received()[0];
        assert_eq!(envelope.payload, b"bob");
        assert_eq!(envelope.endorsements.len(), 2);
        assert!(receipt.commit.await.unwrap().is_committed());
    }

    #[tokio::test]
    async fn test_strict_consistency_refuses_divergence() {
        let bus = Arc::new(InMemoryEventBus::new());
        let orderer = Arc::new(MockOrderer::new("orderer0"));
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "alice"))
            .with_peer(endorsing_peer("peer2", "bob"))
            .with_orderer(orderer.clone())
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let config = ChannelClientConfig {
            consistency_policy: channel_client::ConsistencyPolicy::Strict,
            ..ChannelClientConfig::for_testing()
        };
        let service = service(net, config);
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let err = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::AmbiguousConsistency { sets: 2 }));
        assert!(orderer.received().is_empty());
    }

    #[tokio::test]
    async fn test_no_endorser_succeeds() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob").with_behavior(PeerBehavior::Unreachable))
            .with_peer(
                endorsing_peer("peer2", "bob").with_behavior(PeerBehavior::Fail("denied".into())),
            )
            .with_orderer(MockOrderer::new("orderer0"))
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let err = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::NoConsistentResponse { total: 2, failed: 2 }
        ));
    }

    // =========================================================================
    // ASSEMBLY
    // =========================================================================

    #[tokio::test]
    async fn test_membership_mismatch_fails_assembly() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_peer(MockPeer::new("peer2").joined("otherchannel"))
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());

        let err = service
            .assemble_channel(service.network(), CHANNEL, admin())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::MembershipMismatch { ref peer, ref channel }
                if peer == "peer2" && channel == CHANNEL
        ));
    }

    #[tokio::test]
    async fn test_unreachable_event_source_still_commits() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_orderer(MockOrderer::new("orderer0").cutting_blocks(bus.clone()))
            .with_event_source(BusEventSource::new("hub0", bus.clone()).unreachable())
            .with_event_source(BusEventSource::new("hub1", bus.clone()));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();

        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();
        assert!(topology.is_initialized());

        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();
        assert!(receipt.commit.await.unwrap().is_committed());
    }

    #[derive(Default)]
    struct BlockRecorder {
        blocks: Mutex<Vec<u64>>,
    }

    impl BlockObserver for BlockRecorder {
        fn on_block(&self, _source: &str, block: &BlockEvent) {
            self.blocks.lock().push(block.number);
        }
    }

    #[tokio::test]
    async fn test_observers_see_blocks_without_changing_outcome() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob"))
            .with_orderer(MockOrderer::new("orderer0").cutting_blocks(bus.clone()))
            .with_event_source(BusEventSource::new("hub0", bus.clone()));
        let network = net.network_config(ORG, CHANNEL);
        let identity = admin();
        let config = ChannelClientConfig::for_testing();

        let mut topology =
            ChannelTopology::assemble(&network, CHANNEL, identity.clone(), &net, &config)
                .await
                .unwrap();
        let recorder = Arc::new(BlockRecorder::default());
        topology.add_observer(recorder.clone()).unwrap();
        topology.initialize().await.unwrap();

        let service = service(net, config);
        let receipt = service
            .submit_transaction(&topology, identity.as_ref(), transfer())
            .await
            .unwrap();
        assert!(receipt.commit.await.unwrap().is_committed());
        assert_eq!(*recorder.blocks.lock(), vec![1]);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[tokio::test]
    async fn test_query_returns_first_verified_payload() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(
                endorsing_peer("peer1", "bob").with_behavior(PeerBehavior::Fail("no such asset".into())),
            )
            .with_peer(endorsing_peer("peer2", "bob"))
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let answer = service
            .query_chaincode(
                &topology,
                identity.as_ref(),
                ProposalRequest::query(chaincode(), vec!["read".into(), "asset1".into()]),
            )
            .await
            .unwrap()
            .expect("a verified answer");
        assert_eq!(answer.peer, "peer2");
        assert_eq!(answer.as_utf8(), Some("bob"));
    }

    #[tokio::test]
    async fn test_query_without_verified_answer_is_none() {
        let bus = Arc::new(InMemoryEventBus::new());
        let net = InMemoryNetwork::new()
            .with_peer(endorsing_peer("peer1", "bob").with_behavior(PeerBehavior::Tamper {
                payload: b"forged".to_vec(),
                rwset: writes("forged"),
            }))
            .with_peer(endorsing_peer("peer2", "bob").with_behavior(PeerBehavior::Unreachable))
            .with_event_source(BusEventSource::new("hub0", bus));
        let service = service(net, ChannelClientConfig::for_testing());
        let identity = admin();
        let topology = service
            .assemble_channel(service.network(), CHANNEL, identity.clone())
            .await
            .unwrap();

        let answer = service
            .query_chaincode(
                &topology,
                identity.as_ref(),
                ProposalRequest::query(chaincode(), vec!["read".into(), "asset1".into()]),
            )
            .await
            .unwrap();
        assert!(answer.is_none());
    }
}
