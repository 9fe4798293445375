//! Shared builders for the integration flows.

use channel_client::adapters::{DigestTagVerifier, InMemoryNetwork, MockPeer, StaticIdentity};
use channel_client::{
    ChannelClientConfig, ChannelClientDependencies, ChannelClientService, ReadWriteSet,
    SigningIdentity,
};
use shared_types::ChaincodeIdentity;
use std::sync::Arc;

pub const CHANNEL: &str = "mychannel";
pub const ORG: &str = "Org1MSP";

pub fn chaincode() -> ChaincodeIdentity {
    ChaincodeIdentity::new("asset_transfer", "github.com/example/asset_transfer", "1.0")
        .expect("valid chaincode identity")
}

pub fn admin() -> Arc<dyn SigningIdentity> {
    invoker_telemetry::init_test_logging();
    Arc::new(StaticIdentity::new(ORG, "admin"))
}

pub fn writes(value: &str) -> ReadWriteSet {
    ReadWriteSet::with_writes("asset_transfer", [("asset1", value)])
}

/// A peer on the channel with the fixture chaincode deployed, endorsing
/// a write of `value`.
pub fn endorsing_peer(name: &str, value: &str) -> MockPeer {
    MockPeer::new(name)
        .joined(CHANNEL)
        .with_installed(chaincode())
        .with_instantiated(CHANNEL, chaincode())
        .endorsing(value.as_bytes().to_vec(), writes(value))
}

pub fn service(net: InMemoryNetwork, config: ChannelClientConfig) -> ChannelClientService {
    let network = net.network_config(ORG, CHANNEL);
    let deps = ChannelClientDependencies {
        connector: Arc::new(net),
        verifier: Arc::new(DigestTagVerifier),
        network,
        config,
    };
    ChannelClientService::new(deps).expect("valid service configuration")
}
