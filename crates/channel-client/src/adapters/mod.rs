//! # Adapters
//!
//! In-memory implementations of the outbound ports. They back the unit and
//! end-to-end tests and local experiments without a running network.

pub mod identity;
pub mod in_memory;
pub mod verifier;

pub use identity::StaticIdentity;
pub use in_memory::{BusEventSource, InMemoryNetwork, MockOrderer, MockPeer, PeerBehavior};
pub use verifier::{endorsement_tag, DigestTagVerifier};
