//! Ports: what the client needs from the network and what it offers callers.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
