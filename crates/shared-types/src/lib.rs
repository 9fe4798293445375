//! # Shared Types Crate
//!
//! Ledger primitives shared across the workspace: transaction identifiers,
//! chaincode identities and the block events emitted by a channel's event
//! sources.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here.
//! - **Value Types Only**: nothing in this crate owns a connection or a task.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
