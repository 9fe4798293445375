//! # Chain Invoker Test Suite
//!
//! End-to-end flows across the channel client, the block-event bus and the
//! in-memory network adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── channels.rs   # Channel creation and peer joining
//!     ├── flows.rs      # Submit, query, commit tracking
//!     └── lifecycle.rs  # Install, instantiate, deployment checks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p invoker-tests
//! cargo test -p invoker-tests integration::lifecycle
//! ```

#![allow(dead_code)]

pub mod integration;
