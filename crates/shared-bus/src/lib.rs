//! # Shared Bus - Block Event Bus
//!
//! Fan-out of ledger events to any number of channel subscribers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Orderer /    │                    │ Event source │
//! │ block cutter │    publish()       │ adapter      │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(channel)
//! ```
//!
//! Delivery is at-least-once per subscriber while it keeps up; a subscriber
//! that lags more than the channel capacity skips the oldest events.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, LedgerEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
