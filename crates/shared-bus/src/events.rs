//! # Ledger Events
//!
//! Event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::entities::BlockEvent;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A block was appended to a channel's ledger.
    BlockCommitted(BlockEvent),

    /// A named event source stopped serving a channel.
    ///
    /// Subscribers bound to that source end their stream when they see it.
    SourceDisconnected {
        /// Channel the source was serving.
        channel: String,
        /// Name of the event source.
        source: String,
    },
}

impl LedgerEvent {
    /// Channel this event belongs to.
    pub fn channel(&self) -> &str {
        match self {
            Self::BlockCommitted(block) => &block.channel,
            Self::SourceDisconnected { channel, .. } => channel,
        }
    }
}

/// Filter for subscribing to a subset of channels.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Channels to receive. Empty means all channels.
    pub channels: Vec<String>,
}

impl EventFilter {
    /// Receive events for every channel.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Receive events for one channel only.
    #[must_use]
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            channels: vec![name.into()],
        }
    }

    /// Check if an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        self.channels.is_empty() || self.channels.iter().any(|c| c == event.channel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on(channel: &str) -> LedgerEvent {
        LedgerEvent::BlockCommitted(BlockEvent {
            channel: channel.to_string(),
            number: 1,
            data_hash: [0; 32],
            previous_hash: [0; 32],
            transactions: vec![],
        })
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        assert!(filter.matches(&block_on("a")));
        assert!(filter.matches(&block_on("b")));
    }

    #[test]
    fn test_filter_channel() {
        let filter = EventFilter::channel("a");
        assert!(filter.matches(&block_on("a")));
        assert!(!filter.matches(&block_on("b")));
        assert!(filter.matches(&LedgerEvent::SourceDisconnected {
            channel: "a".into(),
            source: "hub0".into(),
        }));
    }
}
