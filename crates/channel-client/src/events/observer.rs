//! # Block Observers
//!
//! Each topology owns a dispatch list. Observers see every block delivered
//! by the channel's event sources before commit resolution runs. They cannot
//! influence protocol outcomes.

use shared_types::BlockEvent;
use std::sync::Arc;
use tracing::info;

pub trait BlockObserver: Send + Sync {
    fn on_block(&self, source: &str, block: &BlockEvent);
}

/// Logs block number and hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockLogger;

impl BlockObserver for BlockLogger {
    fn on_block(&self, source: &str, block: &BlockEvent) {
        info!(
            channel = %block.channel,
            source = %source,
            block_number = block.number,
            data_hash = %hex::encode(block.data_hash),
            previous_hash = %hex::encode(block.previous_hash),
            transactions = block.transactions.len(),
            "Block received"
        );
    }
}

#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn BlockObserver>>,
}

impl ObserverList {
    /// List holding only the block logger.
    pub fn with_logger() -> Self {
        Self {
            observers: vec![Arc::new(BlockLogger)],
        }
    }

    pub fn push(&mut self, observer: Arc<dyn BlockObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn dispatch(&self, source: &str, block: &BlockEvent) {
        for observer in &self.observers {
            observer.on_block(source, block);
        }
    }
}
