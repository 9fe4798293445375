//! # Commit Tracker
//!
//! One background task per channel merges the block streams of every event
//! source and resolves pending commits. Each registration also arms a timer
//! that resolves the commit as timed out at its deadline.
//!
//! A pending entry is resolved by whoever removes it from the map first:
//! the consumer task, the timer, or an orderer rejection. The completion
//! sender is consumed on resolution, so a commit resolves at most once.
//! Timers only remove the registration that armed them, and are aborted
//! when that registration resolves by any other path.
//!
//! The consumer task lives as long as the tracker or any outstanding
//! `CommitHandle`, whichever is dropped last.

use crate::domain::{ChannelError, ChannelResult, CommitOutcome, CommitStatus};
use crate::events::ObserverList;
use crate::ports::outbound::BlockEventStream;
use parking_lot::Mutex;
use shared_types::{BlockEvent, TxId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info, warn};

struct PendingCommit {
    generation: u64,
    created_at: Instant,
    completion: oneshot::Sender<CommitOutcome>,
    timer: Option<AbortHandle>,
}

impl PendingCommit {
    fn resolve(
        self,
        tx_id: TxId,
        status: CommitStatus,
        block_number: Option<u64>,
        reason: Option<String>,
    ) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        let outcome = CommitOutcome {
            tx_id,
            status,
            block_number,
            reason,
            elapsed: self.created_at.elapsed(),
        };
        if self.completion.send(outcome).is_err() {
            debug!("Commit handle dropped before resolution");
        }
    }
}

struct TrackerShared {
    channel: String,
    pending: Mutex<HashMap<TxId, PendingCommit>>,
    resolved: AtomicU64,
    next_generation: AtomicU64,
    armed_timers: AtomicUsize,
}

impl TrackerShared {
    fn take(&self, tx_id: &TxId) -> Option<PendingCommit> {
        let entry = self.pending.lock().remove(tx_id);
        if entry.is_some() {
            self.resolved.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    /// Remove the entry only if it is still the given registration.
    fn take_generation(&self, tx_id: &TxId, generation: u64) -> Option<PendingCommit> {
        let mut pending = self.pending.lock();
        if pending.get(tx_id)?.generation != generation {
            return None;
        }
        let entry = pending.remove(tx_id);
        if entry.is_some() {
            self.resolved.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    fn on_block(&self, source: &str, block: &BlockEvent) {
        for tx in &block.transactions {
            let Some(pending) = self.take(&tx.tx_id) else {
                continue;
            };
            if tx.validation_code.is_valid() {
                info!(
                    channel = %self.channel,
                    tx_id = %tx.tx_id,
                    block_number = block.number,
                    source = %source,
                    "Transaction committed"
                );
                pending.resolve(
                    tx.tx_id.clone(),
                    CommitStatus::Committed,
                    Some(block.number),
                    None,
                );
            } else {
                let reason = format!("{:?}", tx.validation_code);
                warn!(
                    channel = %self.channel,
                    tx_id = %tx.tx_id,
                    block_number = block.number,
                    reason = %reason,
                    "Transaction invalidated at commit"
                );
                pending.resolve(
                    tx.tx_id.clone(),
                    CommitStatus::Rejected,
                    Some(block.number),
                    Some(reason),
                );
            }
        }
    }
}

/// Counts a live timer task until it finishes or is aborted.
struct ArmedTimer(Arc<TrackerShared>);

impl ArmedTimer {
    fn arm(shared: Arc<TrackerShared>) -> Self {
        shared.armed_timers.fetch_add(1, Ordering::Relaxed);
        Self(shared)
    }
}

impl Drop for ArmedTimer {
    fn drop(&mut self) {
        self.0.armed_timers.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Aborts the block consumer when the last owner lets go.
struct ConsumerTask(JoinHandle<()>);

impl Drop for ConsumerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Resolves when the ledger decides the fate of one transaction.
///
/// Dropping the handle abandons the result but does not cancel tracking.
/// Holding it keeps the channel's block consumer running.
pub struct CommitHandle {
    tx_id: TxId,
    channel: String,
    receiver: oneshot::Receiver<CommitOutcome>,
    _consumer: Arc<ConsumerTask>,
}

impl CommitHandle {
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// The outcome if it is already known.
    pub fn try_outcome(&mut self) -> Option<CommitOutcome> {
        self.receiver.try_recv().ok()
    }
}

impl std::fmt::Debug for CommitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitHandle")
            .field("tx_id", &self.tx_id)
            .field("channel", &self.channel)
            .finish()
    }
}

impl Future for CommitHandle {
    type Output = ChannelResult<CommitOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(Pin::new(&mut self.receiver).poll(cx));
        Poll::Ready(result.map_err(|_| ChannelError::TrackerStopped {
            channel: self.channel.clone(),
        }))
    }
}

pub struct CommitTracker {
    shared: Arc<TrackerShared>,
    commit_wait: Duration,
    consumer: Arc<ConsumerTask>,
}

impl CommitTracker {
    /// Start consuming the given block streams.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        channel: &str,
        sources: Vec<(String, BlockEventStream)>,
        observers: ObserverList,
        commit_wait: Duration,
    ) -> Self {
        let shared = Arc::new(TrackerShared {
            channel: channel.to_string(),
            pending: Mutex::new(HashMap::new()),
            resolved: AtomicU64::new(0),
            next_generation: AtomicU64::new(0),
            armed_timers: AtomicUsize::new(0),
        });

        let mut streams = StreamMap::new();
        for (name, stream) in sources {
            streams.insert(name, stream);
        }
        info!(
            channel = %channel,
            sources = streams.len(),
            "Commit tracker started"
        );

        let consumer = tokio::spawn(consume_blocks(shared.clone(), streams, observers));
        Self {
            shared,
            commit_wait,
            consumer: Arc::new(ConsumerTask(consumer)),
        }
    }

    pub fn commit_wait(&self) -> Duration {
        self.commit_wait
    }

    /// Register a transaction with the default commit wait.
    pub fn register(&self, tx_id: TxId) -> CommitHandle {
        self.register_with_wait(tx_id, self.commit_wait)
    }

    /// Register a transaction before it is sent to ordering, so that a
    /// block arriving immediately after submission is not missed.
    pub fn register_with_wait(&self, tx_id: TxId, wait: Duration) -> CommitHandle {
        let (completion, receiver) = oneshot::channel();
        let created_at = Instant::now();
        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);

        // The timer blocks on this lock, so it cannot fire before the entry exists.
        let previous = {
            let mut pending = self.shared.pending.lock();
            let timer = self.arm_timer(tx_id.clone(), generation, created_at + wait, wait);
            pending.insert(
                tx_id.clone(),
                PendingCommit {
                    generation,
                    created_at,
                    completion,
                    timer: Some(timer),
                },
            )
        };
        if let Some(previous) = previous {
            warn!(tx_id = %tx_id, "Transaction registered twice, superseding earlier handle");
            previous.resolve(
                tx_id.clone(),
                CommitStatus::Rejected,
                None,
                Some("superseded by a later registration".into()),
            );
        }

        CommitHandle {
            tx_id,
            channel: self.shared.channel.clone(),
            receiver,
            _consumer: self.consumer.clone(),
        }
    }

    fn arm_timer(
        &self,
        tx_id: TxId,
        generation: u64,
        deadline: Instant,
        wait: Duration,
    ) -> AbortHandle {
        let armed = ArmedTimer::arm(self.shared.clone());
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let shared = &armed.0;
            if let Some(mut pending) = shared.take_generation(&tx_id, generation) {
                pending.timer = None;
                warn!(
                    channel = %shared.channel,
                    tx_id = %tx_id,
                    waited_ms = wait.as_millis() as u64,
                    "Transaction not committed within wait budget"
                );
                pending.resolve(tx_id, CommitStatus::TimedOut, None, None);
            }
        })
        .abort_handle()
    }

    /// Resolve a pending transaction as rejected before any block includes
    /// it. Returns `false` if it was already resolved.
    pub fn reject(&self, tx_id: &TxId, reason: String) -> bool {
        match self.shared.take(tx_id) {
            Some(pending) => {
                warn!(
                    channel = %self.shared.channel,
                    tx_id = %tx_id,
                    reason = %reason,
                    "Transaction rejected"
                );
                pending.resolve(tx_id.clone(), CommitStatus::Rejected, None, Some(reason));
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Number of commits resolved so far, by any path.
    pub fn resolved_count(&self) -> u64 {
        self.shared.resolved.load(Ordering::Relaxed)
    }

    /// Deadline timers still running.
    pub fn armed_timers(&self) -> usize {
        self.shared.armed_timers.load(Ordering::Relaxed)
    }
}

async fn consume_blocks(
    shared: Arc<TrackerShared>,
    mut streams: StreamMap<String, BlockEventStream>,
    observers: ObserverList,
) {
    while let Some((source, block)) = streams.next().await {
        if block.channel != shared.channel {
            debug!(
                channel = %shared.channel,
                block_channel = %block.channel,
                source = %source,
                "Ignoring block for another channel"
            );
            continue;
        }
        observers.dispatch(&source, &block);
        shared.on_block(&source, &block);
    }
    warn!(
        channel = %shared.channel,
        "All event sources closed, pending commits can only time out"
    );
}
