//! Ordered in-memory queue of pending deliveries.
//!
//! Enqueues are serialized through a gate so that measuring the length and
//! appending never interleave with another enqueue. Dequeue, requeue and peek
//! bypass the gate: the dispatcher is their only caller and never runs them
//! concurrently with itself.

use super::item::{MediaKind, OriginId, QueueItem, StatusHandle};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Read-only view of a queued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSummary {
    /// Item id
    pub id: Uuid,
    /// Submitter
    pub origin: OriginId,
    /// Photo or video
    pub kind: MediaKind,
    /// Acceptance time
    pub enqueued_at: DateTime<Utc>,
    /// Size of the local bytes
    pub size_bytes: u64,
}

impl From<&QueueItem> for QueuedSummary {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id,
            origin: item.origin,
            kind: item.kind,
            enqueued_at: item.enqueued_at,
            size_bytes: item.file.size_bytes(),
        }
    }
}

/// FIFO of pending items with head reinsertion for retries
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<QueueItem>>,
    gate: Mutex<()>,
}

/// Exclusive right to append one item.
///
/// Holding a slot blocks every other enqueue; dropping it (on any path)
/// releases the gate.
pub struct EnqueueSlot<'a> {
    queue: &'a DeliveryQueue,
    _gate: MutexGuard<'a, ()>,
}

impl EnqueueSlot<'_> {
    /// Appends the item and returns the 1-based position it took.
    ///
    /// The slot stays held, so the caller can finish follow-up work before
    /// the next enqueue starts.
    pub async fn push(&self, item: QueueItem) -> usize {
        let mut items = self.queue.items.lock().await;
        items.push_back(item);
        items.len()
    }
}

impl DeliveryQueue {
    /// Creates an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other enqueue is in progress and reserves the tail
    pub async fn reserve(&self) -> EnqueueSlot<'_> {
        EnqueueSlot {
            queue: self,
            _gate: self.gate.lock().await,
        }
    }

    /// Appends to the tail and returns the 1-based position at insertion
    pub async fn enqueue(&self, item: QueueItem) -> usize {
        self.reserve().await.push(item).await
    }

    /// Removes and returns the head
    pub async fn dequeue_head(&self) -> Option<QueueItem> {
        self.items.lock().await.pop_front()
    }

    /// Puts an item back in front of everything else
    pub async fn requeue_head(&self, item: QueueItem) {
        self.items.lock().await.push_front(item);
    }

    /// Describes the head without removing it
    pub async fn peek_head(&self) -> Option<QueuedSummary> {
        self.items.lock().await.front().map(QueuedSummary::from)
    }

    /// Number of pending items
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// True when nothing is pending
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Summaries of all pending items, head first
    pub async fn snapshot(&self) -> Vec<QueuedSummary> {
        self.items
            .lock()
            .await
            .iter()
            .map(QueuedSummary::from)
            .collect()
    }

    /// 1-based position of an item, if still queued
    pub async fn position_of(&self, id: Uuid) -> Option<usize> {
        self.items
            .lock()
            .await
            .iter()
            .position(|item| item.id == id)
            .map(|idx| idx + 1)
    }

    /// Replaces the status handle of a queued item.
    ///
    /// Returns `false` when the item already left the queue.
    pub async fn attach_status(&self, id: Uuid, handle: StatusHandle) -> bool {
        let mut items = self.items.lock().await;
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.status = Some(handle);
                true
            }
            None => false,
        }
    }
}
