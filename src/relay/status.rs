//! Queue summaries computed from live state on every call.

use super::dispatcher::Dispatcher;
use super::estimator::{estimate, time_until_next_attempt};
use super::item::{MediaKind, OriginId};
use super::ports::Clock;
use super::queue::{DeliveryQueue, QueuedSummary};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Position and projected send time of one queued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEstimate {
    /// Item id
    pub id: Uuid,
    /// 1-based position
    pub position: usize,
    /// Photo or video
    pub kind: MediaKind,
    /// Projected send time
    pub estimated_at: DateTime<Utc>,
}

/// Snapshot of the whole queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueReport {
    /// When the report was computed
    pub generated_at: DateTime<Utc>,
    /// Pending items
    pub total: usize,
    /// Pending photos
    pub photos: usize,
    /// Pending videos
    pub videos: usize,
    /// Time until the next send attempt; `None` for an empty queue
    pub next_attempt_in: Option<Duration>,
    /// Absolute time of the next send attempt; `None` for an empty queue
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Estimate for the tail item
    pub last: Option<ItemEstimate>,
    /// Items submitted by the requesting origin, head first
    pub mine: Vec<ItemEstimate>,
}

impl QueueReport {
    /// True when nothing is pending
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Derives [`QueueReport`]s from the queue and dispatcher
pub struct StatusReporter {
    queue: Arc<DeliveryQueue>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

impl StatusReporter {
    /// Creates a reporter over shared state
    #[must_use]
    pub fn new(queue: Arc<DeliveryQueue>, dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            dispatcher,
            clock,
        }
    }

    /// Summarizes the queue, including the items of `origin` when given
    pub async fn report(&self, origin: Option<OriginId>) -> QueueReport {
        let items = self.queue.snapshot().await;
        let activity = self.dispatcher.activity().await;
        let interval = self.dispatcher.interval();
        let now = self.clock.now();

        let to_estimate = |idx: usize, summary: &QueuedSummary| ItemEstimate {
            id: summary.id,
            position: idx + 1,
            kind: summary.kind,
            estimated_at: estimate(now, idx + 1, interval, activity),
        };

        let photos = items.iter().filter(|i| i.kind == MediaKind::Photo).count();
        let (next_attempt_in, next_attempt_at) = if items.is_empty() {
            (None, None)
        } else {
            let wait = time_until_next_attempt(now, interval, activity);
            (Some(wait), Some(estimate(now, 1, interval, activity)))
        };

        let mine = origin
            .map(|origin| {
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, summary)| summary.origin == origin)
                    .map(|(idx, summary)| to_estimate(idx, summary))
                    .collect()
            })
            .unwrap_or_default();

        QueueReport {
            generated_at: now,
            total: items.len(),
            photos,
            videos: items.len() - photos,
            next_attempt_in,
            next_attempt_at,
            last: items.last().map(|summary| to_estimate(items.len() - 1, summary)),
            mine,
        }
    }

    /// Current position and estimate of one item, if it is still queued
    pub async fn item_estimate(&self, id: Uuid) -> Option<ItemEstimate> {
        let items = self.queue.snapshot().await;
        let activity = self.dispatcher.activity().await;
        let now = self.clock.now();
        items
            .iter()
            .position(|summary| summary.id == id)
            .map(|idx| ItemEstimate {
                id,
                position: idx + 1,
                kind: items[idx].kind,
                estimated_at: estimate(now, idx + 1, self.dispatcher.interval(), activity),
            })
    }
}
