//! Submission pipeline: download, enqueue, tell the submitter, wake the
//! dispatcher.

use super::dispatcher::Dispatcher;
use super::error::RetrievalError;
use super::item::{OriginId, QueueItem, RemoteMedia, StatusHandle};
use super::notice::Notice;
use super::ports::RelayPorts;
use super::queue::DeliveryQueue;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one submission
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Item accepted
    Queued {
        /// Id of the new item
        id: Uuid,
        /// Position at acceptance
        position: usize,
        /// Point-in-time send estimate shown to the submitter
        estimated_at: DateTime<Utc>,
    },
    /// Download failed; nothing was queued
    Rejected(RetrievalError),
}

/// Accepts inbound media into the delivery queue
pub struct Intake {
    queue: Arc<DeliveryQueue>,
    dispatcher: Arc<Dispatcher>,
    ports: RelayPorts,
    media_folder: PathBuf,
}

impl Intake {
    /// Creates an intake writing downloads under `media_folder`
    #[must_use]
    pub fn new(
        queue: Arc<DeliveryQueue>,
        dispatcher: Arc<Dispatcher>,
        ports: RelayPorts,
        media_folder: PathBuf,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            ports,
            media_folder,
        }
    }

    /// Handles one inbound photo or video.
    ///
    /// Download time is not counted as waiting time: the item's timestamp is
    /// taken when it enters the queue.
    pub async fn submit(
        &self,
        origin: OriginId,
        remote: RemoteMedia,
        caption: Option<String>,
    ) -> SubmissionOutcome {
        let kind = remote.kind;
        let handle = self
            .report(origin, &Notice::Downloading { kind }, None)
            .await;

        let file = match self
            .ports
            .store
            .materialize(&remote, &self.media_folder)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to retrieve {} from {}: {}", kind, origin, e);
                self.report(origin, &Notice::RetrievalFailed, handle).await;
                return SubmissionOutcome::Rejected(e);
            }
        };
        let size_bytes = file.size_bytes();

        let (id, position, estimated_at) = {
            let slot = self.queue.reserve().await;
            let now = self.ports.clock.now();
            let item = QueueItem::new(origin, file, kind, now, caption.clone(), handle);
            let id = item.id;
            slot.push(item).await;

            // Restart an idle loop before estimating, so the estimate sees the
            // interval that will actually deliver this item.
            self.dispatcher.ensure_running().await;
            // already picked up by a tick: it is being sent right now
            let (position, estimated_at) = self
                .dispatcher
                .position_estimate(id)
                .await
                .unwrap_or_else(|| (1, self.ports.clock.now()));
            drop(slot);
            (id, position, estimated_at)
        };

        info!(
            "Queued {} {} from {} ({} bytes): position {}, estimated send {}",
            kind, id, origin, size_bytes, position, estimated_at
        );

        let notice = Notice::Queued {
            kind,
            position,
            estimated_at,
            size_bytes,
            caption,
        };
        if let Some(updated) = self.report(origin, &notice, handle).await {
            if Some(updated) != handle {
                self.queue.attach_status(id, updated).await;
            }
        }

        SubmissionOutcome::Queued {
            id,
            position,
            estimated_at,
        }
    }

    async fn report(
        &self,
        origin: OriginId,
        notice: &Notice,
        handle: Option<StatusHandle>,
    ) -> Option<StatusHandle> {
        match self.ports.status.notify(origin, notice, handle).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to notify {origin}: {e}");
                None
            }
        }
    }
}
