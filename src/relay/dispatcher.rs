//! Single-flight dispatch loop.
//!
//! The dispatcher is either [`DispatcherActivity::Idle`] (no task, no wake
//! scheduled) or [`DispatcherActivity::Running`] (one task sleeping until the
//! next tick or sending). Every tick that finds an item makes exactly one send
//! attempt and the next tick fires one interval after it started, whatever the
//! outcome. A tick that finds the queue empty returns to Idle.

use super::error::SendError;
use super::estimator::estimate;
use super::item::{DeliveryTarget, MediaFile, OriginId, QueueItem, StatusHandle};
use super::notice::Notice;
use super::ports::RelayPorts;
use super::queue::DeliveryQueue;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Observable dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherActivity {
    /// No wake scheduled
    Idle,
    /// A wake is scheduled or a tick is in progress
    Running {
        /// Start of the interval that ends with the next attempt
        interval_started: DateTime<Utc>,
    },
}

/// Timing and routing for the dispatch loop
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Minimum spacing between send attempts
    pub interval: Duration,
    /// Broadcast destination; `None` sends items back to their submitter
    pub destination: Option<DeliveryTarget>,
}

/// Drains a [`DeliveryQueue`] one item per interval
pub struct Dispatcher {
    queue: Arc<DeliveryQueue>,
    ports: RelayPorts,
    settings: DispatchSettings,
    state: Mutex<DispatcherActivity>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Creates an idle dispatcher
    #[must_use]
    pub fn new(queue: Arc<DeliveryQueue>, ports: RelayPorts, settings: DispatchSettings) -> Self {
        Self {
            queue,
            ports,
            settings,
            state: Mutex::new(DispatcherActivity::Idle),
            loop_handle: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Send interval
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.settings.interval
    }

    /// Configured broadcast destination
    #[must_use]
    pub const fn destination(&self) -> Option<&DeliveryTarget> {
        self.settings.destination.as_ref()
    }

    /// Current state
    pub async fn activity(&self) -> DispatcherActivity {
        *self.state.lock().await
    }

    /// Starts the loop if it is idle. Returns `true` when a new loop was spawned.
    ///
    /// The first attempt happens one interval after the start.
    pub async fn ensure_running(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock().await;
        // lock order: state, then loop_handle
        let mut loop_handle = self.loop_handle.lock().await;
        if *state != DispatcherActivity::Idle || self.shutdown.is_cancelled() {
            return false;
        }
        *state = DispatcherActivity::Running {
            interval_started: self.ports.clock.now(),
        };

        info!(
            "Dispatcher started, first attempt in {}s",
            self.settings.interval.as_secs()
        );
        let this = Arc::clone(self);
        *loop_handle = Some(tokio::spawn(async move { this.run().await }));
        true
    }

    /// Position and send estimate of a queued item, or `None` once it has
    /// left the queue.
    ///
    /// Both values are read under the state lock, so a tick cannot dequeue
    /// between them.
    pub async fn position_estimate(&self, id: Uuid) -> Option<(usize, DateTime<Utc>)> {
        let state = self.state.lock().await;
        let position = self.queue.position_of(id).await?;
        let estimated_at = estimate(
            self.ports.clock.now(),
            position,
            self.settings.interval,
            *state,
        );
        Some((position, estimated_at))
    }

    /// Stops scheduling further ticks and waits for the loop to exit.
    ///
    /// An in-flight send, and the cleanup after it, completes first.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Dispatcher loop failed: {e}");
            }
        }
    }

    async fn run(self: Arc<Self>) {
        let mut next_wake = Instant::now() + self.settings.interval;
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    *self.state.lock().await = DispatcherActivity::Idle;
                    info!("Dispatcher stopped by shutdown");
                    return;
                }
                () = sleep_until(next_wake) => {}
            }

            let tick_started = Instant::now();
            if !self.tick().await {
                return;
            }
            next_wake = tick_started + self.settings.interval;
        }
    }

    /// One wake-and-attempt cycle. Returns `false` when the queue was empty and
    /// the dispatcher went idle.
    async fn tick(&self) -> bool {
        let item = {
            // Holding the state lock while checking emptiness means an enqueue
            // either lands before the check or sees Idle and restarts the loop.
            let mut state = self.state.lock().await;
            let Some(item) = self.queue.dequeue_head().await else {
                *state = DispatcherActivity::Idle;
                info!("Queue is empty, dispatcher idle");
                return false;
            };
            *state = DispatcherActivity::Running {
                interval_started: self.ports.clock.now(),
            };
            item
        };

        self.deliver(item).await;
        true
    }

    async fn deliver(&self, item: QueueItem) {
        let destination = DeliveryTarget::resolve(self.destination(), item.origin);
        debug!(
            "Sending {} {} to {} ({} bytes)",
            item.kind,
            item.file.path().display(),
            destination,
            item.file.size_bytes()
        );

        let outcome = self
            .ports
            .sender
            .send(
                &destination,
                item.kind,
                item.file.path(),
                item.caption.as_deref(),
            )
            .await;

        match outcome {
            Ok(()) => {
                info!("Delivered {} {} to {}", item.kind, item.id, destination);
                let QueueItem {
                    origin,
                    file,
                    kind,
                    status,
                    ..
                } = item;
                self.release(file).await;
                self.report(origin, status, &Notice::Sent { kind }).await;
            }
            Err(SendError::FatalDestination(reason)) => {
                error!(
                    "Destination {} unreachable, dropping {} {}: {}",
                    destination, item.kind, item.id, reason
                );
                let QueueItem {
                    origin,
                    file,
                    kind,
                    status,
                    ..
                } = item;
                self.report(origin, status, &Notice::DestinationUnreachable { kind })
                    .await;
                self.release(file).await;
            }
            Err(SendError::Transient(reason)) => {
                warn!(
                    "Temporary failure sending {} {}, will retry: {}",
                    item.kind, item.id, reason
                );
                let (id, origin, kind, status) = (item.id, item.origin, item.kind, item.status);
                self.queue.requeue_head(item).await;

                let next_attempt = estimate(
                    self.ports.clock.now(),
                    1,
                    self.settings.interval,
                    self.activity().await,
                );
                let notice = Notice::RetryScheduled { kind, next_attempt };
                if let Some(handle) = self.report(origin, status, &notice).await {
                    if Some(handle) != status {
                        self.queue.attach_status(id, handle).await;
                    }
                }
            }
        }
    }

    async fn release(&self, file: MediaFile) {
        if let Err(e) = self.ports.store.remove(file).await {
            warn!("Cleanup failed: {e}");
        }
    }

    async fn report(
        &self,
        origin: OriginId,
        handle: Option<StatusHandle>,
        notice: &Notice,
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
