use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use media_relay_bot::relay::testing::{
    PausedClock, RecordingStatus, RecordingStore, ScriptedSender, SentRecord,
};
use media_relay_bot::relay::{
    DeliveryQueue, DeliveryTarget, DispatchSettings, Dispatcher, DispatcherActivity, Intake,
    MediaKind, MediaSender, Notice, OriginId, RelayPorts, RemoteMedia, SendError,
    SubmissionOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

const INTERVAL: Duration = Duration::from_secs(60);
const TOLERANCE: Duration = Duration::from_millis(50);

struct Harness {
    queue: Arc<DeliveryQueue>,
    dispatcher: Arc<Dispatcher>,
    intake: Intake,
    store: Arc<RecordingStore>,
    status: Arc<RecordingStatus>,
    clock: PausedClock,
    started: Instant,
}

fn harness(sender: Arc<dyn MediaSender>, destination: Option<DeliveryTarget>) -> Harness {
    harness_with_status(sender, destination, RecordingStatus::default())
}

fn harness_with_status(
    sender: Arc<dyn MediaSender>,
    destination: Option<DeliveryTarget>,
    status: RecordingStatus,
) -> Harness {
    let clock = PausedClock::new();
    let store = Arc::new(RecordingStore::default());
    let status = Arc::new(status);
    let ports = RelayPorts {
        store: store.clone(),
        sender,
        status: status.clone(),
        clock: Arc::new(clock),
    };
    let queue = Arc::new(DeliveryQueue::new());
    let dispatcher = Arc::new(Dispatcher::new(
        queue.clone(),
        ports.clone(),
        DispatchSettings {
            interval: INTERVAL,
            destination,
        },
    ));
    let intake = Intake::new(
        queue.clone(),
        dispatcher.clone(),
        ports,
        PathBuf::from("media"),
    );
    Harness {
        queue,
        dispatcher,
        intake,
        store,
        status,
        clock,
        started: Instant::now(),
    }
}

fn photo(file_id: &str) -> RemoteMedia {
    RemoteMedia {
        file_id: file_id.to_string(),
        kind: MediaKind::Photo,
    }
}

fn assert_close(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(diff <= TOLERANCE, "expected ~{expected:?}, got {actual:?}");
}

fn assert_close_at(actual: DateTime<Utc>, expected: DateTime<Utc>) {
    let diff = (actual - expected).abs().to_std().unwrap_or(Duration::MAX);
    assert!(diff <= TOLERANCE, "expected ~{expected}, got {actual}");
}

fn secs(n: i64) -> TimeDelta {
    TimeDelta::seconds(n)
}

fn file_names(sent: &[SentRecord]) -> Vec<String> {
    sent.iter()
        .filter_map(|r| r.path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

async fn queued(h: &Harness, origin: i64, file_id: &str) -> (Uuid, usize, DateTime<Utc>) {
    match h.intake.submit(OriginId(origin), photo(file_id), None).await {
        SubmissionOutcome::Queued {
            id,
            position,
            estimated_at,
        } => (id, position, estimated_at),
        SubmissionOutcome::Rejected(e) => panic!("submission rejected: {e}"),
    }
}

#[tokio::test(start_paused = true)]
async fn single_item_is_sent_after_one_interval_then_dispatcher_halts() {
    let sender = Arc::new(ScriptedSender::default());
    let h = harness(sender.clone(), None);

    let (_, position, estimated_at) = queued(&h, 7, "a").await;
    assert_eq!(position, 1);
    assert_close_at(estimated_at, h.clock.base() + secs(60));

    sleep(Duration::from_secs(61)).await;
    let sent = sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_close(sent[0].at.duration_since(h.started), INTERVAL);
    assert_eq!(sent[0].destination, DeliveryTarget::Chat(7));

    // the next tick finds the queue empty
    sleep(INTERVAL).await;
    assert_eq!(h.dispatcher.activity().await, DispatcherActivity::Idle);
    assert_eq!(h.store.removed().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn items_are_sent_in_fifo_order_one_interval_apart() {
    let sender = Arc::new(ScriptedSender::default());
    let h = harness(sender.clone(), None);

    for (idx, name) in ["a", "b", "c"].iter().enumerate() {
        let (_, position, estimated_at) = queued(&h, 1, name).await;
        assert_eq!(position, idx + 1);
        let expected = h.clock.base() + secs(60 * (i64::try_from(idx).unwrap_or(0) + 1));
        assert_close_at(estimated_at, expected);
    }

    sleep(Duration::from_secs(200)).await;
    let sent = sender.sent().await;
    assert_eq!(file_names(&sent), vec!["a.jpg", "b.jpg", "c.jpg"]);
    for (idx, record) in sent.iter().enumerate() {
        let expected = INTERVAL * (u32::try_from(idx).unwrap_or(0) + 1);
        assert_close(record.at.duration_since(h.started), expected);
    }
}

#[tokio::test(start_paused = true)]
async fn broadcast_destination_overrides_submitter() {
    let sender = Arc::new(ScriptedSender::default());
    let channel = DeliveryTarget::Channel("@relay".to_string());
    let h = harness(sender.clone(), Some(channel.clone()));

    queued(&h, 42, "a").await;
    sleep(Duration::from_secs(61)).await;

    let sent = sender.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination, channel);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_requeues_at_head_and_retries_one_interval_later() {
    let sender = Arc::new(ScriptedSender::with_outcomes(vec![Err(
        SendError::Transient("502 Bad Gateway".to_string()),
    )]));
    let h = harness(sender.clone(), None);

    let (a, _, _) = queued(&h, 1, "a").await;
    let (b, _, _) = queued(&h, 1, "b").await;

    sleep(Duration::from_secs(61)).await;
    // length unchanged and A still first
    assert_eq!(h.queue.len().await, 2);
    assert_eq!(h.queue.peek_head().await.map(|s| s.id), Some(a));
    assert_eq!(h.queue.position_of(b).await, Some(2));
    assert!(h.store.removed().await.is_empty());

    let retry = h
        .status
        .notices()
        .await
        .into_iter()
        .find_map(|record| match record.notice {
            Notice::RetryScheduled { next_attempt, .. } => Some(next_attempt),
            _ => None,
        });
    let Some(next_attempt) = retry else {
        panic!("submitter was not told about the retry");
    };
    assert_close_at(next_attempt, h.clock.base() + secs(120));

    sleep(Duration::from_secs(120)).await;
    let sent = sender.sent().await;
    assert_eq!(file_names(&sent), vec!["a.jpg", "a.jpg", "b.jpg"]);
    assert_close(sent[1].at.duration_since(sent[0].at), INTERVAL);
    assert_close(sent[2].at.duration_since(sent[1].at), INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn fatal_failure_drops_item_and_notifies_submitter() {
    let sender = Arc::new(ScriptedSender::with_outcomes(vec![Err(
        SendError::FatalDestination("chat not found".to_string()),
    )]));
    let h = harness(sender.clone(), None);

    queued(&h, 3, "a").await;
    queued(&h, 3, "b").await;

    sleep(Duration::from_secs(61)).await;
    assert_eq!(h.queue.len().await, 1);
    assert_eq!(h.store.removed().await, vec![PathBuf::from("media/a.jpg")]);
    let notified = h
        .status
        .notices()
        .await
        .iter()
        .any(|record| matches!(record.notice, Notice::DestinationUnreachable { .. }));
    assert!(notified);

    // the dropped item never comes back
    sleep(Duration::from_secs(120)).await;
    assert_eq!(file_names(&sender.sent().await), vec!["a.jpg", "b.jpg"]);
}

#[tokio::test(start_paused = true)]
async fn cleanup_runs_at_most_once_per_item() {
    let sender = Arc::new(ScriptedSender::with_outcomes(vec![
        Ok(()),
        Err(SendError::FatalDestination("bot was kicked".to_string())),
        Err(SendError::Transient("timeout".to_string())),
    ]));
    let h = harness(sender.clone(), None);

    for name in ["a", "b", "c"] {
        queued(&h, 1, name).await;
    }
    sleep(Duration::from_secs(60 * 6)).await;

    let mut removed = h.store.removed().await;
    assert_eq!(removed.len(), 3);
    removed.sort();
    removed.dedup();
    assert_eq!(removed.len(), 3);
    assert!(h.queue.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn idle_dispatcher_makes_no_calls_until_next_enqueue() {
    let sender = Arc::new(ScriptedSender::default());
    let h = harness(sender.clone(), None);

    queued(&h, 1, "a").await;
    sleep(Duration::from_secs(60 * 3)).await;
    assert_eq!(h.dispatcher.activity().await, DispatcherActivity::Idle);

    sleep(Duration::from_secs(60 * 10)).await;
    assert_eq!(sender.sent().await.len(), 1);

    let resumed_at = Instant::now();
    let (_, position, estimated_at) = queued(&h, 1, "b").await;
    assert_eq!(position, 1);
    assert_close_at(estimated_at, h.clock.base() + secs(60 * 13 + 60));

    sleep(Duration::from_secs(61)).await;
    let sent = sender.sent().await;
    assert_eq!(sent.len(), 2);
    assert_close(sent[1].at.duration_since(resumed_at), INTERVAL);
}

/// Sender that blocks every attempt until the test releases it
struct GatedSender {
    inner: ScriptedSender,
    gate: Semaphore,
}

#[async_trait]
impl MediaSender for GatedSender {
    async fn send(
        &self,
        destination: &DeliveryTarget,
        kind: MediaKind,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        let outcome = self.inner.send(destination, kind, path, caption).await;
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        outcome
    }
}

#[tokio::test(start_paused = true)]
async fn item_enqueued_during_send_waits_for_remaining_interval() {
    let sender = Arc::new(GatedSender {
        inner: ScriptedSender::default(),
        gate: Semaphore::new(0),
    });
    let h = harness(sender.clone(), None);

    queued(&h, 1, "a").await;
    // A is dequeued at 60s and stays in flight
    sleep(Duration::from_secs(75)).await;
    assert_eq!(sender.inner.sent().await.len(), 1);
    assert!(h.queue.is_empty().await);

    let (_, position, estimated_at) = queued(&h, 2, "b").await;
    assert_eq!(position, 1);
    // 15s into the interval that started with A's attempt: 45s left
    assert_close_at(estimated_at, h.clock.base() + secs(120));

    sender.gate.add_permits(2);
    sleep(Duration::from_secs(50)).await;
    let sent = sender.inner.sent().await;
    assert_eq!(file_names(&sent), vec!["a.jpg", "b.jpg"]);
    assert_close(sent[1].at.duration_since(h.started), INTERVAL * 2);
}

#[tokio::test(start_paused = true)]
async fn failed_download_is_not_queued() {
    let clock = PausedClock::new();
    let status = Arc::new(RecordingStatus::default());
    let sender = Arc::new(ScriptedSender::default());
    let ports = RelayPorts {
        store: Arc::new(RecordingStore::failing()),
        sender: sender.clone(),
        status: status.clone(),
        clock: Arc::new(clock),
    };
    let queue = Arc::new(DeliveryQueue::new());
    let dispatcher = Arc::new(Dispatcher::new(
        queue.clone(),
        ports.clone(),
        DispatchSettings {
            interval: INTERVAL,
            destination: None,
        },
    ));
    let intake = Intake::new(queue.clone(), dispatcher.clone(), ports, PathBuf::from("media"));

    let outcome = intake.submit(OriginId(1), photo("broken"), None).await;
    assert!(matches!(outcome, SubmissionOutcome::Rejected(_)));
    assert!(queue.is_empty().await);
    assert_eq!(dispatcher.activity().await, DispatcherActivity::Idle);

    let notices: Vec<Notice> = status.notices().await.into_iter().map(|r| r.notice).collect();
    assert_eq!(
        notices,
        vec![
            Notice::Downloading {
                kind: MediaKind::Photo
            },
            Notice::RetrievalFailed
        ]
    );

    sleep(INTERVAL * 2).await;
    assert!(sender.sent().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_message_is_reused_through_the_lifecycle() {
    let sender = Arc::new(ScriptedSender::default());
    let h = harness(sender, None);

    queued(&h, 9, "a").await;
    sleep(Duration::from_secs(61)).await;

    let records = h.status.notices().await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].edited, None);
    // the "downloading" message becomes the status message
    let handle = records[1].edited;
    assert!(handle.is_some());
    assert!(records[1..].iter().all(|r| r.edited == handle));
    assert!(matches!(
        records[1].notice,
        Notice::Queued {
            position: 1,
            size_bytes: 1024,
            ..
        }
    ));
    assert!(matches!(records[2].notice, Notice::Sent { .. }));
}

#[tokio::test(start_paused = true)]
async fn unreachable_submitter_does_not_stop_delivery_or_cleanup() {
    let sender = Arc::new(ScriptedSender::default());
    let h = harness_with_status(sender.clone(), None, RecordingStatus::failing());

    queued(&h, 4, "a").await;
    queued(&h, 4, "b").await;
    sleep(Duration::from_secs(121)).await;

    assert_eq!(file_names(&sender.sent().await), vec!["a.jpg", "b.jpg"]);
    assert_eq!(h.store.removed().await.len(), 2);
    assert!(h.queue.is_empty().await);

    // every notice was attempted, and none ever had a message to edit
    let records = h.status.notices().await;
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.edited.is_none()));
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_send_and_cleanup() {
    let sender = Arc::new(GatedSender {
        inner: ScriptedSender::default(),
        gate: Semaphore::new(0),
    });
    let h = harness(sender.clone(), None);

    queued(&h, 1, "a").await;
    sleep(Duration::from_secs(61)).await;
    assert_eq!(sender.inner.sent().await.len(), 1);

    let dispatcher = h.dispatcher.clone();
    let stopping = tokio::spawn(async move { dispatcher.shutdown().await });
    sleep(Duration::from_secs(5)).await;
    assert!(!stopping.is_finished());
    assert!(h.store.removed().await.is_empty());

    sender.gate.add_permits(1);
    stopping.await.expect("shutdown task panicked");

    assert_eq!(h.store.removed().await, vec![PathBuf::from("media/a.jpg")]);
    let sent_notice = h
        .status
        .notices()
        .await
        .iter()
        .any(|record| matches!(record.notice, Notice::Sent { .. }));
    assert!(sent_notice);
    assert_eq!(h.dispatcher.activity().await, DispatcherActivity::Idle);
    assert!(!h.dispatcher.ensure_running().await);
}

#[tokio::test(start_paused = true)]
async fn estimate_holds_when_enqueued_as_dispatcher_goes_idle() {
    let sender = Arc::new(ScriptedSender::default());
    let h = harness(sender.clone(), None);

    queued(&h, 1, "a").await;
    // A goes out at 60s; the tick at 120s finds the queue empty
    sleep(Duration::from_secs(120)).await;
    let (_, position, estimated_at) = queued(&h, 1, "b").await;
    assert_eq!(position, 1);

    sleep(Duration::from_secs(121)).await;
    let sent = sender.sent().await;
    assert_eq!(file_names(&sent), vec!["a.jpg", "b.jpg"]);
    let actual = h.clock.base()
        + TimeDelta::from_std(sent[1].at.duration_since(h.started)).unwrap_or_default();
    assert_close_at(estimated_at, actual);
}
