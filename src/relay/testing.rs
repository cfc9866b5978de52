//! Testing helpers: recording fakes for every collaborator and a clock that
//! follows tokio's (pausable) time.
//!
//! ```rust,ignore
//! use media_relay_bot::relay::testing::{PausedClock, ScriptedSender};
//!
//! let sender = ScriptedSender::with_outcomes(vec![Err(SendError::Transient("503".into()))]);
//! ```

use super::error::{CleanupError, NotifyError, RetrievalError, SendError};
use super::item::{DeliveryTarget, MediaFile, MediaKind, OriginId, RemoteMedia, StatusHandle};
use super::notice::Notice;
use super::ports::{Clock, MediaSender, MediaStore, StatusChannel};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Wall clock derived from `tokio::time::Instant`, so it advances with
/// `tokio::time::advance` and auto-advance in paused tests.
#[derive(Debug, Clone, Copy)]
pub struct PausedClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl PausedClock {
    /// Clock reading a fixed epoch at construction time
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
            started: Instant::now(),
        }
    }

    /// Reading at construction time
    #[must_use]
    pub const fn base(&self) -> DateTime<Utc> {
        self.base
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().duration_since(self.started);
        TimeDelta::from_std(elapsed)
            .ok()
            .and_then(|delta| self.base.checked_add_signed(delta))
            .unwrap_or(self.base)
    }
}

/// One recorded send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Where it was sent
    pub destination: DeliveryTarget,
    /// Photo or video
    pub kind: MediaKind,
    /// Local file handed to the sender
    pub path: PathBuf,
    /// Caption handed to the sender
    pub caption: Option<String>,
    /// Tokio time of the attempt
    pub at: Instant,
}

/// Sender returning scripted outcomes in order, then `Ok(())`
#[derive(Debug, Default)]
pub struct ScriptedSender {
    outcomes: Mutex<VecDeque<Result<(), SendError>>>,
    attempts: Mutex<Vec<SentRecord>>,
}

impl ScriptedSender {
    /// Sender that plays `outcomes` before succeeding forever
    #[must_use]
    pub fn with_outcomes(outcomes: Vec<Result<(), SendError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Every attempt so far, successful or not
    pub async fn sent(&self) -> Vec<SentRecord> {
        self.attempts.lock().await.clone()
    }
}

#[async_trait]
impl MediaSender for ScriptedSender {
    async fn send(
        &self,
        destination: &DeliveryTarget,
        kind: MediaKind,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), SendError> {
        self.attempts.lock().await.push(SentRecord {
            destination: destination.clone(),
            kind,
            path: path.to_path_buf(),
            caption: caption.map(str::to_string),
            at: Instant::now(),
        });
        self.outcomes.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

/// Store that fabricates files without touching the disk and records removals
#[derive(Debug, Default)]
pub struct RecordingStore {
    fail_downloads: bool,
    removed: Mutex<Vec<PathBuf>>,
}

impl RecordingStore {
    /// Store whose every download fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_downloads: true,
            removed: Mutex::new(Vec::new()),
        }
    }

    /// Paths removed so far, in order
    pub async fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().await.clone()
    }
}

#[async_trait]
impl MediaStore for RecordingStore {
    async fn materialize(
        &self,
        remote: &RemoteMedia,
        dest_folder: &Path,
    ) -> Result<MediaFile, RetrievalError> {
        if self.fail_downloads {
            return Err(RetrievalError::Download(format!(
                "cannot fetch {}",
                remote.file_id
            )));
        }
        let name = format!("{}{}", remote.file_id, remote.kind.default_extension());
        Ok(MediaFile::new(dest_folder.join(name), 1024))
    }

    async fn remove(&self, file: MediaFile) -> Result<(), CleanupError> {
        self.removed.lock().await.push(file.into_path());
        Ok(())
    }
}

/// One recorded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeRecord {
    /// Recipient
    pub origin: OriginId,
    /// What was reported
    pub notice: Notice,
    /// Handle the caller asked to edit
    pub edited: Option<StatusHandle>,
}

/// Status channel that records notices and hands out increasing handles
#[derive(Debug)]
pub struct RecordingStatus {
    next_handle: AtomicI32,
    notices: Mutex<Vec<NoticeRecord>>,
    fail: bool,
}

impl Default for RecordingStatus {
    fn default() -> Self {
        Self {
            next_handle: AtomicI32::new(1),
            notices: Mutex::new(Vec::new()),
            fail: false,
        }
    }
}

impl RecordingStatus {
    /// Channel that records every notice but reports failure
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Notices so far, in order
    pub async fn notices(&self) -> Vec<NoticeRecord> {
        self.notices.lock().await.clone()
    }
}

#[async_trait]
impl StatusChannel for RecordingStatus {
    async fn notify(
        &self,
        origin: OriginId,
        notice: &Notice,
        handle: Option<StatusHandle>,
    ) -> Result<StatusHandle, NotifyError> {
        self.notices.lock().await.push(NoticeRecord {
            origin,
            notice: notice.clone(),
            edited: handle,
        });
        if self.fail {
            return Err(NotifyError("status channel down".to_string()));
        }
        Ok(handle.unwrap_or_else(|| StatusHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))))
    }
}
