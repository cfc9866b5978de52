//! Capability traits the core calls into.
//!
//! The Telegram adapters in [`crate::bot::transport`] implement these for
//! production; tests use mocks or recording fakes.

use super::error::{CleanupError, NotifyError, RetrievalError, SendError};
use super::item::{DeliveryTarget, MediaFile, MediaKind, OriginId, RemoteMedia, StatusHandle};
use super::notice::Notice;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Resolves remote media to local bytes and removes them afterwards
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Downloads `remote` into `dest_folder`
    async fn materialize(
        &self,
        remote: &RemoteMedia,
        dest_folder: &Path,
    ) -> Result<MediaFile, RetrievalError>;

    /// Removes local bytes; consumes the file so it can only happen once
    async fn remove(&self, file: MediaFile) -> Result<(), CleanupError>;
}

/// Transmits one media file to its destination
#[async_trait]
pub trait MediaSender: Send + Sync {
    /// Sends the file, classifying any failure as fatal or transient
    async fn send(
        &self,
        destination: &DeliveryTarget,
        kind: MediaKind,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), SendError>;
}

/// Delivers status notices to a submitter
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Renders `notice` and edits the message behind `handle` when present,
    /// otherwise (or when the edit fails) posts a new message. Returns the
    /// handle of the message now showing the notice.
    async fn notify(
        &self,
        origin: OriginId,
        notice: &Notice,
        handle: Option<StatusHandle>,
    ) -> Result<StatusHandle, NotifyError>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Bundle of collaborators shared by intake and dispatcher
#[derive(Clone)]
pub struct RelayPorts {
    /// File retrieval and cleanup
    pub store: Arc<dyn MediaStore>,
    /// Delivery to the destination
    pub sender: Arc<dyn MediaSender>,
    /// Submitter notifications
    pub status: Arc<dyn StatusChannel>,
    /// Time source for timestamps and estimates
    pub clock: Arc<dyn Clock>,
}
