//! Status notices sent to submitters.
//!
//! The core decides *what* to tell a submitter; the transport adapter decides
//! how it looks.

use super::item::MediaKind;
use chrono::{DateTime, Utc};

/// One status update for a submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Download of the submission started
    Downloading {
        /// Submitted media kind
        kind: MediaKind,
    },
    /// Submission accepted into the queue
    Queued {
        /// Submitted media kind
        kind: MediaKind,
        /// 1-based position at acceptance
        position: usize,
        /// Point-in-time send estimate
        estimated_at: DateTime<Utc>,
        /// Stored file size
        size_bytes: u64,
        /// User caption, if any
        caption: Option<String>,
    },
    /// Download or local storage failed; nothing was queued
    RetrievalFailed,
    /// Item delivered
    Sent {
        /// Delivered media kind
        kind: MediaKind,
    },
    /// Destination refused the item for good; it was dropped
    DestinationUnreachable {
        /// Dropped media kind
        kind: MediaKind,
    },
    /// Temporary failure; the item stays at the head of the queue
    RetryScheduled {
        /// Retried media kind
        kind: MediaKind,
        /// When the next attempt happens
        next_attempt: DateTime<Utc>,
    },
}
