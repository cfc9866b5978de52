//! Queue item and identifier types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Conversation that submitted an item and receives its status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginId(pub i64);

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an editable status message shown to the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusHandle(pub i32);

/// Kind of media carried by an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Still image
    Photo,
    /// Video clip
    Video,
}

impl MediaKind {
    /// Lowercase label used in file names and logs
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    /// Extension used when the remote path has none
    #[must_use]
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Photo => ".jpg",
            Self::Video => ".mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inbound media reference as received from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMedia {
    /// Transport-specific file identifier
    pub file_id: String,
    /// Kind of media behind the identifier
    pub kind: MediaKind,
}

/// Downloaded media bytes on local storage.
///
/// Deliberately not `Clone`: the value is consumed by
/// [`crate::relay::MediaStore::remove`], which makes removal exactly-once.
#[derive(Debug, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
    size_bytes: u64,
}

impl MediaFile {
    /// Wraps an already written file
    #[must_use]
    pub const fn new(path: PathBuf, size_bytes: u64) -> Self {
        Self { path, size_bytes }
    }

    /// Location of the bytes
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size computed once after download
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Gives up ownership of the path
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// One pending delivery
#[derive(Debug)]
pub struct QueueItem {
    /// Stable identifier used by status lookups
    pub id: Uuid,
    /// Submitter conversation
    pub origin: OriginId,
    /// Local bytes, owned until terminal disposition
    pub file: MediaFile,
    /// Photo or video
    pub kind: MediaKind,
    /// Moment the item was accepted into the queue
    pub enqueued_at: DateTime<Utc>,
    /// User caption forwarded verbatim
    pub caption: Option<String>,
    /// Editable status message, if one exists
    pub status: Option<StatusHandle>,
}

impl QueueItem {
    /// Creates an item with a fresh id
    #[must_use]
    pub fn new(
        origin: OriginId,
        file: MediaFile,
        kind: MediaKind,
        enqueued_at: DateTime<Utc>,
        caption: Option<String>,
        status: Option<StatusHandle>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            file,
            kind,
            enqueued_at,
            caption: caption.filter(|c| !c.is_empty()),
            status,
        }
    }
}

/// Where a sent item ends up
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryTarget {
    /// Numeric chat id (user, group or channel)
    Chat(i64),
    /// Public channel username, e.g. `@my_channel`
    Channel(String),
}

impl DeliveryTarget {
    /// Parses a configured destination: numeric ids become [`Self::Chat`],
    /// anything else a channel username. Blank input means "no destination".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(id) = raw.parse::<i64>() {
            return Some(Self::Chat(id));
        }
        if raw.starts_with('@') {
            Some(Self::Channel(raw.to_string()))
        } else {
            Some(Self::Channel(format!("@{raw}")))
        }
    }

    /// Configured destination, or the submitter itself in reply mode
    #[must_use]
    pub fn resolve(configured: Option<&Self>, origin: OriginId) -> Self {
        configured.cloned().unwrap_or(Self::Chat(origin.0))
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "{id}"),
            Self::Channel(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_target_parsing() {
        assert_eq!(
            DeliveryTarget::parse("-1001234567890"),
            Some(DeliveryTarget::Chat(-1_001_234_567_890))
        );
        assert_eq!(
            DeliveryTarget::parse("@memes"),
            Some(DeliveryTarget::Channel("@memes".to_string()))
        );
        assert_eq!(
            DeliveryTarget::parse("memes"),
            Some(DeliveryTarget::Channel("@memes".to_string()))
        );
        assert_eq!(DeliveryTarget::parse("  "), None);
    }

    #[test]
    fn test_resolve_falls_back_to_origin() {
        let origin = OriginId(42);
        assert_eq!(
            DeliveryTarget::resolve(None, origin),
            DeliveryTarget::Chat(42)
        );
        let channel = DeliveryTarget::Channel("@memes".to_string());
        assert_eq!(DeliveryTarget::resolve(Some(&channel), origin), channel);
    }

    #[test]
    fn test_empty_caption_is_dropped() {
        let item = QueueItem::new(
            OriginId(1),
            MediaFile::new(PathBuf::from("a.jpg"), 10),
            MediaKind::Photo,
            Utc::now(),
            Some(String::new()),
            None,
        );
        assert!(item.caption.is_none());
    }
}
