//! Error types for the relay core.
//!
//! Each variant maps to one disposition: retrieval errors end a submission,
//! send errors decide between dropping and requeueing an item, notify and
//! cleanup errors are only logged.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while turning an inbound media reference into local bytes
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The transport could not resolve or download the remote file
    #[error("Download error: {0}")]
    Download(String),
    /// Writing the bytes to local storage failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while removing local media bytes after a terminal disposition
#[derive(Error, Debug)]
#[error("Failed to remove {path}: {source}")]
pub struct CleanupError {
    /// File that could not be removed
    pub path: PathBuf,
    /// Underlying IO error
    #[source]
    pub source: std::io::Error,
}

/// Outcome classification of a failed delivery attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Destination is permanently unreachable; the item is dropped
    #[error("Destination unreachable: {0}")]
    FatalDestination(String),
    /// Anything else; the item is retried on the next tick
    #[error("Transient send error: {0}")]
    Transient(String),
}

/// Failure to deliver a status notification to the submitter
#[derive(Error, Debug)]
#[error("Notify error: {0}")]
pub struct NotifyError(pub String);
