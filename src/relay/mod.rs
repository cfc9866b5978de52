//! Rate-limited media relay core
//!
//! Holds pending submissions in a FIFO [`DeliveryQueue`], drains it one item per
//! interval with a single-flight [`Dispatcher`] and reports positions and send
//! times through [`StatusReporter`]. Transport and file storage are reached only
//! through the capability traits in [`ports`], so everything here is
//! transport-agnostic.

/// Dispatch loop with Idle/Running states
pub mod dispatcher;
/// Error taxonomy shared by the core and its collaborators
pub mod error;
/// Delivery time estimation
pub mod estimator;
/// Submission pipeline (download, enqueue, notify)
pub mod intake;
/// Queue item and identifier types
pub mod item;
/// Status notices for submitters
pub mod notice;
/// Capability traits implemented by transport adapters
pub mod ports;
/// Ordered pending-item queue
pub mod queue;
/// Human-facing queue summaries
pub mod status;
/// Fakes and a paused-time clock for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatcher::{DispatchSettings, Dispatcher, DispatcherActivity};
pub use error::{CleanupError, NotifyError, RetrievalError, SendError};
pub use estimator::{estimate, time_until_next_attempt};
pub use intake::{Intake, SubmissionOutcome};
pub use item::{DeliveryTarget, MediaFile, MediaKind, OriginId, QueueItem, RemoteMedia, StatusHandle};
pub use notice::Notice;
pub use ports::{Clock, MediaSender, MediaStore, RelayPorts, StatusChannel, SystemClock};
pub use queue::{DeliveryQueue, EnqueueSlot, QueuedSummary};
pub use status::{ItemEstimate, QueueReport, StatusReporter};
