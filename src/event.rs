//! Runtime events for monitoring a session.
//!
//! Events are notifications, not failures: the session keeps running after
//! any of them except the stop-related ones. They are emitted from the disk
//! thread and the supervisor, never from the audio callback.

use std::sync::Arc;

use crate::{DiskError, SessionStats, StopReason};

/// Runtime events emitted during a session.
///
/// # Example
///
/// ```
/// use audio_cat::StreamEvent;
///
/// fn handle_event(event: StreamEvent) {
///     match event {
///         StreamEvent::Status(stats) => {
///             eprintln!("{} callbacks, {} bytes on disk", stats.callbacks, stats.disk_bytes);
///         }
///         StreamEvent::BufferOverflow { total } => eprintln!("{total} periods dropped"),
///         StreamEvent::BufferUnderrun { total } => eprintln!("{total} periods silenced"),
///         StreamEvent::ShortWrite { requested, written } => {
///             eprintln!("short write: {written} of {requested} bytes");
///         }
///         StreamEvent::DiskError { error } => eprintln!("disk error: {error}"),
///         StreamEvent::EndOfFile => eprintln!("end of file"),
///         StreamEvent::StopRequested { reason } => eprintln!("stopping: {reason}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Periodic counter snapshot.
    Status(SessionStats),

    /// Capture periods were dropped because the ring buffer was full.
    ///
    /// Emitted when the overflow counter has moved since the last report.
    /// A ring that is too small for the disk's latency shows up here.
    BufferOverflow {
        /// Overflows so far.
        total: u64,
    },

    /// Playback periods were silenced because the ring buffer ran dry.
    BufferUnderrun {
        /// Underruns so far.
        total: u64,
    },

    /// The file accepted fewer bytes than offered. Only the accepted bytes
    /// were consumed; the rest is retried.
    ShortWrite {
        /// Bytes offered.
        requested: usize,
        /// Bytes accepted.
        written: usize,
    },

    /// A disk operation failed and the session is stopping.
    DiskError {
        /// The failure.
        error: Arc<DiskError>,
    },

    /// Playback read the last byte of the file.
    EndOfFile,

    /// The session was asked to stop.
    StopRequested {
        /// Why.
        reason: StopReason,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one with [`AudioCatBuilder::on_event()`].
///
/// [`AudioCatBuilder::on_event()`]: crate::AudioCatBuilder::on_event
pub type EventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use audio_cat::{event_callback, StreamEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(StreamEvent::EndOfFile);
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
