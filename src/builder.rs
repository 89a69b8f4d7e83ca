//! Builder pattern for audio-cat sessions.

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::AudioBackend;
use crate::config::{
    Direction, DEFAULT_CHUNK_BYTES, DEFAULT_CLIENT_NAME, DEFAULT_RING_BUFFER_BYTES, MAX_PORTS,
};
use crate::{event_callback, AudioCatError, EventCallback, Session, SessionConfig, StreamEvent};

/// Default interval between status reports.
const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on one idle wait of the disk thread.
const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(100);

/// Default time teardown waits for the disk thread.
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Builder for configuring and starting a session.
///
/// Use [`AudioCat::builder()`] to create one.
///
/// # Capture Example
///
/// ```ignore
/// use audio_cat::{AudioCat, backend::CpalBackend};
///
/// let session = AudioCat::builder()
///     .capture("take1.raw")
///     .ports(2)
///     .run_time(std::time::Duration::from_secs(30))
///     .start(CpalBackend::open("audio_cat", None)?)?;
/// ```
///
/// # Playback Example
///
/// ```ignore
/// let session = AudioCat::builder()
///     .playback("take1.raw")
///     .connect_to(["system:playback_1", "system:playback_2"])
///     .on_event(|e| tracing::info!(?e, "stream event"))
///     .start(backend)?;
/// ```
#[must_use]
pub struct AudioCatBuilder {
    direction: Option<Direction>,
    path: Option<PathBuf>,
    ports: Option<usize>,
    ring_buffer_bytes: usize,
    chunk_bytes: usize,
    run_time: Option<Duration>,
    client_name: String,
    port_prefix: Option<String>,
    connect: Vec<String>,
    status_interval: Duration,
    idle_wait: Duration,
    join_timeout: Duration,
    event_callback: Option<EventCallback>,
}

impl Default for AudioCatBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCatBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            direction: None,
            path: None,
            ports: None,
            ring_buffer_bytes: DEFAULT_RING_BUFFER_BYTES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            run_time: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            port_prefix: None,
            connect: Vec::new(),
            status_interval: DEFAULT_STATUS_INTERVAL,
            idle_wait: DEFAULT_IDLE_WAIT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            event_callback: None,
        }
    }

    /// Record from the audio graph into `path`.
    pub fn capture(mut self, path: impl Into<PathBuf>) -> Self {
        self.direction = Some(Direction::Capture);
        self.path = Some(path.into());
        self
    }

    /// Play `path` into the audio graph.
    pub fn playback(mut self, path: impl Into<PathBuf>) -> Self {
        self.direction = Some(Direction::Playback);
        self.path = Some(path.into());
        self
    }

    /// Number of ports. Optional when ports to connect are given.
    pub fn ports(mut self, count: usize) -> Self {
        self.ports = Some(count);
        self
    }

    /// Ring buffer capacity in bytes.
    ///
    /// Default: 1 MiB
    pub fn ring_buffer_bytes(mut self, bytes: usize) -> Self {
        self.ring_buffer_bytes = bytes;
        self
    }

    /// Cap on one file read or write, in bytes.
    ///
    /// Default: 1 MiB
    pub fn chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes;
        self
    }

    /// Stop automatically after `limit`.
    pub fn run_time(mut self, limit: Duration) -> Self {
        self.run_time = Some(limit);
        self
    }

    /// Audio client name.
    ///
    /// Default: `audio_cat`
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Name ports `{prefix}_{index}` instead of `{index}`.
    pub fn port_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.port_prefix = Some(prefix.into());
        self
    }

    /// External ports to connect, one per port in order. Their number sets
    /// the port count.
    pub fn connect_to<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connect = ports.into_iter().map(Into::into).collect();
        self
    }

    /// Interval between [`StreamEvent::Status`] reports. Must be non-zero.
    ///
    /// Default: 1 second
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Longest single sleep of the disk thread.
    ///
    /// Default: 100 ms
    pub fn idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    /// How long shutdown waits for the disk thread before detaching it.
    ///
    /// Default: 2 seconds
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set a callback to receive runtime events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Validates the settings and produces the session configuration.
    pub fn build(&self) -> Result<SessionConfig, AudioCatError> {
        let direction = self.direction.ok_or(AudioCatError::MissingDirection)?;
        let path = self.path.clone().ok_or(AudioCatError::MissingPath)?;

        let ports = match (self.ports, self.connect.len()) {
            (Some(count), 0) => count,
            (Some(count), names) if count != names => {
                return Err(AudioCatError::PortCountConflict { count, names });
            }
            (_, 0) => return Err(AudioCatError::MissingPortCount),
            (_, names) => names,
        };
        if !(1..=MAX_PORTS).contains(&ports) {
            return Err(AudioCatError::InvalidPortCount {
                count: ports,
                max: MAX_PORTS,
            });
        }

        if self.ring_buffer_bytes == 0 {
            return Err(AudioCatError::InvalidSize {
                option: "ring buffer",
                value: "0".to_string(),
            });
        }
        if self.chunk_bytes == 0 {
            return Err(AudioCatError::InvalidSize {
                option: "chunk",
                value: "0".to_string(),
            });
        }
        if self.status_interval.is_zero() {
            return Err(AudioCatError::InvalidArgument(
                "status interval must be non-zero".to_string(),
            ));
        }

        Ok(SessionConfig {
            direction,
            path,
            ports,
            ring_buffer_bytes: self.ring_buffer_bytes,
            chunk_bytes: self.chunk_bytes,
            run_time: self.run_time,
            client_name: self.client_name.clone(),
            port_prefix: self.port_prefix.clone(),
            connect: self.connect.clone(),
            status_interval: self.status_interval,
            idle_wait: self.idle_wait,
            join_timeout: self.join_timeout,
        })
    }

    /// Validates the settings and starts streaming on `backend`.
    ///
    /// Opens the file and handles its header, starts the disk thread,
    /// registers and activates the ports, then connects them. If any step
    /// fails, everything already started is torn down before the error is
    /// returned.
    pub fn start<B: AudioBackend>(self, backend: B) -> Result<Session<B::Client>, AudioCatError> {
        let config = self.build()?;
        Session::start(config, backend, self.event_callback)
    }
}

/// Entry point for configuring a session.
///
/// Use [`AudioCat::builder()`] to start.
pub struct AudioCat;

impl AudioCat {
    /// Creates a new builder.
    pub fn builder() -> AudioCatBuilder {
        AudioCatBuilder::new()
    }
}
