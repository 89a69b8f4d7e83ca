//! Error types for audio-cat.
//!
//! Errors are split the same way the pipeline splits its failures:
//! - **Fatal errors** ([`AudioCatError`]): configuration or setup problems that
//!   prevent a session from starting
//! - **Recoverable disk errors** ([`DiskError`]): surfaced through
//!   [`StreamEvent`](crate::StreamEvent) and the stop flag, never returned to
//!   the audio side
//!
//! Overflow and underrun are not errors at all; they are counted in
//! [`SessionStats`](crate::SessionStats).

use std::path::PathBuf;

/// Fatal errors that prevent a session from starting.
///
/// Returned from [`AudioCatBuilder::build()`] and [`AudioCatBuilder::start()`].
/// When `start()` fails nothing is left running: the disk thread has been
/// joined and the audio client closed.
///
/// [`AudioCatBuilder::build()`]: crate::AudioCatBuilder::build
/// [`AudioCatBuilder::start()`]: crate::AudioCatBuilder::start
#[derive(Debug, thiserror::Error)]
pub enum AudioCatError {
    /// Neither capture nor playback was selected.
    #[error("an I/O direction is required (capture or playback)")]
    MissingDirection,

    /// No file path was given.
    #[error("a file path is required")]
    MissingPath,

    /// Neither a port count nor a list of ports to connect was given.
    #[error("either a port count or a list of ports to connect is required")]
    MissingPortCount,

    /// The port count is outside `1..=MAX_PORTS`.
    #[error("port count {count} is out of range (1..={max})")]
    InvalidPortCount {
        /// The rejected count.
        count: usize,
        /// Upper bound.
        max: usize,
    },

    /// An explicit port count disagrees with the list of ports to connect.
    #[error("port count {count} conflicts with {names} port names to connect")]
    PortCountConflict {
        /// Count given explicitly.
        count: usize,
        /// Number of external port names given.
        names: usize,
    },

    /// A size option was zero or could not be parsed.
    #[error("invalid size for {option}: {value}")]
    InvalidSize {
        /// Which option carried the value.
        option: &'static str,
        /// The value as given.
        value: String,
    },

    /// A command-line argument could not be understood.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The data file could not be opened or created.
    #[error("cannot open {path}: {source}")]
    FileOpen {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file header could not be written or read back.
    #[error("{path}: {source}")]
    Header {
        /// Path to the file.
        path: PathBuf,
        /// What went wrong with the header.
        #[source]
        source: HeaderError,
    },

    /// The audio backend failed during setup.
    #[error("audio backend error: {0}")]
    Backend(#[from] BackendError),

    /// A port could not be registered with the audio backend.
    #[error("cannot register port {port}: {source}")]
    PortRegistration {
        /// Name of the port.
        port: String,
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// A port could not be connected to the requested external port.
    #[error("cannot connect {port} to {external}: {source}")]
    PortConnection {
        /// Name of our port.
        port: String,
        /// Name of the external port.
        external: String,
        /// Backend failure.
        #[source]
        source: BackendError,
    },

    /// The disk thread could not be spawned.
    #[error("cannot spawn disk thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl AudioCatError {
    /// Returns `true` for errors caused by the configuration rather than by
    /// the environment (file system, audio server).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingDirection
                | Self::MissingPath
                | Self::MissingPortCount
                | Self::InvalidPortCount { .. }
                | Self::PortCountConflict { .. }
                | Self::InvalidSize { .. }
                | Self::InvalidArgument(_)
        )
    }
}

/// Problems with the `JACK<n>\0` file header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// Fewer bytes than a complete header were available.
    #[error("truncated header ({len} bytes)")]
    Truncated {
        /// Bytes actually read.
        len: usize,
    },

    /// The file does not start with the expected tag.
    #[error("not an audio-cat file (bad magic)")]
    BadMagic,

    /// The channel count field is not one or two decimal digits.
    #[error("malformed channel count in header")]
    BadChannelCount,

    /// The file was written with a different number of channels.
    #[error("file has {found} channels, session expects {expected}")]
    ChannelMismatch {
        /// Port count of the session.
        expected: usize,
        /// Channel count found in the header.
        found: usize,
    },

    /// I/O failure while reading or writing the header.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors reported by an [`AudioBackend`](crate::backend::AudioBackend).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The client session could not be opened.
    #[error("cannot open audio client: {0}")]
    ClientOpen(String),

    /// The requested audio device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default device is configured for the requested direction.
    #[error("no default {direction} device configured")]
    NoDefaultDevice {
        /// `"input"` or `"output"`.
        direction: &'static str,
    },

    /// The port could not be registered.
    #[error("{0}")]
    PortRegistration(String),

    /// A named external port does not exist or refused the connection.
    #[error("no such port: {0}")]
    NoSuchPort(String),

    /// The backend cannot wire ports by name.
    #[error("this backend cannot connect ports by name")]
    ConnectUnsupported,

    /// The stream could not be built or started.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Runtime failures of the disk worker.
///
/// These never reach the audio callback. The worker reports them through
/// [`StreamEvent::DiskError`](crate::StreamEvent::DiskError) and, when
/// forward progress is impossible, sets the stop flag.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    /// Writing frame data to the file failed.
    #[error("write failed: {path}: {source}")]
    Write {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading frame data from the file failed.
    #[error("read failed: {path}: {source}")]
    Read {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
