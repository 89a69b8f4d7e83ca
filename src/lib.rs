//! # audio-cat
//!
//! Streams multi-channel audio between a real-time audio graph and a file,
//! in either direction.
//!
//! `audio-cat` records the ports of an audio client into a simple file
//! (a short `JACK<n>\0` header followed by interleaved native-endian `f32`
//! frames) or plays such a file back, without ever making the audio thread
//! wait for the disk.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audio_cat::{supervise, AudioCat, SuperviseOptions};
//! use audio_cat::backend::CpalBackend;
//!
//! let session = AudioCat::builder()
//!     .capture("take1.raw")
//!     .ports(2)
//!     .on_event(|e| tracing::warn!(?e, "stream event"))
//!     .start(CpalBackend::open("audio_cat", None)?)?;
//!
//! // Runs until a signal, the run-time limit or end of data.
//! let reason = supervise(&session, SuperviseOptions::from_config(session.config())).await;
//! let stats = session.shutdown();
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Audio thread**: the backend's per-period callback; moves one period
//!   into or out of the ring buffer and never blocks
//! - **Ring buffer**: lock-free SPSC byte queue, the only data path
//! - **Disk thread**: blocking file I/O in bounded chunks, woken by a
//!   try-lock signal from the audio thread
//! - **Supervisor**: async loop handling signals, the run-time limit and
//!   status reports
//!
//! A disk that cannot keep up costs dropped capture periods (overflows) or
//! silent playback periods (underruns). It never stalls the audio graph.

// unsafe_code is denied in Cargo.toml; the ring buffer opts in locally.
#![warn(missing_docs)]
// Counters and byte offsets move between usize and u64.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod backend;
mod builder;
pub mod cli;
mod config;
mod error;
mod event;
pub mod format;
mod lifecycle;
mod pipeline;
mod ports;
mod session;

pub use builder::{AudioCat, AudioCatBuilder};
pub use config::{
    parse_size, Direction, SessionConfig, DEFAULT_CHUNK_BYTES, DEFAULT_CLIENT_NAME,
    DEFAULT_RING_BUFFER_BYTES, MAX_PORTS, SAMPLE_BYTES,
};
pub use error::{AudioCatError, BackendError, DiskError, HeaderError};
pub use event::{event_callback, EventCallback, StreamEvent};
pub use lifecycle::{supervise, LifecycleState, StopReason, SuperviseOptions};
pub use pipeline::{
    byte_ring, DiskSignal, ReadRegion, RingReader, RingWriter, SignalGuard, WriteRegion,
};
pub use session::{Session, SessionStats};
