//! Real-time/disk decoupling pipeline.
//!
//! ```text
//! capture:  audio callback → ring buffer → disk writer → file
//! playback: file → disk reader → ring buffer → audio callback
//! ```
//!
//! - **Ring buffer**: lock-free SPSC byte queue, the only data path between
//!   the two threads
//! - **Disk signal**: mutex/condvar pair that lets the disk thread sleep; the
//!   callback only ever tries the lock
//! - **Callback handlers**: one period in or out of the ring per invocation
//! - **Disk workers**: one contiguous span per iteration, blocking I/O
//!
//! The callback never blocks, so a slow disk shows up as overflows or
//! underruns, not as glitches in the audio graph.

mod callback;
pub(crate) mod disk;
mod ring_buffer;
mod wake;

pub(crate) use callback::{CaptureHandler, PlaybackHandler};
pub(crate) use disk::{DiskReader, DiskWorker, DiskWriter};
pub use ring_buffer::{byte_ring, ReadRegion, RingReader, RingWriter, WriteRegion};
pub use wake::{DiskSignal, SignalGuard};
