//! Disk thread: moves bytes between the ring buffer and the file.
//!
//! The thread sleeps on the [`DiskSignal`] while there is nothing to do. The
//! check ("is there data / space?") and the wait happen under one acquisition
//! of the signal's mutex, so a wake-up from the audio callback cannot slip in
//! between them. Waits are bounded by `idle_wait`, which also bounds how long
//! a skipped wake-up or a stop request can go unnoticed.
//!
//! Each iteration moves one contiguous span of the ring, capped at
//! `chunk_bytes`. Blocking file I/O happens with the mutex released.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::format::{read_header, write_header};
use crate::lifecycle::StopReason;
use crate::pipeline::{DiskSignal, RingReader, RingWriter};
use crate::session::SessionState;
use crate::{AudioCatError, DiskError, SessionConfig, StreamEvent};

/// How often [`DiskWorker::join`] checks whether the thread has exited.
const JOIN_POLL: Duration = Duration::from_millis(5);

/// Opens (creating if needed) a capture file for appending and writes the
/// header.
pub(crate) fn create_capture_file(path: &Path, channels: usize) -> Result<File, AudioCatError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| AudioCatError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

    write_header(&mut file, channels).map_err(|source| AudioCatError::Header {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file)
}

/// Opens a file for playback and consumes its header.
pub(crate) fn open_playback_file(path: &Path, channels: usize) -> Result<File, AudioCatError> {
    let mut file = File::open(path).map_err(|source| AudioCatError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;

    read_header(&mut file, channels).map_err(|source| AudioCatError::Header {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file)
}

/// Handle to a running disk thread.
pub(crate) struct DiskWorker {
    handle: JoinHandle<()>,
}

impl DiskWorker {
    fn spawn<F>(name: &str, body: F) -> Result<Self, AudioCatError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(AudioCatError::WorkerSpawn)?;
        Ok(Self { handle })
    }

    /// Waits up to `timeout` for the thread to exit.
    ///
    /// A thread still busy after the deadline (stuck in a file call) is
    /// detached with a warning. Returns `true` if the thread was joined.
    pub fn join(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "disk thread did not stop in time, detaching it"
                );
                return false;
            }
            thread::sleep(JOIN_POLL);
        }
        if self.handle.join().is_err() {
            tracing::error!("disk thread panicked");
        }
        true
    }
}

/// Capture side: drains the ring into the file.
pub(crate) struct DiskWriter<W> {
    file: W,
    path: PathBuf,
    ring: RingReader,
    state: Arc<SessionState>,
    signal: Arc<DiskSignal>,
    chunk_bytes: usize,
    idle_wait: Duration,
}

impl<W: Write + Send + 'static> DiskWriter<W> {
    pub fn new(
        file: W,
        config: &SessionConfig,
        ring: RingReader,
        state: Arc<SessionState>,
        signal: Arc<DiskSignal>,
    ) -> Self {
        Self {
            file,
            path: config.path.clone(),
            ring,
            state,
            signal,
            chunk_bytes: config.chunk_bytes.max(1),
            idle_wait: config.idle_wait,
        }
    }

    pub fn spawn(self) -> Result<DiskWorker, AudioCatError> {
        DiskWorker::spawn("audio-cat-writer", move || self.run())
    }

    fn run(mut self) {
        tracing::info!(path = %self.path.display(), "disk writer started");

        // Keep writing after a stop request until the audio client is closed:
        // periods delivered in between still belong in the file.
        loop {
            {
                let mut guard = self.signal.lock();
                if self.state.is_stopping() && self.state.is_client_closed() {
                    break;
                }
                if self.ring.readable_bytes() == 0 {
                    self.signal.wait(&mut guard, self.idle_wait);
                    continue;
                }
            }
            if let Err(e) = self.write_chunk() {
                self.fail(e);
                return;
            }
        }

        // No callback can run any more; flush what is left.
        let mut remaining = self.ring.readable_bytes();
        while remaining > 0 {
            match self.write_chunk() {
                Ok(written) => remaining = remaining.saturating_sub(written),
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        }
        if let Err(e) = self.file.flush() {
            self.fail(e);
            return;
        }

        tracing::info!(
            path = %self.path.display(),
            bytes = self.state.disk_bytes.load(Ordering::Relaxed),
            "disk writer stopped"
        );
    }

    /// Writes the first contiguous span of buffered data, up to the chunk cap.
    /// Only bytes the file accepted are released from the ring.
    fn write_chunk(&mut self) -> std::io::Result<usize> {
        let (span, _) = self.ring.read_region().spans();
        let requested = span.len().min(self.chunk_bytes);

        let written = loop {
            match self.file.write(&span[..requested]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        };
        if written == 0 && requested > 0 {
            return Err(ErrorKind::WriteZero.into());
        }

        if written < requested {
            tracing::warn!(requested, written, "short write");
            self.state.short_writes.fetch_add(1, Ordering::Relaxed);
            self.state
                .emit(StreamEvent::ShortWrite { requested, written });
        }

        self.ring.advance_read(written);
        self.state.disk_io.fetch_add(1, Ordering::Relaxed);
        self.state
            .disk_bytes
            .fetch_add(written as u64, Ordering::Relaxed);
        tracing::trace!(written, "wrote chunk");
        Ok(written)
    }

    fn fail(&self, source: std::io::Error) {
        let error = DiskError::Write {
            path: self.path.clone(),
            source,
        };
        tracing::error!(error = %error, "disk writer failed");
        self.state.emit(StreamEvent::DiskError {
            error: Arc::new(error),
        });
        self.state.request_stop(StopReason::DiskError);
    }
}

/// Playback side: fills the ring from the file.
pub(crate) struct DiskReader<R> {
    file: R,
    path: PathBuf,
    ring: RingWriter,
    state: Arc<SessionState>,
    signal: Arc<DiskSignal>,
    chunk_bytes: usize,
    idle_wait: Duration,
}

impl<R: Read + Send + 'static> DiskReader<R> {
    pub fn new(
        file: R,
        config: &SessionConfig,
        ring: RingWriter,
        state: Arc<SessionState>,
        signal: Arc<DiskSignal>,
    ) -> Self {
        Self {
            file,
            path: config.path.clone(),
            ring,
            state,
            signal,
            chunk_bytes: config.chunk_bytes.max(1),
            idle_wait: config.idle_wait,
        }
    }

    pub fn spawn(self) -> Result<DiskWorker, AudioCatError> {
        DiskWorker::spawn("audio-cat-reader", move || self.run())
    }

    fn run(mut self) {
        tracing::info!(path = %self.path.display(), "disk reader started");

        loop {
            {
                let mut guard = self.signal.lock();
                if self.state.is_stopping() {
                    break;
                }
                if self.ring.writable_bytes() == 0 {
                    self.signal.wait(&mut guard, self.idle_wait);
                    continue;
                }
            }
            match self.fill_chunk() {
                Ok(0) => {
                    self.state.set_eof();
                    tracing::info!(
                        path = %self.path.display(),
                        bytes = self.state.disk_bytes.load(Ordering::Relaxed),
                        "end of file"
                    );
                    self.state.emit(StreamEvent::EndOfFile);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }

        tracing::info!(path = %self.path.display(), "disk reader stopped");
    }

    /// Reads into the first contiguous span of free space, up to the chunk
    /// cap. Returns 0 at end of file.
    fn fill_chunk(&mut self) -> std::io::Result<usize> {
        let (span, _) = self.ring.write_region().into_spans();
        let len = span.len().min(self.chunk_bytes);

        let read = loop {
            match self.file.read(&mut span[..len]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        };

        if read > 0 {
            self.ring.advance_write(read);
            self.state.disk_io.fetch_add(1, Ordering::Relaxed);
            self.state
                .disk_bytes
                .fetch_add(read as u64, Ordering::Relaxed);
            tracing::trace!(read, "read chunk");
        }
        Ok(read)
    }

    fn fail(&self, source: std::io::Error) {
        let error = DiskError::Read {
            path: self.path.clone(),
            source,
        };
        tracing::error!(error = %error, "disk reader failed");
        self.state.emit(StreamEvent::DiskError {
            error: Arc::new(error),
        });
        self.state.request_stop(StopReason::DiskError);
    }
}
