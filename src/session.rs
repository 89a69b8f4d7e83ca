//! Streaming session management.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::backend::{ActiveClient, AudioBackend, PortDirection, PortId, ProcessHandler};
use crate::config::Direction;
use crate::lifecycle::{LifecycleState, StopReason};
use crate::pipeline::{
    byte_ring, disk, CaptureHandler, DiskReader, DiskSignal, DiskWorker, DiskWriter,
    PlaybackHandler,
};
use crate::ports::{connect_ports, register_ports};
use crate::{AudioCatError, EventCallback, SessionConfig, StreamEvent};

const NO_STOP: u8 = 0;

/// Snapshot of a session's counters.
///
/// The counters are telemetry: they are updated without locking from the
/// audio callback and the disk thread, and a snapshot taken while audio is
/// flowing may be a few updates out of step across fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Audio callback invocations.
    pub callbacks: u64,
    /// Completed disk reads or writes.
    pub disk_io: u64,
    /// Frame bytes moved to or from the file (header excluded).
    pub disk_bytes: u64,
    /// Capture periods dropped because the ring buffer was full.
    pub overflows: u64,
    /// Playback periods with too little data to fill them.
    pub underruns: u64,
    /// Writes the file accepted only partially.
    pub short_writes: u64,
    /// Playback has read the whole file.
    pub eof: bool,
    /// Why the session is stopping, once it is.
    pub stop_reason: Option<StopReason>,
    /// Current phase.
    pub lifecycle: LifecycleState,
}

/// State shared between the session handle, the audio callback and the disk
/// thread.
///
/// `stop_reason` doubles as the stop flag: it is written once, by whoever
/// stops the session first.
pub(crate) struct SessionState {
    lifecycle: AtomicU8,
    stop_reason: AtomicU8,
    eof: AtomicBool,
    client_closed: AtomicBool,
    pub callbacks: AtomicU64,
    pub disk_io: AtomicU64,
    pub disk_bytes: AtomicU64,
    pub overflows: AtomicU64,
    pub underruns: AtomicU64,
    pub short_writes: AtomicU64,
    on_event: Option<EventCallback>,
}

impl SessionState {
    pub fn new(on_event: Option<EventCallback>) -> Self {
        Self {
            lifecycle: AtomicU8::new(LifecycleState::Init as u8),
            stop_reason: AtomicU8::new(NO_STOP),
            eof: AtomicBool::new(false),
            client_closed: AtomicBool::new(false),
            callbacks: AtomicU64::new(0),
            disk_io: AtomicU64::new(0),
            disk_bytes: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
            short_writes: AtomicU64::new(0),
            on_event,
        }
    }

    /// Sets the stop flag. Returns `true` only for the call that set it.
    ///
    /// Lock-free, so the audio callback may call it.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.stop_reason
            .compare_exchange(NO_STOP, reason as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_reason.load(Ordering::Acquire) != NO_STOP
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.stop_reason.load(Ordering::Acquire))
    }

    /// Marks the input file exhausted. The reader calls this after its last
    /// commit to the ring, so a callback that sees the flag also sees every
    /// byte that will ever arrive.
    pub fn set_eof(&self) {
        self.eof.store(true, Ordering::Release);
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire)
    }

    /// Marks the audio client closed: no callback will run after this.
    pub fn set_client_closed(&self) {
        self.client_closed.store(true, Ordering::Release);
    }

    pub fn is_client_closed(&self) -> bool {
        self.client_closed.load(Ordering::Acquire)
    }

    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn set_lifecycle(&self, lifecycle: LifecycleState) {
        self.lifecycle.store(lifecycle as u8, Ordering::Release);
    }

    /// Delivers an event. Never call from the audio callback.
    pub fn emit(&self, event: StreamEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            disk_io: self.disk_io.load(Ordering::Relaxed),
            disk_bytes: self.disk_bytes.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
            eof: self.is_eof(),
            stop_reason: self.stop_reason(),
            lifecycle: self.lifecycle(),
        }
    }
}

/// Handle to a running session.
///
/// Returned by [`AudioCatBuilder::start()`]. Audio flows from the moment it
/// is returned until [`shutdown()`](Session::shutdown) is called or the
/// handle is dropped.
///
/// # Lifecycle
///
/// 1. Created by [`AudioCatBuilder::start()`] (`Init`, then `Running`)
/// 2. Something requests a stop: [`request_stop()`](Session::request_stop),
///    the supervisor, end of data or a disk error
/// 3. [`shutdown()`](Session::shutdown) closes the audio client, lets the
///    disk thread flush and joins it (`Draining`, then `Stopped`)
///
/// Dropping the handle runs the same teardown.
///
/// [`AudioCatBuilder::start()`]: crate::AudioCatBuilder::start
pub struct Session<C: ActiveClient> {
    config: SessionConfig,
    state: Arc<SessionState>,
    signal: Arc<DiskSignal>,
    ports: Vec<PortId>,
    client: Option<C>,
    worker: Option<DiskWorker>,
}

impl<C: ActiveClient> Session<C> {
    /// Sets up every resource and starts audio.
    ///
    /// On error nothing is left running: the disk thread is joined and the
    /// audio client closed before returning.
    pub(crate) fn start<B>(
        config: SessionConfig,
        mut backend: B,
        on_event: Option<EventCallback>,
    ) -> Result<Self, AudioCatError>
    where
        B: AudioBackend<Client = C>,
    {
        let state = Arc::new(SessionState::new(on_event));
        let signal = Arc::new(DiskSignal::new());
        let (ring_writer, ring_reader) = byte_ring(config.ring_buffer_bytes);

        let (handler, worker, ports): (Box<dyn ProcessHandler>, DiskWorker, Vec<PortId>) =
            match config.direction {
                Direction::Capture => {
                    let file = disk::create_capture_file(&config.path, config.ports)?;
                    let ports = register_ports(&mut backend, &config, PortDirection::Input)?;
                    let worker = DiskWriter::new(
                        file,
                        &config,
                        ring_reader,
                        Arc::clone(&state),
                        Arc::clone(&signal),
                    )
                    .spawn()?;
                    let handler = CaptureHandler::new(
                        ring_writer,
                        ports.clone(),
                        Arc::clone(&state),
                        Arc::clone(&signal),
                    );
                    (Box::new(handler), worker, ports)
                }
                Direction::Playback => {
                    let file = disk::open_playback_file(&config.path, config.ports)?;
                    let ports = register_ports(&mut backend, &config, PortDirection::Output)?;
                    let worker = DiskReader::new(
                        file,
                        &config,
                        ring_writer,
                        Arc::clone(&state),
                        Arc::clone(&signal),
                    )
                    .spawn()?;
                    let handler = PlaybackHandler::new(
                        ring_reader,
                        ports.clone(),
                        Arc::clone(&state),
                        Arc::clone(&signal),
                    );
                    (Box::new(handler), worker, ports)
                }
            };

        let client_name = backend.client_name().to_string();
        let mut session = Self {
            config,
            state,
            signal,
            ports,
            client: None,
            worker: Some(worker),
        };

        match backend.activate(handler) {
            Ok(client) => session.client = Some(client),
            Err(e) => {
                session.abort();
                return Err(AudioCatError::Backend(e));
            }
        }

        if let Some(client) = session.client.as_mut() {
            if let Err(e) = connect_ports(client, &session.ports, &session.config) {
                session.abort();
                return Err(e);
            }
        }

        session.state.set_lifecycle(LifecycleState::Running);
        tracing::info!(
            client = %client_name,
            direction = %session.config.direction,
            ports = session.config.ports,
            path = %session.config.path.display(),
            "session running"
        );
        Ok(session)
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The registered ports, in channel order.
    pub fn ports(&self) -> &[PortId] {
        &self.ports
    }

    /// Current counters.
    pub fn stats(&self) -> SessionStats {
        self.state.stats()
    }

    /// Current phase.
    pub fn lifecycle(&self) -> LifecycleState {
        self.state.lifecycle()
    }

    /// Returns `true` once any stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.state.is_stopping()
    }

    /// Why the session is stopping, if it is.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.stop_reason()
    }

    /// Asks the session to stop. Only the first request has any effect;
    /// returns `true` for that one.
    ///
    /// This does not tear anything down; call [`shutdown()`](Self::shutdown).
    pub fn request_stop(&self, reason: StopReason) -> bool {
        if !self.state.request_stop(reason) {
            return false;
        }
        self.state.emit(StreamEvent::StopRequested { reason });
        self.signal.try_notify();
        true
    }

    /// The running audio client, until shutdown.
    pub fn client_mut(&mut self) -> Option<&mut C> {
        self.client.as_mut()
    }

    /// Tears the session down and returns the final counters.
    ///
    /// Sets the stop flag if nothing has yet, deactivates and closes the audio
    /// client, wakes the disk thread and waits up to the configured join
    /// timeout for it to flush and exit.
    pub fn shutdown(mut self) -> SessionStats {
        self.request_stop(StopReason::Requested);
        self.teardown();
        let stats = self.state.stats();
        tracing::info!(
            callbacks = stats.callbacks,
            disk_io = stats.disk_io,
            disk_bytes = stats.disk_bytes,
            overflows = stats.overflows,
            underruns = stats.underruns,
            "session stopped"
        );
        stats
    }

    pub(crate) fn emit(&self, event: StreamEvent) {
        self.state.emit(event);
    }

    /// Teardown after a failed startup: no events, no logging.
    fn abort(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.client.is_none() && self.worker.is_none() {
            return;
        }
        self.state.request_stop(StopReason::Requested);
        self.state.set_lifecycle(LifecycleState::Draining);

        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.deactivate() {
                tracing::warn!(error = %e, "failed to deactivate audio client");
            }
        }
        self.state.set_client_closed();

        self.signal.try_notify();
        if let Some(worker) = self.worker.take() {
            worker.join(self.config.join_timeout);
        }
        self.state.set_lifecycle(LifecycleState::Stopped);
    }
}

impl<C: ActiveClient> Drop for Session<C> {
    fn drop(&mut self) {
        if self.client.is_some() || self.worker.is_some() {
            // Dropped without shutdown()
            self.teardown();
        }
    }
}
