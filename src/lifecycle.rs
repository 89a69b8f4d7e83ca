//! Session lifecycle and the supervisor that drives it.
//!
//! A session moves through `Init → Running → Draining → Stopped` and never
//! back. [`supervise`] is the non-real-time loop that runs while a session is
//! `Running`: it waits for a termination signal, the optional run-time limit,
//! or a stop requested from inside the pipeline (end of data, fatal disk
//! error), and reports counters on the way.

use std::future::pending;
use std::time::Duration;

use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::backend::ActiveClient;
use crate::{Session, SessionConfig, SessionStats, StreamEvent};

/// Floor for the poll and status intervals; tokio rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Phase of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Resources are being set up.
    #[default]
    Init = 0,
    /// Audio is flowing.
    Running = 1,
    /// Stop was requested; the audio client is being closed and the disk
    /// thread is flushing.
    Draining = 2,
    /// Everything is torn down.
    Stopped = 3,
}

impl LifecycleState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// Interrupt, terminate or hang-up signal.
    Signal = 1,
    /// The run-time limit elapsed.
    Timeout = 2,
    /// Playback reached the end of the file and played what was buffered.
    EndOfData = 3,
    /// The disk thread hit an I/O error it cannot recover from.
    DiskError = 4,
    /// Stopped through the API.
    Requested = 5,
}

impl StopReason {
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Signal),
            2 => Some(Self::Timeout),
            3 => Some(Self::EndOfData),
            4 => Some(Self::DiskError),
            5 => Some(Self::Requested),
            _ => None,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Signal => "termination signal",
            Self::Timeout => "run-time limit reached",
            Self::EndOfData => "end of data",
            Self::DiskError => "disk error",
            Self::Requested => "stop requested",
        };
        f.write_str(text)
    }
}

/// Settings for [`supervise`].
#[derive(Debug, Clone)]
pub struct SuperviseOptions {
    /// Stop with [`StopReason::Timeout`] after this long.
    pub run_time: Option<Duration>,
    /// Interval between [`StreamEvent::Status`] reports.
    pub status_interval: Duration,
    /// How often to check for a stop requested by the pipeline.
    pub poll_interval: Duration,
    /// Listen for termination signals.
    pub handle_signals: bool,
}

impl SuperviseOptions {
    /// Options matching a session's configuration, with signal handling on.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            run_time: config.run_time,
            status_interval: config.status_interval,
            ..Self::default()
        }
    }
}

impl Default for SuperviseOptions {
    fn default() -> Self {
        Self {
            run_time: None,
            status_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
            handle_signals: true,
        }
    }
}

/// Runs until the session is asked to stop and returns the reason.
///
/// Only requests the stop; call [`Session::shutdown`] afterwards to tear the
/// session down.
///
/// # Example
///
/// ```ignore
/// let session = AudioCat::builder().capture("take.raw").ports(2).start(backend)?;
/// let reason = supervise(&session, SuperviseOptions::from_config(session.config())).await;
/// let stats = session.shutdown();
/// ```
pub async fn supervise<C: ActiveClient>(session: &Session<C>, options: SuperviseOptions) -> StopReason {
    let shutdown = termination(options.handle_signals);
    tokio::pin!(shutdown);

    let timer = async {
        match options.run_time {
            Some(limit) => sleep(limit).await,
            None => pending().await,
        }
    };
    tokio::pin!(timer);

    let mut poll = interval(options.poll_interval.max(MIN_INTERVAL));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status = interval(options.status_interval.max(MIN_INTERVAL));
    status.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Both intervals complete their first tick immediately.
    poll.tick().await;
    status.tick().await;

    let mut last = SessionStats::default();
    let mut requested_here = false;

    loop {
        tokio::select! {
            () = &mut shutdown => {
                requested_here = session.request_stop(StopReason::Signal);
            }
            () = &mut timer => {
                requested_here = session.request_stop(StopReason::Timeout);
            }
            _ = poll.tick() => {}
            _ = status.tick() => {
                last = report(session, last);
            }
        }

        if let Some(reason) = session.stop_reason() {
            if !requested_here {
                session.emit(StreamEvent::StopRequested { reason });
            }
            tracing::info!(%reason, "stopping");
            return reason;
        }
    }
}

/// Emits a status report plus overflow/underrun events for counters that
/// moved since `last`.
fn report<C: ActiveClient>(session: &Session<C>, last: SessionStats) -> SessionStats {
    let stats = session.stats();
    tracing::debug!(
        callbacks = stats.callbacks,
        disk_io = stats.disk_io,
        disk_bytes = stats.disk_bytes,
        overflows = stats.overflows,
        underruns = stats.underruns,
        "status"
    );

    if stats.overflows > last.overflows {
        session.emit(StreamEvent::BufferOverflow {
            total: stats.overflows,
        });
    }
    if stats.underruns > last.underruns {
        session.emit(StreamEvent::BufferUnderrun {
            total: stats.underruns,
        });
    }
    session.emit(StreamEvent::Status(stats));
    stats
}

/// Resolves on the first termination signal, or never if `enabled` is false
/// or the handlers cannot be installed.
async fn termination(enabled: bool) {
    if !enabled {
        return pending().await;
    }
    if let Err(e) = wait_for_signal().await {
        tracing::warn!(error = %e, "cannot install signal handlers");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = interrupt.recv() => tracing::debug!("SIGINT received"),
        _ = terminate.recv() => tracing::debug!("SIGTERM received"),
        _ = hangup.recv() => tracing::debug!("SIGHUP received"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
