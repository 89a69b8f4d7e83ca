//! `audio-cat`: stream audio between the audio graph and a file.

use std::process::ExitCode;

use audio_cat::backend::{list_devices, CpalBackend, PortDirection};
use audio_cat::cli::{self, CliArgs, CliCommand};
use audio_cat::{
    supervise, AudioCatError, BackendError, Direction, StreamEvent, SuperviseOptions,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(CliCommand::Run(args)) => args,
        Ok(CliCommand::Help) => {
            println!("{}", cli::HELP);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("audio-cat: {e}");
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_config_error() => {
            eprintln!("audio-cat: {e}");
            eprintln!("{}", cli::USAGE);
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!(error = %e, "setup failed");
            if let AudioCatError::Backend(BackendError::DeviceNotFound { .. }) = e {
                log_available_devices(&args);
            }
            ExitCode::from(1)
        }
    }
}

async fn run(args: &CliArgs) -> Result<(), AudioCatError> {
    let builder = args.builder().on_event(log_event);
    let config = builder.build()?;

    let backend = CpalBackend::open(&config.client_name, args.device.as_deref())?;
    let session = builder.start(backend)?;

    let reason = supervise(&session, SuperviseOptions::from_config(session.config())).await;
    let stats = session.shutdown();
    tracing::info!(
        %reason,
        callbacks = stats.callbacks,
        disk_io = stats.disk_io,
        disk_bytes = stats.disk_bytes,
        overflows = stats.overflows,
        underruns = stats.underruns,
        "done"
    );
    Ok(())
}

fn log_event(event: StreamEvent) {
    match event {
        StreamEvent::Status(stats) => tracing::info!(
            callbacks = stats.callbacks,
            disk_io = stats.disk_io,
            disk_bytes = stats.disk_bytes,
            overflows = stats.overflows,
            underruns = stats.underruns,
            "status"
        ),
        StreamEvent::BufferOverflow { total } => {
            tracing::warn!(total, "ring buffer overflow, capture periods dropped");
        }
        StreamEvent::BufferUnderrun { total } => {
            tracing::warn!(total, "ring buffer underrun, playback periods silenced");
        }
        StreamEvent::StopRequested { reason } => tracing::info!(%reason, "stop requested"),
        // Already logged where they happen.
        StreamEvent::ShortWrite { .. } | StreamEvent::DiskError { .. } | StreamEvent::EndOfFile => {}
    }
}

fn log_available_devices(args: &CliArgs) {
    let direction = match args.io {
        Some((Direction::Playback, _)) => PortDirection::Output,
        _ => PortDirection::Input,
    };
    match list_devices(direction) {
        Ok(devices) => tracing::info!(?devices, "available devices"),
        Err(e) => tracing::warn!(error = %e, "cannot list devices"),
    }
}
