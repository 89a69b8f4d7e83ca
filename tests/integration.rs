//! Integration tests for audio-cat.
//!
//! Everything runs on the offline backend, which invokes the audio handler
//! only when a test asks for a period. Tests that need real audio hardware
//! live next to the device backend and are `#[ignore]`d.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use audio_cat::backend::{Control, OfflineBackend, OfflineClient};
use audio_cat::{
    supervise, AudioCat, AudioCatBuilder, AudioCatError, LifecycleState, Session, StopReason,
    StreamEvent, SuperviseOptions,
};
use tempfile::tempdir;

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting");
        thread::sleep(Duration::from_millis(1));
    }
}

fn quick(builder: AudioCatBuilder) -> AudioCatBuilder {
    builder
        .idle_wait(Duration::from_millis(5))
        .join_timeout(Duration::from_secs(5))
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn write_take(path: &Path, channels: usize, samples: &[f32]) {
    let mut data = format!("JACK{channels}\0").into_bytes();
    for sample in samples {
        data.extend_from_slice(&sample.to_ne_bytes());
    }
    std::fs::write(path, data).unwrap();
}

/// Feeds one period per port and returns the frames interleaved.
fn capture_period(
    session: &mut Session<OfflineClient>,
    per_port: &[Vec<f32>],
) -> Vec<f32> {
    let ports = session.ports().to_vec();
    let client = session.client_mut().unwrap();
    for (port, samples) in ports.iter().zip(per_port) {
        client.set_input(*port, samples);
    }
    assert_eq!(client.run_period(per_port[0].len()), Control::Continue);

    let frames = per_port[0].len();
    (0..frames)
        .flat_map(|f| per_port.iter().map(move |channel| channel[f]))
        .collect()
}

/// Runs one playback period and returns the control value plus what each
/// port played.
fn playback_period(
    session: &mut Session<OfflineClient>,
    frames: usize,
) -> (Control, Vec<Vec<f32>>) {
    let ports = session.ports().to_vec();
    let client = session.client_mut().unwrap();
    let control = client.run_period(frames);
    let outputs = ports.iter().map(|p| client.output(*p).to_vec()).collect();
    (control, outputs)
}

#[test]
fn test_two_channel_capture_writes_header_and_interleaved_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");

    let mut session = quick(AudioCat::builder().capture(&path).ports(2))
        .start(OfflineBackend::new("test"))
        .unwrap();
    assert_eq!(session.lifecycle(), LifecycleState::Running);

    let mut expected = Vec::new();
    for period in 0..10 {
        let left: Vec<f32> = (0..64).map(|i| (period * 64 + i) as f32).collect();
        let right: Vec<f32> = left.iter().map(|s| -s / 1000.0).collect();
        expected.extend(capture_period(&mut session, &[left, right]));
    }

    let stats = session.shutdown();
    assert_eq!(stats.callbacks, 10);
    assert_eq!(stats.overflows, 0);
    assert!(stats.disk_io >= 1);
    assert_eq!(stats.disk_bytes, 10 * 64 * 2 * 4);
    assert_eq!(stats.lifecycle, LifecycleState::Stopped);
    assert_eq!(stats.stop_reason, Some(StopReason::Requested));

    let data = std::fs::read(&path).unwrap();
    assert_eq!(&data[..6], b"JACK2\0");
    assert_eq!(data.len(), 6 + 10 * 64 * 2 * 4);
    assert_eq!(floats(&data[6..]), expected);
}

#[test]
fn test_one_channel_playback_plays_tail_then_stops() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let samples: Vec<f32> = (1..=100).map(|i| i as f32 / 100.0).collect();
    write_take(&path, 1, &samples);

    let mut session = quick(AudioCat::builder().playback(&path).ports(1))
        .start(OfflineBackend::new("test"))
        .unwrap();
    wait_until(|| session.stats().eof);

    let mut played = Vec::new();
    for _ in 0..3 {
        let (control, outputs) = playback_period(&mut session, 30);
        assert_eq!(control, Control::Continue);
        played.extend(outputs[0].iter().copied());
    }

    let (control, outputs) = playback_period(&mut session, 30);
    assert_eq!(control, Control::Quit);
    assert_eq!(&outputs[0][..10], &samples[90..]);
    assert!(outputs[0][10..].iter().all(|s| *s == 0.0));
    assert_eq!(played, samples[..90]);

    assert_eq!(session.stop_reason(), Some(StopReason::EndOfData));
    assert!(!session.client_mut().unwrap().is_active());

    let stats = session.shutdown();
    assert_eq!(stats.callbacks, 4);
    assert!(stats.eof);
    assert_eq!(stats.disk_bytes, 400);
    assert_eq!(stats.lifecycle, LifecycleState::Stopped);
    assert_eq!(stats.stop_reason, Some(StopReason::EndOfData));
}

#[test]
fn test_ring_smaller_than_a_period_always_overflows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");

    let mut session = quick(
        AudioCat::builder()
            .capture(&path)
            .ports(2)
            .ring_buffer_bytes(100),
    )
    .start(OfflineBackend::new("test"))
    .unwrap();

    for _ in 0..5 {
        capture_period(&mut session, &[vec![0.5; 64], vec![0.5; 64]]);
    }

    let stats = session.shutdown();
    assert_eq!(stats.callbacks, 5);
    assert_eq!(stats.overflows, stats.callbacks);
    assert_eq!(stats.disk_bytes, 0);
    assert_eq!(std::fs::read(&path).unwrap(), b"JACK2\0");
}

#[test]
fn test_capture_then_playback_is_bit_exact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let odd = [
        0.0,
        -0.0,
        1.0,
        -1.0,
        f32::MIN_POSITIVE,
        f32::MAX,
        f32::MIN,
        1e-40,
        std::f32::consts::PI,
    ];

    let mut session = quick(
        AudioCat::builder()
            .capture(&path)
            .ports(3)
            .chunk_bytes(100),
    )
    .start(OfflineBackend::new("rec"))
    .unwrap();

    let mut captured = Vec::new();
    for period in 0..7 {
        let channels: Vec<Vec<f32>> = (0..3)
            .map(|ch| {
                (0..32)
                    .map(|i| odd[(period * 32 + i + ch) % odd.len()] * (ch as f32 + 1.0))
                    .collect()
            })
            .collect();
        captured.extend(capture_period(&mut session, &channels));
    }
    session.shutdown();

    let mut session = quick(AudioCat::builder().playback(&path).ports(3))
        .start(OfflineBackend::new("play"))
        .unwrap();
    wait_until(|| session.stats().eof);

    let mut replayed = Vec::new();
    loop {
        let (control, outputs) = playback_period(&mut session, 32);
        if control == Control::Quit {
            assert!(outputs.iter().flatten().all(|s| *s == 0.0));
            break;
        }
        replayed.extend((0..32).flat_map(|f| outputs.iter().map(move |ch| ch[f])));
    }
    session.shutdown();

    assert_eq!(replayed.len(), captured.len());
    for (a, b) in replayed.iter().zip(&captured) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_second_stop_has_no_effect() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut session = {
        let events = Arc::clone(&events);
        quick(AudioCat::builder().capture(&path).ports(1))
            .on_event(move |e| events.lock().unwrap().push(e))
            .start(OfflineBackend::new("test"))
            .unwrap()
    };
    capture_period(&mut session, &[vec![0.25; 16]]);

    assert!(session.request_stop(StopReason::Signal));
    let first = session.stats();
    assert!(!session.request_stop(StopReason::Signal));
    assert!(!session.request_stop(StopReason::Timeout));
    assert_eq!(session.stats(), first);

    let stats = session.shutdown();
    assert_eq!(stats.stop_reason, Some(StopReason::Signal));
    assert_eq!(stats.callbacks, 1);

    let stops = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, StreamEvent::StopRequested { .. }))
        .count();
    assert_eq!(stops, 1);
}

#[test]
fn test_failed_connection_aborts_startup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let backend = OfflineBackend::new("test").with_external_ports(["system:capture_1"]);

    let result = quick(
        AudioCat::builder()
            .capture(&path)
            .connect_to(["system:capture_1", "system:capture_9"]),
    )
    .start(backend);

    match result {
        Err(AudioCatError::PortConnection { port, external, .. }) => {
            assert_eq!(port, "1");
            assert_eq!(external, "system:capture_9");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("startup should have failed"),
    }
}

#[test]
fn test_connected_ports_follow_names() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let backend = OfflineBackend::new("test")
        .with_external_ports(["system:capture_1", "system:capture_2"]);

    let mut session = quick(
        AudioCat::builder()
            .capture(&path)
            .port_prefix("in")
            .connect_to(["system:capture_1", "system:capture_2"]),
    )
    .start(backend)
    .unwrap();

    let ports = session.ports().to_vec();
    assert_eq!(ports.len(), 2);
    let client = session.client_mut().unwrap();
    assert_eq!(client.port_name(ports[1]).as_deref(), Some("test:in_1"));
    assert_eq!(client.connections(ports[1]), &["system:capture_2".to_string()]);
    session.shutdown();
}

#[test]
fn test_playback_rejects_wrong_channel_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    write_take(&path, 2, &[0.0; 8]);

    let err = quick(AudioCat::builder().playback(&path).ports(1))
        .start(OfflineBackend::new("test"))
        .err()
        .unwrap();
    assert!(matches!(err, AudioCatError::Header { .. }));
    assert!(!err.is_config_error());
}

#[test]
fn test_playback_of_missing_file_fails() {
    let dir = tempdir().unwrap();
    let err = AudioCat::builder()
        .playback(dir.path().join("nope.raw"))
        .ports(1)
        .start(OfflineBackend::new("test"))
        .err()
        .unwrap();
    assert!(matches!(err, AudioCatError::FileOpen { .. }));
}

#[test]
fn test_dropping_session_flushes_capture() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");

    {
        let mut session = quick(AudioCat::builder().capture(&path).ports(1))
            .start(OfflineBackend::new("test"))
            .unwrap();
        capture_period(&mut session, &[vec![2.0; 8]]);
    }

    let data = std::fs::read(&path).unwrap();
    assert_eq!(floats(&data[6..]), vec![2.0; 8]);
}

#[tokio::test]
async fn test_supervise_stops_on_run_time_limit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut session = {
        let events = Arc::clone(&events);
        quick(
            AudioCat::builder()
                .capture(&path)
                .ports(1)
                .ring_buffer_bytes(16),
        )
        .on_event(move |e| events.lock().unwrap().push(e))
        .start(OfflineBackend::new("test"))
        .unwrap()
    };
    // 32 frames never fit in 16 bytes.
    capture_period(&mut session, &[vec![0.0; 32]]);

    let options = SuperviseOptions {
        run_time: Some(Duration::from_millis(100)),
        status_interval: Duration::from_millis(10),
        poll_interval: Duration::from_millis(5),
        handle_signals: false,
    };
    let reason = supervise(&session, options).await;
    assert_eq!(reason, StopReason::Timeout);
    assert_eq!(session.stop_reason(), Some(StopReason::Timeout));
    session.shutdown();

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Status(_))));
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::BufferOverflow { total: 1 })));
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::StopRequested {
            reason: StopReason::Timeout
        }
    )));
}

#[tokio::test]
async fn test_supervise_notices_end_of_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    write_take(&path, 1, &[0.5; 10]);
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut session = {
        let events = Arc::clone(&events);
        quick(AudioCat::builder().playback(&path).ports(1))
            .on_event(move |e| events.lock().unwrap().push(e))
            .start(OfflineBackend::new("test"))
            .unwrap()
    };
    wait_until(|| session.stats().eof);
    let (control, _) = playback_period(&mut session, 16);
    assert_eq!(control, Control::Quit);

    let options = SuperviseOptions {
        run_time: Some(Duration::from_secs(30)),
        poll_interval: Duration::from_millis(5),
        handle_signals: false,
        ..SuperviseOptions::default()
    };
    let reason = supervise(&session, options).await;
    assert_eq!(reason, StopReason::EndOfData);
    session.shutdown();

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(e, StreamEvent::EndOfFile)));
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::StopRequested {
            reason: StopReason::EndOfData
        }
    )));
}

#[tokio::test]
async fn test_supervise_tolerates_zero_intervals() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let session = quick(AudioCat::builder().capture(&path).ports(1))
        .start(OfflineBackend::new("test"))
        .unwrap();

    let options = SuperviseOptions {
        run_time: Some(Duration::from_millis(20)),
        status_interval: Duration::ZERO,
        poll_interval: Duration::ZERO,
        handle_signals: false,
    };
    assert_eq!(supervise(&session, options).await, StopReason::Timeout);
    session.shutdown();
}

#[test]
fn test_zero_status_interval_fails_before_anything_starts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");
    let err = AudioCat::builder()
        .capture(&path)
        .ports(1)
        .status_interval(Duration::ZERO)
        .start(OfflineBackend::new("test"))
        .err()
        .unwrap();
    assert!(matches!(err, AudioCatError::InvalidArgument(_)));
    assert!(!path.exists());
}

#[test]
fn test_periods_after_stop_request_are_still_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("take.raw");

    let mut session = quick(AudioCat::builder().capture(&path).ports(1))
        .start(OfflineBackend::new("test"))
        .unwrap();
    let mut expected = capture_period(&mut session, &[vec![1.0; 16]]);
    assert!(session.request_stop(StopReason::Signal));
    // The client is still active until shutdown closes it.
    expected.extend(capture_period(&mut session, &[vec![2.0; 16]]));

    let stats = session.shutdown();
    assert_eq!(stats.callbacks, 2);
    assert_eq!(stats.overflows, 0);
    assert_eq!(stats.disk_bytes, 2 * 16 * 4);
    assert_eq!(floats(&std::fs::read(&path).unwrap()[6..]), expected);
}
