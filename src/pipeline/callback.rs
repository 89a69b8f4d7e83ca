//! Per-period audio handlers.
//!
//! Both run on the audio backend's real-time thread. They touch nothing but
//! the ring buffer, relaxed counters and the non-blocking wake-up: no locks
//! they could wait on, no allocation, no I/O, no logging.
//!
//! A period either moves completely or not at all. Capture drops the whole
//! period when the ring cannot take it; playback silences the whole period
//! when the ring cannot supply it. Frames are interleaved in the ring: for
//! frame `f` and port `p`, the sample sits at byte `(f * ports + p) * 4`.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::backend::{Control, PortId, ProcessHandler, ProcessScope};
use crate::config::SAMPLE_BYTES;
use crate::format::{decode_sample, encode_sample};
use crate::lifecycle::StopReason;
use crate::pipeline::{DiskSignal, RingReader, RingWriter};
use crate::session::SessionState;

/// Moves one period from the input ports into the ring.
pub(crate) struct CaptureHandler {
    ring: RingWriter,
    ports: Vec<PortId>,
    state: Arc<SessionState>,
    signal: Arc<DiskSignal>,
}

impl CaptureHandler {
    pub fn new(
        ring: RingWriter,
        ports: Vec<PortId>,
        state: Arc<SessionState>,
        signal: Arc<DiskSignal>,
    ) -> Self {
        Self {
            ring,
            ports,
            state,
            signal,
        }
    }
}

impl ProcessHandler for CaptureHandler {
    fn process(&mut self, scope: &mut dyn ProcessScope) -> Control {
        self.state.callbacks.fetch_add(1, Ordering::Relaxed);

        let frames = scope.frames();
        let channels = self.ports.len();
        let required = frames * channels * SAMPLE_BYTES;

        if self.ring.writable_bytes() < required {
            self.state.overflows.fetch_add(1, Ordering::Relaxed);
            return Control::Continue;
        }

        {
            let mut region = self.ring.write_region();
            for (channel, &port) in self.ports.iter().enumerate() {
                let input = scope.input(port);
                for frame in 0..frames {
                    let sample = input.get(frame).unwrap_or(0.0);
                    let offset = (frame * channels + channel) * SAMPLE_BYTES;
                    region.put(offset, &encode_sample(sample));
                }
            }
        }
        self.ring.advance_write(required);

        self.signal.try_notify();
        Control::Continue
    }
}

/// Moves one period from the ring to the output ports.
pub(crate) struct PlaybackHandler {
    ring: RingReader,
    ports: Vec<PortId>,
    state: Arc<SessionState>,
    signal: Arc<DiskSignal>,
}

impl PlaybackHandler {
    pub fn new(
        ring: RingReader,
        ports: Vec<PortId>,
        state: Arc<SessionState>,
        signal: Arc<DiskSignal>,
    ) -> Self {
        Self {
            ring,
            ports,
            state,
            signal,
        }
    }

    /// Copies `frames` whole frames from the ring into the outputs and pads
    /// the rest of the period with silence. Does not commit the read.
    fn fill(&self, scope: &mut dyn ProcessScope, frames: usize) {
        let channels = self.ports.len();
        let region = self.ring.read_region();
        for (channel, &port) in self.ports.iter().enumerate() {
            let mut output = scope.output(port);
            for (frame, slot) in output.iter_mut().enumerate() {
                *slot = if frame < frames {
                    let mut raw = [0u8; SAMPLE_BYTES];
                    region.get((frame * channels + channel) * SAMPLE_BYTES, &mut raw);
                    decode_sample(&raw)
                } else {
                    0.0
                };
            }
        }
    }
}

impl ProcessHandler for PlaybackHandler {
    fn process(&mut self, scope: &mut dyn ProcessScope) -> Control {
        self.state.callbacks.fetch_add(1, Ordering::Relaxed);

        let frames = scope.frames();
        let frame_bytes = self.ports.len() * SAMPLE_BYTES;
        let required = frames * frame_bytes;

        // Load eof before the fill level: once the flag is seen, nothing more
        // will be written and the level below is final.
        let eof = self.state.is_eof();
        let readable = self.ring.readable_bytes();

        if readable < required {
            self.state.underruns.fetch_add(1, Ordering::Relaxed);
            if !eof {
                for &port in &self.ports {
                    scope.output(port).fill(0.0);
                }
                return Control::Continue;
            }

            // Play the buffered tail, then stop.
            let tail_frames = if frame_bytes == 0 { 0 } else { readable / frame_bytes };
            self.fill(scope, tail_frames);
            self.ring.advance_read(tail_frames * frame_bytes);
            self.state.request_stop(StopReason::EndOfData);
            self.signal.try_notify();
            return Control::Quit;
        }

        self.fill(scope, frames);
        self.ring.advance_read(required);

        self.signal.try_notify();
        Control::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PortBuffer, PortBufferMut};
    use crate::pipeline::byte_ring;

    /// Planar in-memory buffers, one per port.
    struct TestScope {
        frames: usize,
        inputs: Vec<Vec<f32>>,
        outputs: Vec<Vec<f32>>,
    }

    impl TestScope {
        fn capture(inputs: Vec<Vec<f32>>) -> Self {
            Self {
                frames: inputs[0].len(),
                inputs,
                outputs: Vec::new(),
            }
        }

        fn playback(ports: usize, frames: usize) -> Self {
            Self {
                frames,
                inputs: Vec::new(),
                outputs: vec![vec![f32::NAN; frames]; ports],
            }
        }
    }

    impl ProcessScope for TestScope {
        fn frames(&self) -> usize {
            self.frames
        }

        fn input(&self, port: PortId) -> PortBuffer<'_> {
            self.inputs
                .get(port.0)
                .map_or_else(PortBuffer::empty, |b| PortBuffer::planar(b))
        }

        fn output(&mut self, port: PortId) -> PortBufferMut<'_> {
            self.outputs
                .get_mut(port.0)
                .map_or_else(PortBufferMut::empty, |b| PortBufferMut::planar(b))
        }
    }

    fn ports(n: usize) -> Vec<PortId> {
        (0..n).map(PortId).collect()
    }

    fn shared() -> (Arc<SessionState>, Arc<DiskSignal>) {
        (
            Arc::new(SessionState::new(None)),
            Arc::new(DiskSignal::new()),
        )
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes.chunks_exact(4).map(decode_sample).collect()
    }

    fn bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| encode_sample(*s)).collect()
    }

    #[test]
    fn test_capture_interleaves_frames() {
        let (state, signal) = shared();
        let (writer, mut reader) = byte_ring(1024);
        let mut handler = CaptureHandler::new(writer, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::capture(vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]);
        assert_eq!(handler.process(&mut scope), Control::Continue);

        let mut out = vec![0u8; reader.readable_bytes()];
        reader.read(&mut out);
        assert_eq!(floats(&out), vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(state.callbacks.load(Ordering::Relaxed), 1);
        assert_eq!(state.overflows.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_capture_exact_space_fits() {
        let (state, signal) = shared();
        // 4 frames x 2 ports x 4 bytes
        let (writer, reader) = byte_ring(32);
        let mut handler = CaptureHandler::new(writer, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::capture(vec![vec![0.5; 4], vec![0.25; 4]]);
        handler.process(&mut scope);
        assert_eq!(state.overflows.load(Ordering::Relaxed), 0);
        assert_eq!(reader.readable_bytes(), 32);
    }

    #[test]
    fn test_capture_one_byte_short_overflows() {
        let (state, signal) = shared();
        let (mut writer, reader) = byte_ring(33);
        writer.write(&[0xEE; 2]);
        let mut handler = CaptureHandler::new(writer, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::capture(vec![vec![0.5; 4], vec![0.25; 4]]);
        assert_eq!(handler.process(&mut scope), Control::Continue);
        assert_eq!(state.overflows.load(Ordering::Relaxed), 1);
        assert_eq!(reader.readable_bytes(), 2);
    }

    #[test]
    fn test_capture_across_wrap_point() {
        let (state, signal) = shared();
        let (mut writer, mut reader) = byte_ring(12);
        writer.write(&[0; 8]);
        reader.advance_read(8);
        let mut handler = CaptureHandler::new(writer, ports(1), state, signal);

        let mut scope = TestScope::capture(vec![vec![1.0, 2.0, 3.0]]);
        handler.process(&mut scope);

        let mut out = [0u8; 12];
        assert_eq!(reader.read(&mut out), 12);
        assert_eq!(floats(&out), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_playback_deinterleaves_frames() {
        let (state, signal) = shared();
        let (mut writer, reader) = byte_ring(1024);
        writer.write(&bytes(&[1.0, -1.0, 2.0, -2.0]));
        let mut handler = PlaybackHandler::new(reader, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::playback(2, 2);
        assert_eq!(handler.process(&mut scope), Control::Continue);
        assert_eq!(scope.outputs, vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);
        assert_eq!(writer.writable_bytes(), 1024);
    }

    #[test]
    fn test_playback_exact_data_plays() {
        let (state, signal) = shared();
        let (mut writer, reader) = byte_ring(64);
        writer.write(&bytes(&[0.5; 8]));
        let mut handler = PlaybackHandler::new(reader, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::playback(2, 4);
        handler.process(&mut scope);
        assert_eq!(state.underruns.load(Ordering::Relaxed), 0);
        assert_eq!(scope.outputs, vec![vec![0.5; 4], vec![0.5; 4]]);
    }

    #[test]
    fn test_playback_one_byte_short_underruns_with_silence() {
        let (state, signal) = shared();
        let (mut writer, reader) = byte_ring(64);
        writer.write(&bytes(&[0.5; 8])[..31]);
        let mut handler = PlaybackHandler::new(reader, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::playback(2, 4);
        assert_eq!(handler.process(&mut scope), Control::Continue);
        assert_eq!(state.underruns.load(Ordering::Relaxed), 1);
        assert_eq!(scope.outputs, vec![vec![0.0; 4], vec![0.0; 4]]);
        // Nothing consumed.
        assert_eq!(writer.writable_bytes(), 64 - 31);
        assert!(!state.is_stopping());
    }

    #[test]
    fn test_playback_tail_after_eof_then_quit() {
        let (state, signal) = shared();
        let (mut writer, reader) = byte_ring(64);
        writer.write(&bytes(&[1.0, 2.0]));
        state.set_eof();
        let mut handler = PlaybackHandler::new(reader, ports(1), Arc::clone(&state), signal);

        let mut scope = TestScope::playback(1, 4);
        assert_eq!(handler.process(&mut scope), Control::Quit);
        assert_eq!(scope.outputs, vec![vec![1.0, 2.0, 0.0, 0.0]]);
        assert_eq!(state.stop_reason(), Some(StopReason::EndOfData));
        assert_eq!(writer.writable_bytes(), 64);
    }

    #[test]
    fn test_playback_partial_frame_is_not_played() {
        let (state, signal) = shared();
        let (mut writer, reader) = byte_ring(64);
        // One whole stereo frame plus half of the next.
        writer.write(&bytes(&[0.1, 0.2, 0.3]));
        state.set_eof();
        let mut handler = PlaybackHandler::new(reader, ports(2), Arc::clone(&state), signal);

        let mut scope = TestScope::playback(2, 2);
        assert_eq!(handler.process(&mut scope), Control::Quit);
        assert_eq!(scope.outputs, vec![vec![0.1, 0.0], vec![0.2, 0.0]]);
    }
}
