//! Audio backend abstraction.
//!
//! The audio graph itself (device access, scheduling, port wiring) lives
//! outside this crate. A backend only has to:
//!
//! 1. register ports ([`AudioBackend::register_port`]),
//! 2. call a [`ProcessHandler`] once per period after
//!    [`activate`](AudioBackend::activate),
//! 3. wire ports to named external ports and shut down
//!    ([`ActiveClient`]).
//!
//! Two backends ship with the crate: [`CpalBackend`] for real devices and
//! [`OfflineBackend`], which runs periods on demand for tests and tooling.

mod device;
mod offline;

pub use self::device::{list_devices, CpalBackend, CpalClient};
pub use self::offline::{OfflineBackend, OfflineClient};

use crate::BackendError;

/// Direction of a port, seen from this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    /// The port receives audio from the graph (capture).
    Input,
    /// The port sends audio into the graph (playback).
    Output,
}

/// Handle to a registered port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub usize);

/// What a [`ProcessHandler`] wants the backend to do after a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep invoking the handler.
    Continue,
    /// Stop invoking the handler and deactivate the client.
    Quit,
}

/// The per-period callback.
///
/// Runs on the backend's real-time thread: implementations must not block,
/// allocate or perform I/O.
pub trait ProcessHandler: Send + 'static {
    /// Processes one period.
    fn process(&mut self, scope: &mut dyn ProcessScope) -> Control;
}

/// Audio buffers for one invocation of a [`ProcessHandler`].
///
/// Buffers are only valid for the duration of the call and must be fetched
/// again on every invocation.
pub trait ProcessScope {
    /// Frames in this period.
    fn frames(&self) -> usize;

    /// Samples arriving on an input port. Empty if `port` is not an input.
    fn input(&self, port: PortId) -> PortBuffer<'_>;

    /// Samples to send from an output port. Empty if `port` is not an output.
    fn output(&mut self, port: PortId) -> PortBufferMut<'_>;
}

/// Read-only view of one port's samples for a period.
///
/// Backends with planar buffers hand out a plain slice; backends with
/// interleaved device buffers hand out a strided view into the shared buffer.
#[derive(Debug, Clone, Copy)]
pub struct PortBuffer<'a> {
    data: &'a [f32],
    stride: usize,
}

impl<'a> PortBuffer<'a> {
    /// A contiguous buffer.
    pub fn planar(data: &'a [f32]) -> Self {
        Self { data, stride: 1 }
    }

    /// Channel `channel` of an interleaved buffer with `channels` channels.
    pub fn interleaved(data: &'a [f32], channel: usize, channels: usize) -> Self {
        Self {
            data: data.get(channel..).unwrap_or_default(),
            stride: channels.max(1),
        }
    }

    /// A buffer with no samples.
    pub fn empty() -> Self {
        Self::planar(&[])
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.len().div_ceil(self.stride)
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample of `frame`, if the buffer has one.
    pub fn get(&self, frame: usize) -> Option<f32> {
        self.data.get(frame * self.stride).copied()
    }

    /// Iterates the samples in frame order.
    pub fn iter(&self) -> impl Iterator<Item = f32> + 'a {
        self.data.iter().step_by(self.stride).copied()
    }
}

/// Writable view of one port's samples for a period.
#[derive(Debug)]
pub struct PortBufferMut<'a> {
    data: &'a mut [f32],
    stride: usize,
}

impl<'a> PortBufferMut<'a> {
    /// A contiguous buffer.
    pub fn planar(data: &'a mut [f32]) -> Self {
        Self { data, stride: 1 }
    }

    /// Channel `channel` of an interleaved buffer with `channels` channels.
    pub fn interleaved(data: &'a mut [f32], channel: usize, channels: usize) -> Self {
        Self {
            data: data.get_mut(channel..).unwrap_or_default(),
            stride: channels.max(1),
        }
    }

    /// A buffer with no samples.
    pub fn empty() -> Self {
        Self::planar(&mut [])
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.len().div_ceil(self.stride)
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates the sample slots in frame order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut f32> + '_ {
        self.data.iter_mut().step_by(self.stride)
    }

    /// Sets every sample to `value`.
    pub fn fill(&mut self, value: f32) {
        for slot in self.iter_mut() {
            *slot = value;
        }
    }
}

/// An audio client that has not started processing yet.
pub trait AudioBackend {
    /// The running client returned by [`activate`](Self::activate).
    type Client: ActiveClient;

    /// Name the client is known by in the audio graph.
    fn client_name(&self) -> &str;

    /// Registers a port. Port ids are handed out in registration order.
    fn register_port(&mut self, name: &str, direction: PortDirection)
        -> Result<PortId, BackendError>;

    /// Starts invoking `handler` once per period.
    fn activate(self, handler: Box<dyn ProcessHandler>) -> Result<Self::Client, BackendError>;
}

/// A running audio client. Dropping it closes the connection.
pub trait ActiveClient {
    /// Connects one of our ports to a named external port.
    ///
    /// The data direction follows the port: external → ours for inputs,
    /// ours → external for outputs.
    fn connect(&mut self, port: PortId, external: &str) -> Result<(), BackendError>;

    /// Stops invoking the handler. Idempotent.
    fn deactivate(&mut self) -> Result<(), BackendError>;
}
