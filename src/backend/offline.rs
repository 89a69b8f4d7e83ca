//! In-process backend that runs periods on demand.
//!
//! Nothing here is real-time: the caller decides when a period happens and
//! what the input ports carry. That makes it possible to exercise the whole
//! pipeline without audio hardware, which is what the tests do.

use std::collections::HashSet;

use crate::backend::{
    ActiveClient, AudioBackend, Control, PortBuffer, PortBufferMut, PortDirection, PortId,
    ProcessHandler, ProcessScope,
};
use crate::BackendError;

struct OfflinePort {
    name: String,
    direction: PortDirection,
    buffer: Vec<f32>,
    connections: Vec<String>,
}

/// A backend driven manually, one period at a time.
///
/// # Example
///
/// ```
/// use audio_cat::backend::{AudioBackend, OfflineBackend, PortDirection};
///
/// let mut backend = OfflineBackend::new("test").with_external_ports(["system:capture_1"]);
/// let port = backend.register_port("0", PortDirection::Input).unwrap();
/// assert_eq!(port.0, 0);
/// ```
pub struct OfflineBackend {
    client_name: String,
    external_ports: HashSet<String>,
    ports: Vec<OfflinePort>,
}

impl OfflineBackend {
    /// Creates a backend with no external ports.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            external_ports: HashSet::new(),
            ports: Vec::new(),
        }
    }

    /// Declares external ports that connections may target.
    pub fn with_external_ports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_ports
            .extend(names.into_iter().map(Into::into));
        self
    }
}

impl AudioBackend for OfflineBackend {
    type Client = OfflineClient;

    fn client_name(&self) -> &str {
        &self.client_name
    }

    fn register_port(
        &mut self,
        name: &str,
        direction: PortDirection,
    ) -> Result<PortId, BackendError> {
        if self.ports.iter().any(|p| p.name == name) {
            return Err(BackendError::PortRegistration(format!(
                "port name {name} already in use"
            )));
        }
        self.ports.push(OfflinePort {
            name: name.to_string(),
            direction,
            buffer: Vec::new(),
            connections: Vec::new(),
        });
        Ok(PortId(self.ports.len() - 1))
    }

    fn activate(self, handler: Box<dyn ProcessHandler>) -> Result<OfflineClient, BackendError> {
        Ok(OfflineClient {
            client_name: self.client_name,
            external_ports: self.external_ports,
            ports: self.ports,
            handler,
            active: true,
            periods: 0,
        })
    }
}

/// A running [`OfflineBackend`] client.
pub struct OfflineClient {
    client_name: String,
    external_ports: HashSet<String>,
    ports: Vec<OfflinePort>,
    handler: Box<dyn ProcessHandler>,
    active: bool,
    periods: u64,
}

impl OfflineClient {
    /// Loads the samples an input port carries in the next period.
    ///
    /// Missing samples read as silence; extra samples are ignored.
    pub fn set_input(&mut self, port: PortId, samples: &[f32]) {
        if let Some(p) = self.ports.get_mut(port.0) {
            p.buffer.clear();
            p.buffer.extend_from_slice(samples);
        }
    }

    /// Runs one period of `frames` frames.
    ///
    /// Returns [`Control::Quit`] without invoking the handler once the client
    /// has been deactivated.
    pub fn run_period(&mut self, frames: usize) -> Control {
        if !self.active {
            return Control::Quit;
        }
        for port in &mut self.ports {
            port.buffer.resize(frames, 0.0);
        }

        let mut scope = OfflineScope {
            frames,
            ports: &mut self.ports,
        };
        let control = self.handler.process(&mut scope);
        self.periods += 1;

        for port in &mut self.ports {
            if port.direction == PortDirection::Input {
                port.buffer.clear();
            }
        }
        if control == Control::Quit {
            self.active = false;
        }
        control
    }

    /// Samples an output port produced in the last period.
    pub fn output(&self, port: PortId) -> &[f32] {
        self.ports
            .get(port.0)
            .filter(|p| p.direction == PortDirection::Output)
            .map_or(&[], |p| p.buffer.as_slice())
    }

    /// External ports a port has been connected to.
    pub fn connections(&self, port: PortId) -> &[String] {
        self.ports
            .get(port.0)
            .map_or(&[], |p| p.connections.as_slice())
    }

    /// Full name of a port, `client:port`.
    pub fn port_name(&self, port: PortId) -> Option<String> {
        self.ports
            .get(port.0)
            .map(|p| format!("{}:{}", self.client_name, p.name))
    }

    /// Returns `true` until the client is deactivated.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Periods run so far.
    pub fn periods(&self) -> u64 {
        self.periods
    }
}

impl ActiveClient for OfflineClient {
    fn connect(&mut self, port: PortId, external: &str) -> Result<(), BackendError> {
        if !self.external_ports.contains(external) {
            return Err(BackendError::NoSuchPort(external.to_string()));
        }
        let p = self
            .ports
            .get_mut(port.0)
            .ok_or_else(|| BackendError::NoSuchPort(format!("#{}", port.0)))?;
        p.connections.push(external.to_string());
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), BackendError> {
        self.active = false;
        Ok(())
    }
}

struct OfflineScope<'a> {
    frames: usize,
    ports: &'a mut [OfflinePort],
}

impl ProcessScope for OfflineScope<'_> {
    fn frames(&self) -> usize {
        self.frames
    }

    fn input(&self, port: PortId) -> PortBuffer<'_> {
        match self.ports.get(port.0) {
            Some(p) if p.direction == PortDirection::Input => PortBuffer::planar(&p.buffer),
            _ => PortBuffer::empty(),
        }
    }

    fn output(&mut self, port: PortId) -> PortBufferMut<'_> {
        match self.ports.get_mut(port.0) {
            Some(p) if p.direction == PortDirection::Output => {
                PortBufferMut::planar(&mut p.buffer)
            }
            _ => PortBufferMut::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Copies input port 0 to output port 1, doubled.
    struct Doubler;

    impl ProcessHandler for Doubler {
        fn process(&mut self, scope: &mut dyn ProcessScope) -> Control {
            let mut tmp = [0.0f32; 8];
            for (slot, sample) in tmp.iter_mut().zip(scope.input(PortId(0)).iter()) {
                *slot = sample * 2.0;
            }
            for (slot, sample) in scope.output(PortId(1)).iter_mut().zip(tmp) {
                *slot = sample;
            }
            Control::Continue
        }
    }

    struct QuitAfter(u32);

    impl ProcessHandler for QuitAfter {
        fn process(&mut self, _scope: &mut dyn ProcessScope) -> Control {
            self.0 = self.0.saturating_sub(1);
            if self.0 == 0 {
                Control::Quit
            } else {
                Control::Continue
            }
        }
    }

    #[test]
    fn test_period_moves_samples() {
        let mut backend = OfflineBackend::new("t");
        let input = backend.register_port("in", PortDirection::Input).unwrap();
        let output = backend.register_port("out", PortDirection::Output).unwrap();
        let mut client = backend.activate(Box::new(Doubler)).unwrap();

        client.set_input(input, &[1.0, 2.0, 3.0]);
        assert_eq!(client.run_period(4), Control::Continue);
        assert_eq!(client.output(output), &[2.0, 4.0, 6.0, 0.0]);
        assert_eq!(client.periods(), 1);
    }

    #[test]
    fn test_duplicate_port_name_rejected() {
        let mut backend = OfflineBackend::new("t");
        backend.register_port("0", PortDirection::Input).unwrap();
        let err = backend.register_port("0", PortDirection::Input).unwrap_err();
        assert!(matches!(err, BackendError::PortRegistration(_)));
    }

    #[test]
    fn test_quit_deactivates() {
        let backend = OfflineBackend::new("t");
        let mut client = backend.activate(Box::new(QuitAfter(2))).unwrap();
        assert_eq!(client.run_period(1), Control::Continue);
        assert_eq!(client.run_period(1), Control::Quit);
        assert!(!client.is_active());
        assert_eq!(client.run_period(1), Control::Quit);
        assert_eq!(client.periods(), 2);
    }

    #[test]
    fn test_connect_requires_known_external_port() {
        let mut backend = OfflineBackend::new("t").with_external_ports(["system:playback_1"]);
        let port = backend.register_port("0", PortDirection::Output).unwrap();
        let mut client = backend.activate(Box::new(QuitAfter(1))).unwrap();

        client.connect(port, "system:playback_1").unwrap();
        assert_eq!(client.connections(port), &["system:playback_1".to_string()]);
        assert_eq!(client.port_name(port).as_deref(), Some("t:0"));

        let err = client.connect(port, "system:playback_9").unwrap_err();
        assert!(matches!(err, BackendError::NoSuchPort(_)));
    }
}
