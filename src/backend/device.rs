//! Production backend on top of CPAL.
//!
//! One CPAL stream carries all ports: the stream's channel count equals the
//! number of registered ports, and each port is one channel of the device's
//! interleaved buffer. All ports of a client must share a direction.
//!
//! Built with the `jack` feature on Linux, the JACK host is used instead of
//! the platform default.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Host, Stream, StreamConfig};

use crate::backend::{
    ActiveClient, AudioBackend, Control, PortBuffer, PortBufferMut, PortDirection, PortId,
    ProcessHandler, ProcessScope,
};
use crate::BackendError;

/// Unopened CPAL client.
pub struct CpalBackend {
    client_name: String,
    host: Host,
    device: Option<String>,
    direction: Option<PortDirection>,
    ports: Vec<String>,
}

impl CpalBackend {
    /// Prepares a client on the default host (JACK with the `jack` feature).
    ///
    /// `device` selects a device by name; `None` picks the host's default
    /// device for the direction of the registered ports.
    ///
    /// # Errors
    ///
    /// Returns `ClientOpen` if the host is unavailable.
    pub fn open(client_name: &str, device: Option<&str>) -> Result<Self, BackendError> {
        Ok(Self {
            client_name: client_name.to_string(),
            host: host()?,
            device: device.map(str::to_string),
            direction: None,
            ports: Vec::new(),
        })
    }

    fn find_device(&self, direction: PortDirection) -> Result<Device, BackendError> {
        let Some(name) = &self.device else {
            let default = match direction {
                PortDirection::Input => self.host.default_input_device(),
                PortDirection::Output => self.host.default_output_device(),
            };
            return default.ok_or(BackendError::NoDefaultDevice {
                direction: direction_label(direction),
            });
        };

        let devices = match direction {
            PortDirection::Input => self.host.input_devices(),
            PortDirection::Output => self.host.output_devices(),
        }
        .map_err(|e| BackendError::ClientOpen(e.to_string()))?;

        for device in devices {
            if device.name().is_ok_and(|n| &n == name) {
                return Ok(device);
            }
        }
        Err(BackendError::DeviceNotFound { name: name.clone() })
    }
}

impl AudioBackend for CpalBackend {
    type Client = CpalClient;

    fn client_name(&self) -> &str {
        &self.client_name
    }

    fn register_port(
        &mut self,
        name: &str,
        direction: PortDirection,
    ) -> Result<PortId, BackendError> {
        match self.direction {
            Some(existing) if existing != direction => {
                return Err(BackendError::PortRegistration(format!(
                    "{name}: all ports of a device stream must share one direction"
                )));
            }
            _ => self.direction = Some(direction),
        }
        if self.ports.len() >= usize::from(u16::MAX) {
            return Err(BackendError::PortRegistration(format!(
                "{name}: too many channels"
            )));
        }
        self.ports.push(name.to_string());
        Ok(PortId(self.ports.len() - 1))
    }

    fn activate(self, mut handler: Box<dyn ProcessHandler>) -> Result<CpalClient, BackendError> {
        let Some(direction) = self.direction else {
            return Err(BackendError::Stream("no ports registered".to_string()));
        };
        let device = self.find_device(direction)?;

        let supported = match direction {
            PortDirection::Input => device.default_input_config(),
            PortDirection::Output => device.default_output_config(),
        }
        .map_err(|e| BackendError::Stream(e.to_string()))?;

        let channels = self.ports.len();
        let config = StreamConfig {
            channels: u16::try_from(channels)
                .map_err(|_| BackendError::Stream("too many channels".to_string()))?,
            sample_rate: supported.sample_rate(),
            buffer_size: BufferSize::Default,
        };

        tracing::info!(
            client = %self.client_name,
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            channels,
            sample_rate = config.sample_rate.0,
            "opening device stream"
        );

        let stream = match direction {
            PortDirection::Input => {
                let mut running = true;
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if running {
                            let mut scope = InputScope { data, channels };
                            running = handler.process(&mut scope) == Control::Continue;
                        }
                    },
                    |err| {
                        tracing::error!("audio stream error: {}", err);
                    },
                    None,
                )
            }
            PortDirection::Output => {
                let mut running = true;
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if running {
                            let mut scope = OutputScope { data, channels };
                            running = handler.process(&mut scope) == Control::Continue;
                        } else {
                            data.fill(0.0);
                        }
                    },
                    |err| {
                        tracing::error!("audio stream error: {}", err);
                    },
                    None,
                )
            }
        }
        .map_err(|e| BackendError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| BackendError::Stream(e.to_string()))?;

        Ok(CpalClient {
            stream,
            active: true,
        })
    }
}

/// A running CPAL stream. Dropping it closes the stream.
pub struct CpalClient {
    stream: Stream,
    active: bool,
}

impl ActiveClient for CpalClient {
    fn connect(&mut self, _port: PortId, _external: &str) -> Result<(), BackendError> {
        Err(BackendError::ConnectUnsupported)
    }

    fn deactivate(&mut self) -> Result<(), BackendError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.stream
            .pause()
            .map_err(|e| BackendError::Stream(e.to_string()))
    }
}

/// Names of the devices that can serve ports of `direction`.
///
/// # Errors
///
/// Returns `ClientOpen` if the host cannot enumerate devices.
pub fn list_devices(direction: PortDirection) -> Result<Vec<String>, BackendError> {
    let host = host()?;
    let devices = match direction {
        PortDirection::Input => host.input_devices(),
        PortDirection::Output => host.output_devices(),
    }
    .map_err(|e| BackendError::ClientOpen(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

#[cfg(all(
    feature = "jack",
    any(target_os = "linux", target_os = "dragonfly", target_os = "freebsd")
))]
fn host() -> Result<Host, BackendError> {
    cpal::host_from_id(cpal::HostId::Jack).map_err(|e| BackendError::ClientOpen(e.to_string()))
}

#[cfg(not(all(
    feature = "jack",
    any(target_os = "linux", target_os = "dragonfly", target_os = "freebsd")
)))]
#[allow(clippy::unnecessary_wraps)]
fn host() -> Result<Host, BackendError> {
    Ok(cpal::default_host())
}

fn direction_label(direction: PortDirection) -> &'static str {
    match direction {
        PortDirection::Input => "input",
        PortDirection::Output => "output",
    }
}

struct InputScope<'a> {
    data: &'a [f32],
    channels: usize,
}

impl ProcessScope for InputScope<'_> {
    fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    fn input(&self, port: PortId) -> PortBuffer<'_> {
        if port.0 < self.channels {
            PortBuffer::interleaved(self.data, port.0, self.channels)
        } else {
            PortBuffer::empty()
        }
    }

    fn output(&mut self, _port: PortId) -> PortBufferMut<'_> {
        PortBufferMut::empty()
    }
}

struct OutputScope<'a> {
    data: &'a mut [f32],
    channels: usize,
}

impl ProcessScope for OutputScope<'_> {
    fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    fn input(&self, _port: PortId) -> PortBuffer<'_> {
        PortBuffer::empty()
    }

    fn output(&mut self, port: PortId) -> PortBufferMut<'_> {
        if port.0 < self.channels {
            PortBufferMut::interleaved(self.data, port.0, self.channels)
        } else {
            PortBufferMut::empty()
        }
    }
}
