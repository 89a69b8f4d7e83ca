//! Port registration and wiring. Setup-time only.

use crate::backend::{ActiveClient, AudioBackend, PortDirection, PortId};
use crate::{AudioCatError, SessionConfig};

/// Registers one port per channel, named by
/// [`SessionConfig::port_name`], in channel order.
pub(crate) fn register_ports<B: AudioBackend>(
    backend: &mut B,
    config: &SessionConfig,
    direction: PortDirection,
) -> Result<Vec<PortId>, AudioCatError> {
    (0..config.ports)
        .map(|index| {
            let name = config.port_name(index);
            backend
                .register_port(&name, direction)
                .map_err(|source| AudioCatError::PortRegistration { port: name, source })
        })
        .collect()
}

/// Connects port `i` to the `i`-th configured external port.
///
/// Stops at the first failure; the caller tears the session down.
pub(crate) fn connect_ports<C: ActiveClient>(
    client: &mut C,
    ports: &[PortId],
    config: &SessionConfig,
) -> Result<(), AudioCatError> {
    for (index, (&port, external)) in ports.iter().zip(&config.connect).enumerate() {
        client
            .connect(port, external)
            .map_err(|source| AudioCatError::PortConnection {
                port: config.port_name(index),
                external: external.clone(),
                source,
            })?;
        tracing::debug!(port = %config.port_name(index), %external, "connected");
    }
    Ok(())
}
