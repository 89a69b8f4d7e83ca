//! Configuration types for a streaming session.

use std::path::PathBuf;
use std::time::Duration;

use crate::AudioCatError;

/// Maximum number of ports (channels) in one session.
pub const MAX_PORTS: usize = 32;

/// Bytes in one sample. Samples are native-endian `f32`.
pub const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Default ring buffer capacity in bytes.
pub const DEFAULT_RING_BUFFER_BYTES: usize = 1 << 20;

/// Default cap on a single disk transfer, in bytes.
pub const DEFAULT_CHUNK_BYTES: usize = 1 << 20;

/// Default audio client name.
pub const DEFAULT_CLIENT_NAME: &str = "audio_cat";

/// Which way audio flows through the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Audio graph to file.
    Capture,
    /// File to audio graph.
    Playback,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Playback => f.write_str("playback"),
        }
    }
}

/// Validated, immutable configuration of one session.
///
/// Produced by [`AudioCatBuilder::build()`](crate::AudioCatBuilder::build);
/// direction and path are always set.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capture or playback.
    pub direction: Direction,

    /// The data file.
    pub path: PathBuf,

    /// Number of ports, which is also the channel count of the file.
    pub ports: usize,

    /// Ring buffer capacity in bytes.
    ///
    /// A ring smaller than one period of audio is legal; every capture period
    /// then overflows.
    pub ring_buffer_bytes: usize,

    /// Upper bound on a single file read or write.
    ///
    /// Keeps one slow I/O call from holding a large part of the ring.
    pub chunk_bytes: usize,

    /// Stop automatically after this long.
    pub run_time: Option<Duration>,

    /// Name of the audio client.
    pub client_name: String,

    /// Optional prefix for port names.
    pub port_prefix: Option<String>,

    /// External ports to connect, one per port, in order.
    pub connect: Vec<String>,

    /// How often the supervisor reports counters.
    pub status_interval: Duration,

    /// Longest the disk thread sleeps before re-checking the ring buffer,
    /// even without a wake-up.
    pub idle_wait: Duration,

    /// How long teardown waits for the disk thread before detaching it.
    pub join_timeout: Duration,
}

impl SessionConfig {
    /// Name of port `index`.
    #[must_use]
    pub fn port_name(&self, index: usize) -> String {
        match &self.port_prefix {
            Some(prefix) => format!("{prefix}_{index}"),
            None => index.to_string(),
        }
    }
}

/// Parses a size with an optional `k`, `m` or `g` suffix (powers of 1024).
///
/// # Example
///
/// ```
/// use audio_cat::parse_size;
///
/// assert_eq!(parse_size("64k").unwrap(), 65536);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert!(parse_size("3x").is_err());
/// ```
pub fn parse_size(value: &str) -> Result<usize, AudioCatError> {
    let invalid = || AudioCatError::InvalidSize {
        option: "size",
        value: value.to_string(),
    };

    let value_trimmed = value.trim();
    let split = value_trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value_trimmed.len());
    let (digits, suffix) = value_trimmed.split_at(split);

    let number: usize = digits.parse().map_err(|_| invalid())?;
    let multiplier: usize = match suffix {
        "" => 1,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        _ => return Err(invalid()),
    };

    number.checked_mul(multiplier).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ports: usize, prefix: Option<&str>) -> SessionConfig {
        SessionConfig {
            direction: Direction::Capture,
            path: PathBuf::from("take.raw"),
            ports,
            ring_buffer_bytes: DEFAULT_RING_BUFFER_BYTES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            run_time: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            port_prefix: prefix.map(str::to_string),
            connect: Vec::new(),
            status_interval: Duration::from_secs(1),
            idle_wait: Duration::from_millis(100),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("2k").unwrap(), 2048);
        assert_eq!(parse_size("1m").unwrap(), 1_048_576);
        assert_eq!(parse_size("1g").unwrap(), 1_073_741_824);
    }

    #[test]
    fn test_parse_size_rejects_bad_suffix() {
        let err = parse_size("10q").unwrap_err();
        assert!(matches!(err, AudioCatError::InvalidSize { .. }));
        assert!(parse_size("k").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("10kk").is_err());
    }

    #[test]
    fn test_port_names() {
        assert_eq!(config(2, None).port_name(1), "1");
        assert_eq!(config(2, Some("mic")).port_name(0), "mic_0");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Capture.to_string(), "capture");
        assert_eq!(Direction::Playback.to_string(), "playback");
    }
}
