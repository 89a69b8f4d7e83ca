//! Command-line parsing for the `audio-cat` binary.
//!
//! Short options only, each taking its value either attached (`-n2`) or as
//! the next argument (`-n 2`). Option parsing stops at the first positional
//! argument or at `--`; everything after that names external ports to
//! connect.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{parse_size, Direction};
use crate::{AudioCat, AudioCatBuilder, AudioCatError};

/// One-line usage.
pub const USAGE: &str = "usage: audio-cat -c FILE | -p FILE [options] [port ...]";

/// Full help text.
pub const HELP: &str = "\
usage: audio-cat -c FILE | -p FILE [options] [port ...]

  -c FILE     capture from the audio graph into FILE
  -p FILE     play FILE back into the audio graph
  -n COUNT    number of ports (when no ports are named)
  -j NAME     audio client name (default: audio_cat)
  -N NAME     port name prefix (ports are named NAME_0, NAME_1, ...)
  -b SIZE     largest single disk transfer (default: 1m)
  -B SIZE     ring buffer size (default: 1m)
  -t SECONDS  stop after SECONDS (0: no limit)
  -d DEVICE   audio device to open
  -h          show this help

  port ...    external ports to connect, one per port; sets the port count

SIZE takes an optional k, m or g suffix.";

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Stream with these settings.
    Run(CliArgs),
    /// Print [`HELP`] and exit.
    Help,
}

/// Parsed settings, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// `-c` or `-p`, whichever came last.
    pub io: Option<(Direction, PathBuf)>,
    /// `-n`
    pub ports: Option<usize>,
    /// `-j`
    pub client_name: Option<String>,
    /// `-N`
    pub port_prefix: Option<String>,
    /// `-b`
    pub chunk_bytes: Option<usize>,
    /// `-B`
    pub ring_buffer_bytes: Option<usize>,
    /// `-t`
    pub run_time: Option<Duration>,
    /// `-d`
    pub device: Option<String>,
    /// Trailing port names.
    pub connect: Vec<String>,
}

impl CliArgs {
    /// A builder carrying these settings.
    pub fn builder(&self) -> AudioCatBuilder {
        let mut builder = AudioCat::builder();
        builder = match &self.io {
            Some((Direction::Capture, path)) => builder.capture(path),
            Some((Direction::Playback, path)) => builder.playback(path),
            None => builder,
        };
        if let Some(count) = self.ports {
            builder = builder.ports(count);
        }
        if let Some(name) = &self.client_name {
            builder = builder.client_name(name);
        }
        if let Some(prefix) = &self.port_prefix {
            builder = builder.port_prefix(prefix);
        }
        if let Some(bytes) = self.chunk_bytes {
            builder = builder.chunk_bytes(bytes);
        }
        if let Some(bytes) = self.ring_buffer_bytes {
            builder = builder.ring_buffer_bytes(bytes);
        }
        if let Some(limit) = self.run_time {
            builder = builder.run_time(limit);
        }
        builder.connect_to(self.connect.iter().cloned())
    }
}

/// Parses the arguments after the program name.
pub fn parse_args<I, S>(args: I) -> Result<CliCommand, AudioCatError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::<String>::into);
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }
        let Some(flag_and_value) = arg.strip_prefix('-').filter(|rest| !rest.is_empty()) else {
            // First positional ends option parsing.
            parsed.connect.push(arg);
            break;
        };

        let mut chars = flag_and_value.chars();
        let flag = chars.next().unwrap_or('-');
        if flag == 'h' {
            return Ok(CliCommand::Help);
        }
        if !"cpnjNbBtd".contains(flag) {
            return Err(AudioCatError::InvalidArgument(format!("unknown option -{flag}")));
        }

        let attached = chars.as_str();
        let value = if attached.is_empty() {
            args.next().ok_or_else(|| {
                AudioCatError::InvalidArgument(format!("option -{flag} requires a value"))
            })?
        } else {
            attached.to_string()
        };

        match flag {
            'c' => parsed.io = Some((Direction::Capture, PathBuf::from(value))),
            'p' => parsed.io = Some((Direction::Playback, PathBuf::from(value))),
            'n' => parsed.ports = Some(parse_number(flag, &value)?),
            'j' => parsed.client_name = Some(value),
            'N' => parsed.port_prefix = Some(value),
            'b' => parsed.chunk_bytes = Some(size_option("-b", &value)?),
            'B' => parsed.ring_buffer_bytes = Some(size_option("-B", &value)?),
            // 0 means no limit.
            't' => {
                parsed.run_time = match parse_number(flag, &value)? {
                    0 => None,
                    seconds => Some(Duration::from_secs(seconds)),
                };
            }
            'd' => parsed.device = Some(value),
            other => {
                return Err(AudioCatError::InvalidArgument(format!(
                    "unknown option -{other}"
                )))
            }
        }
    }

    parsed.connect.extend(args);
    Ok(CliCommand::Run(parsed))
}

fn parse_number<T: std::str::FromStr>(flag: char, value: &str) -> Result<T, AudioCatError> {
    value
        .trim()
        .parse()
        .map_err(|_| AudioCatError::InvalidArgument(format!("-{flag}: not a number: {value}")))
}

fn size_option(option: &'static str, value: &str) -> Result<usize, AudioCatError> {
    parse_size(value).map_err(|_| AudioCatError::InvalidSize {
        option,
        value: value.to_string(),
    })
}
