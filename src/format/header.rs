//! File header: the ASCII tag `JACK`, the channel count in decimal, then a
//! single zero byte.
//!
//! With one to nine channels the header is six bytes (`JACK2\0`), which is
//! the layout every existing file has. Ten or more channels take a second
//! digit. Readers consume exactly the header and nothing of the frame data.

use std::io::{ErrorKind, Read, Write};

use crate::HeaderError;

/// Leading tag of every file.
pub const HEADER_MAGIC: &[u8; 4] = b"JACK";

const TERMINATOR: u8 = 0;
const MAX_DIGITS: usize = 2;

/// Writes the header for `channels` channels and returns its length.
///
/// # Errors
///
/// `BadChannelCount` if `channels` is zero or needs more than two digits,
/// `Io` if the write fails.
pub fn write_header<W: Write>(writer: &mut W, channels: usize) -> Result<usize, HeaderError> {
    if channels == 0 || channels >= 10usize.pow(MAX_DIGITS as u32) {
        return Err(HeaderError::BadChannelCount);
    }

    let mut header = Vec::with_capacity(HEADER_MAGIC.len() + MAX_DIGITS + 1);
    header.extend_from_slice(HEADER_MAGIC);
    header.extend_from_slice(channels.to_string().as_bytes());
    header.push(TERMINATOR);

    writer.write_all(&header)?;
    Ok(header.len())
}

/// Reads a header and checks its channel count against `expected`.
///
/// Returns the header length so callers can account for it.
///
/// # Errors
///
/// `Truncated` if the input ends inside the header, `BadMagic` or
/// `BadChannelCount` for a malformed header, `ChannelMismatch` when the file
/// was written for a different number of ports.
pub fn read_header<R: Read>(reader: &mut R, expected: usize) -> Result<usize, HeaderError> {
    let mut head = [0u8; 5];
    let len = read_full(reader, &mut head)?;
    if len < head.len() {
        return Err(HeaderError::Truncated { len });
    }
    if &head[..4] != HEADER_MAGIC {
        return Err(HeaderError::BadMagic);
    }

    let mut digits = vec![head[4]];
    let mut consumed = head.len();
    loop {
        let mut byte = [0u8; 1];
        if read_full(reader, &mut byte)? == 0 {
            return Err(HeaderError::Truncated { len: consumed });
        }
        consumed += 1;
        if byte[0] == TERMINATOR {
            break;
        }
        if digits.len() == MAX_DIGITS {
            return Err(HeaderError::BadChannelCount);
        }
        digits.push(byte[0]);
    }

    let found = parse_count(&digits).ok_or(HeaderError::BadChannelCount)?;
    if found != expected {
        return Err(HeaderError::ChannelMismatch { expected, found });
    }
    Ok(consumed)
}

fn parse_count(digits: &[u8]) -> Option<usize> {
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let count = std::str::from_utf8(digits).ok()?.parse().ok()?;
    (count > 0).then_some(count)
}

/// Like `read_exact`, but reports how much was read instead of failing on
/// end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
