//! On-disk format of audio-cat files.
//!
//! A file is a short header followed by raw frames: one native-endian `f32`
//! per channel, channels interleaved, no trailer. See [`header`] for the
//! header layout.

pub mod header;

pub use header::{read_header, write_header, HEADER_MAGIC};

use crate::config::SAMPLE_BYTES;

/// Decodes one native-endian sample. Short input is zero-padded.
#[must_use]
pub fn decode_sample(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; SAMPLE_BYTES];
    for (dst, src) in raw.iter_mut().zip(bytes) {
        *dst = *src;
    }
    f32::from_ne_bytes(raw)
}

/// Encodes one sample in native byte order.
#[must_use]
pub fn encode_sample(sample: f32) -> [u8; SAMPLE_BYTES] {
    sample.to_ne_bytes()
}
