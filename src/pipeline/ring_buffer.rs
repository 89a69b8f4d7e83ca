//! Byte ring buffer between the audio callback and the disk thread.
//!
//! One side only ever writes and the other only ever reads, so the ring is
//! split into a [`RingWriter`] and a [`RingReader`] that move to their
//! threads. The indices are the only shared state; `ringbuf` publishes them
//! with release/acquire ordering, so a reader that sees a new write index also
//! sees the bytes behind it (and symmetrically for the writer).
//!
//! Bulk transfers go through [`WriteRegion`]/[`ReadRegion`]: up to two
//! contiguous spans of the underlying storage (the second one is empty unless
//! the region wraps), committed afterwards with
//! [`RingWriter::advance_write`]/[`RingReader::advance_read`].

// Committing bytes written through a zero-copy span has to move the write
// index by hand.
#![allow(unsafe_code)]

use std::mem::MaybeUninit;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Creates a ring of `capacity` bytes and splits it into its two halves.
///
/// All storage is written once up front (as the audio server's own ring
/// buffers are touched before use), so no page fault lands on the audio
/// thread and every span handed out later is initialised memory.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn byte_ring(capacity: usize) -> (RingWriter, RingReader) {
    let ring = HeapRb::<u8>::new(capacity);
    let (mut producer, mut consumer) = ring.split();

    let touched = producer.push_slice(&vec![0u8; capacity]);
    consumer.skip(touched);

    (RingWriter { producer }, RingReader { consumer })
}

/// Producer half of the byte ring.
pub struct RingWriter {
    producer: HeapProd<u8>,
}

impl RingWriter {
    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }

    /// Bytes that can be written right now.
    pub fn writable_bytes(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Copies as much of `src` as fits and returns the number of bytes written.
    ///
    /// Never blocks. Callers that need all-or-nothing semantics check
    /// [`writable_bytes`](Self::writable_bytes) first.
    pub fn write(&mut self, src: &[u8]) -> usize {
        self.producer.push_slice(src)
    }

    /// Borrows the free space for zero-copy writing.
    ///
    /// Nothing becomes visible to the reader until
    /// [`advance_write`](Self::advance_write) is called.
    pub fn write_region(&mut self) -> WriteRegion<'_> {
        let (first, second) = self.producer.vacant_slices_mut();
        WriteRegion {
            first: assume_init_mut(first),
            second: assume_init_mut(second),
        }
    }

    /// Publishes `count` bytes previously written through
    /// [`write_region`](Self::write_region).
    ///
    /// `count` is clamped to the free space. Returns the bytes committed.
    pub fn advance_write(&mut self, count: usize) -> usize {
        let count = count.min(self.writable_bytes());
        // SAFETY: `count` does not exceed the vacant length, and every byte of
        // storage was initialised in `byte_ring`.
        unsafe { self.producer.advance_write_index(count) };
        count
    }
}

/// Consumer half of the byte ring.
pub struct RingReader {
    consumer: HeapCons<u8>,
}

impl RingReader {
    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.consumer.capacity().get()
    }

    /// Bytes that can be read right now.
    pub fn readable_bytes(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Copies up to `dst.len()` bytes out and returns the number read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        self.consumer.pop_slice(dst)
    }

    /// Borrows the buffered bytes for zero-copy reading.
    pub fn read_region(&self) -> ReadRegion<'_> {
        let (first, second) = self.consumer.as_slices();
        ReadRegion { first, second }
    }

    /// Releases `count` bytes previously read through
    /// [`read_region`](Self::read_region).
    ///
    /// `count` is clamped to the buffered length. Returns the bytes released.
    pub fn advance_read(&mut self, count: usize) -> usize {
        self.consumer.skip(count)
    }
}

/// Free space of the ring as up to two contiguous spans.
pub struct WriteRegion<'a> {
    first: &'a mut [u8],
    second: &'a mut [u8],
}

impl<'a> WriteRegion<'a> {
    /// Total bytes across both spans.
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// Returns `true` if the ring is full.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The spans in order. The second is empty when the space does not wrap.
    pub fn into_spans(self) -> (&'a mut [u8], &'a mut [u8]) {
        (self.first, self.second)
    }

    /// Copies `bytes` to logical `offset` within the region, crossing the
    /// wrap point if needed. Bytes beyond the region are dropped.
    pub fn put(&mut self, offset: usize, bytes: &[u8]) {
        let split = self.first.len();
        if let Some(dst) = self.first.get_mut(offset..offset + bytes.len()) {
            dst.copy_from_slice(bytes);
            return;
        }
        for (at, &byte) in (offset..).zip(bytes) {
            let slot = if at < split {
                self.first.get_mut(at)
            } else {
                self.second.get_mut(at - split)
            };
            if let Some(slot) = slot {
                *slot = byte;
            }
        }
    }
}

/// Buffered bytes of the ring as up to two contiguous spans.
pub struct ReadRegion<'a> {
    first: &'a [u8],
    second: &'a [u8],
}

impl<'a> ReadRegion<'a> {
    /// Total bytes across both spans.
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The spans in order. The second is empty when the data does not wrap.
    pub fn spans(&self) -> (&'a [u8], &'a [u8]) {
        (self.first, self.second)
    }

    /// Copies `dst.len()` bytes from logical `offset`, crossing the wrap point
    /// if needed. Positions beyond the region read as zero.
    pub fn get(&self, offset: usize, dst: &mut [u8]) {
        let split = self.first.len();
        if let Some(src) = self.first.get(offset..offset + dst.len()) {
            dst.copy_from_slice(src);
            return;
        }
        for (at, byte) in (offset..).zip(dst.iter_mut()) {
            let src = if at < split {
                self.first.get(at)
            } else {
                self.second.get(at - split)
            };
            *byte = src.copied().unwrap_or(0);
        }
    }
}

fn assume_init_mut(span: &mut [MaybeUninit<u8>]) -> &mut [u8] {
    // SAFETY: `byte_ring` writes every byte of storage before handing out the
    // halves, popping a `u8` leaves its storage untouched, and every bit
    // pattern is a valid `u8`.
    unsafe { &mut *(span as *mut [MaybeUninit<u8>] as *mut [u8]) }
}
