//! Length-prefixed records over a byte fifo.
//!
//! A record is a little-endian length header of one or two bytes followed by
//! the payload, stored as ordinary bytes in the same ring:
//!
//! ```text
//!            header   payload
//!          +--------+---------------------------+
//!  One  => | len:u8 | 0..=255 bytes             |
//!          +--------+---------------------------+
//!  Two  => | len:u16 (LE) | 0..=65535 bytes     |
//!          +--------------+---------------------+
//! ```
//!
//! Header and payload are published with a single cursor store, so the
//! consumer never sees half a record. Reading into a buffer shorter than
//! the payload copies what fits and still consumes the whole record.
//!
//! # Example
//!
//! ```
//! use ringfifo::{HeaderWidth, RecordFifo};
//!
//! let mut fifo = RecordFifo::allocate(64, HeaderWidth::One)?;
//! fifo.push(b"hello").unwrap();
//! fifo.push(b"").unwrap();
//!
//! let mut buf = [0u8; 3];
//! let received = fifo.pop(&mut buf).unwrap();
//! assert_eq!(&buf, b"hel");
//! assert!(received.is_truncated());
//!
//! assert_eq!(fifo.peek_len(), 0);
//! assert_eq!(fifo.pop(&mut buf).map(|r| r.len), Some(0));
//! assert!(fifo.is_empty());
//! # Ok::<(), ringfifo::FifoError>(())
//! ```

use crate::error::{Fault, FifoError, Rejected};
use crate::external::{Sink, Source};
use crate::fifo::Fifo;
use crate::ring::Ring;
use crate::spsc::{RecordConsumer, RecordProducer};
use crate::storage::{Borrowed, Heap, Inline, Ownership, Storage};
use crate::trace::trace;

/// Width of the record length header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderWidth {
    /// One byte, payloads up to 255 bytes.
    One = 1,
    /// Two bytes, payloads up to 65535 bytes.
    Two = 2,
}

impl HeaderWidth {
    /// Bytes the header occupies in the ring.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Largest payload the header can describe.
    #[inline]
    #[must_use]
    pub const fn max_len(self) -> usize {
        match self {
            Self::One => u8::MAX as usize,
            Self::Two => u16::MAX as usize,
        }
    }

    /// `len` must not exceed [`max_len`](Self::max_len).
    #[inline]
    fn encode(self, len: usize) -> [u8; 2] {
        debug_assert!(len <= self.max_len());
        (len as u16).to_le_bytes()
    }

    #[inline]
    fn decode(header: [u8; 2]) -> usize {
        usize::from(u16::from_le_bytes(header))
    }
}

/// How a container frames its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramingMode {
    /// Fixed-size elements, one per slot.
    Flat,
    /// Length-prefixed byte records.
    Record(HeaderWidth),
}

impl FramingMode {
    /// Header bytes per entry; 0 for flat.
    #[must_use]
    pub const fn header_width(self) -> usize {
        match self {
            Self::Flat => 0,
            Self::Record(width) => width.bytes(),
        }
    }
}

/// Outcome of reading one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Payload bytes copied into the caller's buffer.
    pub copied: usize,
    /// Full payload length of the record.
    pub len: usize,
}

impl Received {
    /// The buffer was shorter than the payload and the tail was dropped.
    #[inline]
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.copied < self.len
    }
}

// Record primitives on the byte ring. Producer methods require the caller to
// be the only producer and consumer methods the only consumer.
impl<S: Storage<u8>> Ring<u8, S> {
    pub(crate) fn record_available(&self, width: HeaderWidth) -> usize {
        let unused = self.producer_unused();
        if unused <= width.bytes() {
            0
        } else {
            (unused - width.bytes()).min(width.max_len())
        }
    }

    pub(crate) unsafe fn push_record(
        &self,
        width: HeaderWidth,
        payload: &[u8],
    ) -> Result<usize, Rejected> {
        let len = payload.len();
        let max = width.max_len();
        if len > max {
            return Err(Rejected::TooLarge { len, max });
        }
        let needed = width.bytes() + len;
        let unused = self.producer_unused();
        if unused < needed {
            return Err(Rejected::Full { needed, unused });
        }
        let header = width.encode(len);
        // SAFETY: `needed` slots past `head` are free and we are the producer.
        unsafe {
            self.write_at(0, &header[..width.bytes()]);
            self.write_at(width.bytes(), payload);
            self.commit(needed);
        }
        Ok(len)
    }

    pub(crate) unsafe fn push_from<Src>(
        &self,
        width: HeaderWidth,
        src: &mut Src,
        len: usize,
    ) -> Result<usize, Fault>
    where
        Src: Source<u8> + ?Sized,
    {
        let len = len.min(width.max_len());
        let needed = width.bytes() + len;
        if self.producer_unused() < needed {
            return Ok(0);
        }
        // SAFETY: `needed` slots past `head` are free and we are the producer.
        unsafe {
            let (first, second) = self.producer_slots(width.bytes(), len);
            src.read_elems(first)?;
            if !second.is_empty() {
                src.read_elems(second)
                    .map_err(|fault| fault.offset(first.len()))?;
            }
            self.write_at(0, &width.encode(len)[..width.bytes()]);
            self.commit(needed);
        }
        Ok(len)
    }

    /// Payload length of the next record, if one is queued.
    pub(crate) unsafe fn next_len(&self, width: HeaderWidth) -> Option<usize> {
        let queued = self.consumer_len();
        if queued == 0 {
            return None;
        }
        debug_assert!(queued >= width.bytes());
        let mut header = [0u8; 2];
        // SAFETY: a queued record always carries its full header.
        unsafe { self.read_at(0, &mut header[..width.bytes()]) };
        let len = HeaderWidth::decode(header);
        debug_assert!(width.bytes() + len <= queued);
        Some(len)
    }

    pub(crate) unsafe fn peek_record(&self, width: HeaderWidth, buf: &mut [u8]) -> Option<Received> {
        // SAFETY: forwarded from the caller.
        let len = unsafe { self.next_len(width)? };
        let copied = len.min(buf.len());
        // SAFETY: the whole payload is published with its header.
        unsafe { self.read_at(width.bytes(), &mut buf[..copied]) };
        Some(Received { copied, len })
    }

    pub(crate) unsafe fn pop_record(&self, width: HeaderWidth, buf: &mut [u8]) -> Option<Received> {
        // SAFETY: forwarded from the caller.
        unsafe {
            let received = self.peek_record(width, buf)?;
            self.release(width.bytes() + received.len);
            Some(received)
        }
    }

    pub(crate) unsafe fn skip_record(&self, width: HeaderWidth) {
        // SAFETY: forwarded from the caller.
        unsafe {
            if let Some(len) = self.next_len(width) {
                self.release(width.bytes() + len);
            }
        }
    }

    pub(crate) unsafe fn pop_to<K>(
        &self,
        width: HeaderWidth,
        sink: &mut K,
        len: usize,
    ) -> Result<Option<Received>, Fault>
    where
        K: Sink<u8> + ?Sized,
    {
        // SAFETY: forwarded from the caller.
        let Some(record_len) = (unsafe { self.next_len(width) }) else {
            return Ok(None);
        };
        let copied = len.min(record_len);
        // SAFETY: the payload is published; we are the consumer.
        let (first, second) = unsafe { self.consumer_slots(width.bytes(), copied) };
        sink.write_elems(first)?;
        if !second.is_empty() {
            sink.write_elems(second)
                .map_err(|fault| fault.offset(first.len()))?;
        }
        // SAFETY: the whole record is queued.
        unsafe { self.release(width.bytes() + record_len) };
        Ok(Some(Received {
            copied,
            len: record_len,
        }))
    }
}

/// FIFO of variable-length byte records over storage `S`.
pub struct RecordFifo<S> {
    fifo: Fifo<u8, S>,
    width: HeaderWidth,
}

impl<const N: usize> RecordFifo<Inline<u8, N>> {
    /// Creates a record fifo whose `N` bytes live inside the value.
    ///
    /// # Errors
    ///
    /// As [`Fifo::embedded`].
    pub fn embedded(width: HeaderWidth) -> Result<Self, FifoError> {
        Ok(Self::new(Fifo::embedded()?, width))
    }
}

impl RecordFifo<Heap<u8>> {
    /// Allocates at least `requested` bytes, rounded up to a power of two.
    ///
    /// # Errors
    ///
    /// As [`Fifo::allocate`].
    pub fn allocate(requested: usize, width: HeaderWidth) -> Result<Self, FifoError> {
        Ok(Self::new(Fifo::allocate(requested)?, width))
    }
}

impl<'a> RecordFifo<Borrowed<'a, u8>> {
    /// Frames records inside a caller-owned byte buffer.
    ///
    /// # Errors
    ///
    /// As [`Fifo::borrowed`].
    pub fn borrowed(buf: &'a mut [u8], width: HeaderWidth) -> Result<Self, FifoError> {
        Ok(Self::new(Fifo::borrowed(buf)?, width))
    }
}

impl<S: Storage<u8>> RecordFifo<S> {
    /// Switches a byte fifo to record framing. Any queued bytes are dropped,
    /// since they carry no headers.
    pub fn new(mut fifo: Fifo<u8, S>, width: HeaderWidth) -> Self {
        fifo.reset();
        Self { fifo, width }
    }

    fn ring(&self) -> &Ring<u8, S> {
        self.fifo.ring()
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.fifo.is_initialized()
    }

    /// Always 1: records are framed over bytes.
    #[must_use]
    pub const fn element_size(&self) -> usize {
        1
    }

    #[must_use]
    pub const fn header_width(&self) -> HeaderWidth {
        self.width
    }

    /// Width of the record length header in bytes.
    #[must_use]
    pub const fn record_header_width(&self) -> usize {
        self.width.bytes()
    }

    #[must_use]
    pub const fn framing(&self) -> FramingMode {
        FramingMode::Record(self.width)
    }

    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        S::OWNERSHIP
    }

    /// Capacity in bytes, headers included.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.fifo.capacity()
    }

    /// Bytes queued, headers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Free bytes, before subtracting a header.
    #[must_use]
    pub fn unused(&self) -> usize {
        self.fifo.unused()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.fifo.is_full()
    }

    /// Largest payload the next [`push`](Self::push) could accept.
    #[must_use]
    pub fn available(&self) -> usize {
        self.ring().record_available(self.width)
    }

    /// Payload length of the next record, or 0 if empty.
    #[must_use]
    pub fn peek_len(&self) -> usize {
        // SAFETY: `&self` excludes every `&mut` transfer.
        unsafe { self.ring().next_len(self.width) }.unwrap_or(0)
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// [`Rejected`] if the payload is longer than the header allows or the
    /// record does not fit; nothing is written.
    pub fn push(&mut self, payload: &[u8]) -> Result<usize, Rejected> {
        // SAFETY: `&mut self` makes us the only producer.
        let result = unsafe { self.ring().push_record(self.width, payload) };
        if result.is_err() {
            trace!(len = payload.len(), unused = self.unused(), "record rejected");
        }
        result
    }

    /// Appends a one-byte record.
    ///
    /// # Errors
    ///
    /// As [`push`](Self::push).
    pub fn put(&mut self, byte: u8) -> Result<(), Rejected> {
        self.push(&[byte]).map(|_| ())
    }

    /// Removes the next record, copying as much of its payload as fits in
    /// `buf`. The rest of a longer payload is dropped.
    pub fn pop(&mut self, buf: &mut [u8]) -> Option<Received> {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring().pop_record(self.width, buf) }
    }

    /// As [`pop`](Self::pop) without removing the record.
    pub fn peek(&self, buf: &mut [u8]) -> Option<Received> {
        // SAFETY: `&self` excludes every `&mut` transfer.
        unsafe { self.ring().peek_record(self.width, buf) }
    }

    /// Discards the next record, if any.
    pub fn skip(&mut self) {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring().skip_record(self.width) }
    }

    pub fn reset(&mut self) {
        self.fifo.reset();
    }

    pub fn reset_out(&mut self) {
        self.fifo.reset_out();
    }

    /// Appends one record of up to `len` bytes read from `src`.
    ///
    /// `len` is clamped to the header maximum. Returns `Ok(0)` without
    /// touching `src` if the record does not fit.
    ///
    /// # Errors
    ///
    /// Returns the source's [`Fault`]; nothing is published.
    pub fn push_from<Src>(&mut self, src: &mut Src, len: usize) -> Result<usize, Fault>
    where
        Src: Source<u8> + ?Sized,
    {
        // SAFETY: `&mut self` makes us the only producer.
        unsafe { self.ring().push_from(self.width, src, len) }
    }

    /// Writes up to `len` payload bytes of the next record into `sink` and
    /// removes the whole record.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`Fault`]; the record stays queued.
    pub fn pop_to<K>(&mut self, sink: &mut K, len: usize) -> Result<Option<Received>, Fault>
    where
        K: Sink<u8> + ?Sized,
    {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring().pop_to(self.width, sink, len) }
    }

    /// Splits into a record producer and a record consumer for two threads.
    pub fn split(&mut self) -> (RecordProducer<'_, S>, RecordConsumer<'_, S>) {
        let ring = self.fifo.ring();
        (
            RecordProducer::new(ring, self.width),
            RecordConsumer::new(ring, self.width),
        )
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        self.fifo.storage()
    }

    /// Unwraps the underlying byte fifo, records and all.
    #[must_use]
    pub fn into_inner(self) -> Fifo<u8, S> {
        self.fifo
    }

    #[cfg(test)]
    fn seed_cursors(&mut self, pos: usize) {
        self.fifo.seed_cursors(pos);
    }
}

impl<S: Storage<u8>> std::fmt::Debug for RecordFifo<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFifo")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("header_width", &self.width)
            .field("ownership", &self.ownership())
            .finish()
    }
}
