//! Producer and consumer halves of a split fifo.
//!
//! [`Fifo::split`](crate::Fifo::split) hands out one [`Producer`] and one
//! [`Consumer`]. They can run on two threads at once with no lock:
//!
//! - the producer only advances the write cursor and fills slots ahead of it
//! - the consumer only advances the read cursor and drains slots behind it
//! - each side reads the other's cursor with Acquire and publishes its own
//!   with Release, so a stale view only ever under-reports free space or
//!   queued data
//!
//! Both halves are [`Send`] but not [`Sync`]: a half can move to another
//! thread, but two threads can never drive the same side. Several producers
//! or consumers need a [`Locked`](crate::Locked) wrapper around that side.
//!
//! # Example
//!
//! ```
//! use std::thread;
//! use ringfifo::Fifo;
//!
//! let mut fifo = Fifo::<u64, _>::allocate(64)?;
//! let (producer, consumer) = fifo.split();
//!
//! thread::scope(|s| {
//!     s.spawn(move || {
//!         for i in 0..1000 {
//!             while producer.put(i).is_err() {
//!                 std::hint::spin_loop();
//!             }
//!         }
//!     });
//!
//!     let mut expected = 0;
//!     while expected < 1000 {
//!         if let Some(v) = consumer.get() {
//!             assert_eq!(v, expected);
//!             expected += 1;
//!         }
//!     }
//! });
//! # Ok::<(), ringfifo::FifoError>(())
//! ```

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::{Fault, Rejected};
use crate::external::{Sink, Source};
use crate::record::{HeaderWidth, Received};
use crate::ring::Ring;
use crate::storage::Storage;

/// Marker type to opt-out of `Sync` while remaining `Send`.
pub(crate) type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of a split fifo.
pub struct Producer<'a, T, S> {
    ring: &'a Ring<T, S>,
    _unsync: PhantomUnsync,
}

/// Read end of a split fifo.
pub struct Consumer<'a, T, S> {
    ring: &'a Ring<T, S>,
    _unsync: PhantomUnsync,
}

impl<'a, T: Copy, S: Storage<T>> Producer<'a, T, S> {
    pub(crate) const fn new(ring: &'a Ring<T, S>) -> Self {
        Self {
            ring,
            _unsync: PhantomData,
        }
    }

    /// Appends one element (wait-free).
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` if the fifo looks full from this side.
    #[inline]
    pub fn put(&self, value: T) -> Result<(), T> {
        // SAFETY: only one `Producer` exists per split and it is not `Sync`.
        unsafe { self.ring.put(value) }
    }

    /// Appends as much of `src` as fits and returns that count.
    #[inline]
    pub fn copy_in(&self, src: &[T]) -> usize {
        // SAFETY: see `put`.
        unsafe { self.ring.copy_in(src) }
    }

    /// All-or-nothing fill from a fallible source, see
    /// [`Fifo::copy_in_from`](crate::Fifo::copy_in_from).
    ///
    /// # Errors
    ///
    /// Returns the source's [`Fault`]; nothing is published.
    pub fn copy_in_from<Src>(&self, src: &mut Src, len: usize) -> Result<usize, Fault>
    where
        Src: Source<T> + ?Sized,
    {
        // SAFETY: see `put`.
        unsafe { self.ring.copy_in_from(src, len) }
    }

    /// Free slots. May under-report while the consumer is draining.
    #[inline]
    #[must_use]
    pub fn unused(&self) -> usize {
        self.ring.producer_unused()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.unused() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<'a, T: Copy, S: Storage<T>> Consumer<'a, T, S> {
    pub(crate) const fn new(ring: &'a Ring<T, S>) -> Self {
        Self {
            ring,
            _unsync: PhantomData,
        }
    }

    /// Removes the oldest element (wait-free).
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<T> {
        // SAFETY: only one `Consumer` exists per split and it is not `Sync`.
        unsafe { self.ring.get() }
    }

    /// Returns the oldest element without removing it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        // SAFETY: see `get`.
        unsafe { self.ring.peek() }
    }

    /// Moves up to `dst.len()` elements out and returns that count.
    #[inline]
    pub fn copy_out(&self, dst: &mut [T]) -> usize {
        // SAFETY: see `get`.
        unsafe { self.ring.copy_out(dst) }
    }

    /// Copies up to `dst.len()` elements without removing them.
    #[inline]
    pub fn peek_many(&self, dst: &mut [T]) -> usize {
        // SAFETY: see `get`.
        unsafe { self.ring.peek_many(dst) }
    }

    /// Discards the oldest element, if any.
    #[inline]
    pub fn skip(&self) {
        // SAFETY: see `get`.
        unsafe { self.ring.skip() }
    }

    /// Discards everything the producer has published so far.
    pub fn reset_out(&self) {
        // SAFETY: see `get`.
        unsafe { self.ring.reset_out() }
    }

    /// Lossy drain into a fallible sink, see
    /// [`Fifo::copy_out_to`](crate::Fifo::copy_out_to).
    ///
    /// # Errors
    ///
    /// Returns the sink's [`Fault`]; what it accepted is consumed.
    pub fn copy_out_to<K>(&self, sink: &mut K, len: usize) -> Result<usize, Fault>
    where
        K: Sink<T> + ?Sized,
    {
        // SAFETY: see `get`.
        unsafe { self.ring.copy_out_to(sink, len) }
    }

    /// Queued elements. May under-report while the producer is filling.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.consumer_len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Write end of a split [`RecordFifo`](crate::RecordFifo).
pub struct RecordProducer<'a, S> {
    ring: &'a Ring<u8, S>,
    width: HeaderWidth,
    _unsync: PhantomUnsync,
}

/// Read end of a split [`RecordFifo`](crate::RecordFifo).
pub struct RecordConsumer<'a, S> {
    ring: &'a Ring<u8, S>,
    width: HeaderWidth,
    _unsync: PhantomUnsync,
}

impl<'a, S: Storage<u8>> RecordProducer<'a, S> {
    pub(crate) const fn new(ring: &'a Ring<u8, S>, width: HeaderWidth) -> Self {
        Self {
            ring,
            width,
            _unsync: PhantomData,
        }
    }

    /// Appends one record, header and payload published together.
    ///
    /// # Errors
    ///
    /// [`Rejected`] if the record is too large or does not fit.
    pub fn push(&self, payload: &[u8]) -> Result<usize, Rejected> {
        // SAFETY: only one `RecordProducer` exists per split and it is not `Sync`.
        unsafe { self.ring.push_record(self.width, payload) }
    }

    /// Appends a one-byte record.
    ///
    /// # Errors
    ///
    /// As [`push`](Self::push).
    pub fn put(&self, byte: u8) -> Result<(), Rejected> {
        self.push(&[byte]).map(|_| ())
    }

    /// See [`RecordFifo::push_from`](crate::RecordFifo::push_from).
    ///
    /// # Errors
    ///
    /// Returns the source's [`Fault`]; nothing is published.
    pub fn push_from<Src>(&self, src: &mut Src, len: usize) -> Result<usize, Fault>
    where
        Src: Source<u8> + ?Sized,
    {
        // SAFETY: see `push`.
        unsafe { self.ring.push_from(self.width, src, len) }
    }

    /// Largest payload that fits right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.ring.record_available(self.width)
    }

    #[must_use]
    pub fn unused(&self) -> usize {
        self.ring.producer_unused()
    }
}

impl<'a, S: Storage<u8>> RecordConsumer<'a, S> {
    pub(crate) const fn new(ring: &'a Ring<u8, S>, width: HeaderWidth) -> Self {
        Self {
            ring,
            width,
            _unsync: PhantomData,
        }
    }

    /// Removes the next record; a payload longer than `buf` is truncated.
    pub fn pop(&self, buf: &mut [u8]) -> Option<Received> {
        // SAFETY: only one `RecordConsumer` exists per split and it is not `Sync`.
        unsafe { self.ring.pop_record(self.width, buf) }
    }

    pub fn peek(&self, buf: &mut [u8]) -> Option<Received> {
        // SAFETY: see `pop`.
        unsafe { self.ring.peek_record(self.width, buf) }
    }

    pub fn skip(&self) {
        // SAFETY: see `pop`.
        unsafe { self.ring.skip_record(self.width) }
    }

    /// Payload length of the next record, or 0 if empty.
    #[must_use]
    pub fn peek_len(&self) -> usize {
        // SAFETY: see `pop`.
        unsafe { self.ring.next_len(self.width) }.unwrap_or(0)
    }

    pub fn reset_out(&self) {
        // SAFETY: see `pop`.
        unsafe { self.ring.reset_out() }
    }

    /// See [`RecordFifo::pop_to`](crate::RecordFifo::pop_to).
    ///
    /// # Errors
    ///
    /// Returns the sink's [`Fault`]; the record stays queued.
    pub fn pop_to<K>(&self, sink: &mut K, len: usize) -> Result<Option<Received>, Fault>
    where
        K: Sink<u8> + ?Sized,
    {
        // SAFETY: see `pop`.
        unsafe { self.ring.pop_to(self.width, sink, len) }
    }

    /// Queued bytes, headers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.consumer_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::record::HeaderWidth;
    use crate::storage::Inline;
    use crate::{Fifo, RecordFifo};

    fn assert_send<T: Send>() {}

    #[test]
    fn test_halves_are_send() {
        assert_send::<super::Producer<'static, u64, crate::Heap<u64>>>();
        assert_send::<super::Consumer<'static, u64, crate::Heap<u64>>>();
    }

    #[test]
    fn test_split_basic() {
        let mut fifo = Fifo::<u64, Inline<u64, 4>>::embedded().unwrap();
        {
            let (producer, consumer) = fifo.split();
            assert!(producer.put(1).is_ok());
            assert_eq!(producer.copy_in(&[2, 3, 4, 5]), 3);
            assert!(producer.is_full());
            assert_eq!(producer.put(6), Err(6));

            assert_eq!(consumer.len(), 4);
            assert_eq!(consumer.peek(), Some(1));
            consumer.skip();
            let mut out = [0; 2];
            assert_eq!(consumer.peek_many(&mut out), 2);
            assert_eq!(out, [2, 3]);
            assert_eq!(consumer.copy_out(&mut out), 2);
            assert_eq!(consumer.get(), Some(4));
            assert!(consumer.is_empty());
            assert_eq!(producer.unused(), 4);
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_reset_out_from_consumer() {
        let mut fifo = Fifo::<u8, Inline<u8, 8>>::embedded().unwrap();
        let (producer, consumer) = fifo.split();
        producer.copy_in(&[1, 2, 3]);
        consumer.reset_out();
        assert!(consumer.is_empty());
        assert_eq!(producer.unused(), 8);
        producer.put(4).unwrap();
        assert_eq!(consumer.get(), Some(4));
    }

    #[test]
    fn test_concurrent_put_get() {
        let mut fifo = Fifo::<u64, _>::allocate(64).unwrap();
        let (producer, consumer) = fifo.split();
        let count = 100_000u64;

        let received = thread::scope(|s| {
            s.spawn(move || {
                for i in 0..count {
                    while producer.put(i).is_err() {
                        std::hint::spin_loop();
                    }
                }
            });

            let consumer = s.spawn(move || {
                let mut received = Vec::with_capacity(count as usize);
                while received.len() < count as usize {
                    if let Some(item) = consumer.get() {
                        received.push(item);
                    } else {
                        std::hint::spin_loop();
                    }
                }
                received
            });
            consumer.join().unwrap()
        });

        for (i, &val) in received.iter().enumerate() {
            assert_eq!(val, i as u64);
        }
    }

    #[test]
    fn test_concurrent_bulk_copy() {
        let mut fifo = Fifo::<u32, _>::allocate(32).unwrap();
        let (producer, consumer) = fifo.split();
        let data: Vec<u32> = (0..50_000).collect();

        let received = thread::scope(|s| {
            let data = &data;
            s.spawn(move || {
                let mut sent = 0;
                while sent < data.len() {
                    let end = (sent + 7).min(data.len());
                    sent += producer.copy_in(&data[sent..end]);
                }
            });

            let mut received = Vec::with_capacity(data.len());
            let mut chunk = [0; 11];
            while received.len() < data.len() {
                let n = consumer.copy_out(&mut chunk);
                received.extend_from_slice(&chunk[..n]);
            }
            received
        });

        assert_eq!(received, data);
    }

    #[test]
    fn test_concurrent_records() {
        let mut fifo = RecordFifo::allocate(256, HeaderWidth::One).unwrap();
        let (producer, consumer) = fifo.split();
        let count = 20_000usize;

        thread::scope(|s| {
            s.spawn(move || {
                for i in 0..count {
                    let len = i % 40;
                    let payload = vec![i as u8; len];
                    while producer.push(&payload).is_err() {
                        std::hint::spin_loop();
                    }
                }
            });

            let mut buf = [0u8; 64];
            let mut next = 0;
            while next < count {
                let Some(received) = consumer.pop(&mut buf) else {
                    std::hint::spin_loop();
                    continue;
                };
                assert_eq!(received.len, next % 40);
                assert!(buf[..received.copied].iter().all(|&b| b == next as u8));
                next += 1;
            }
        });
        assert!(fifo.is_empty());
    }
}
