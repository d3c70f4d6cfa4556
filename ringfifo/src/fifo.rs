//! Flat fifo of fixed-size elements.
//!
//! [`Fifo`] is the single-owner front end of the ring: every transfer takes
//! `&mut self`, so no synchronisation is needed beyond what the borrow
//! checker already proves. To run a producer and a consumer on different
//! threads, [`split`](Fifo::split) the fifo into its two halves.
//!
//! # Construction
//!
//! | Constructor            | Storage            | Capacity rule                 |
//! |------------------------|--------------------|-------------------------------|
//! | [`Fifo::embedded`]     | [`Inline<T, N>`]   | `N` must be a power of two    |
//! | [`Fifo::allocate`]     | [`Heap<T>`]        | rounded **up** to a power of two |
//! | [`Fifo::borrowed`]     | [`Borrowed<T>`]    | rounded **down** to fit the slice |
//!
//! Every capacity is at least 2.
//!
//! # Example
//!
//! ```
//! use ringfifo::Fifo;
//!
//! let mut fifo = Fifo::<u32, _>::allocate(100)?;
//! assert_eq!(fifo.capacity(), 128);
//!
//! fifo.put(7).unwrap();
//! assert_eq!(fifo.copy_in(&[8, 9]), 2);
//!
//! let mut out = [0; 4];
//! assert_eq!(fifo.copy_out(&mut out), 3);
//! assert_eq!(&out[..3], &[7, 8, 9]);
//! # Ok::<(), ringfifo::FifoError>(())
//! ```

use std::mem::size_of;

use crate::error::{Fault, FifoError};
use crate::external::{Sink, Source};
use crate::record::FramingMode;
use crate::ring::{self, Ring};
use crate::spsc::{Consumer, Producer};
use crate::storage::heap::storage_bytes;
use crate::storage::{Borrowed, Heap, Inline, Ownership, Storage};
use crate::trace::{debug, trace, warn};

/// Fixed-capacity FIFO of `T` over storage `S`.
pub struct Fifo<T, S> {
    ring: Ring<T, S>,
}

impl<T: Copy + Default, const N: usize> Fifo<T, Inline<T, N>> {
    /// Creates a fifo whose `N` slots live inside the value.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `N` is not a power of two, is below 2, or `T` is
    /// zero-sized.
    pub fn embedded() -> Result<Self, FifoError> {
        let capacity = match ring::fixed_capacity(N) {
            Ok(capacity) => capacity,
            Err(err) => {
                warn!(capacity = N, %err, "rejected embedded fifo");
                return Err(err.into());
            }
        };
        storage_bytes::<T>(capacity)?;
        Ok(Self::with_storage(Inline::new(), capacity))
    }
}

impl<T: Copy + Default> Fifo<T, Heap<T>> {
    /// Allocates a fifo of at least `requested` elements; the capacity is
    /// rounded up to the next power of two.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the rounded capacity is below 2 or overflows, or
    /// `T` is zero-sized. `OutOfMemory` if the allocation fails.
    pub fn allocate(requested: usize) -> Result<Self, FifoError> {
        let capacity = match ring::round_up_capacity(requested) {
            Ok(capacity) => capacity,
            Err(err) => {
                warn!(requested, %err, "rejected fifo allocation");
                return Err(err.into());
            }
        };
        let storage = Heap::with_slots(capacity)?;
        debug!(requested, capacity, "allocated fifo");
        Ok(Self::with_storage(storage, capacity))
    }
}

impl<'a, T: Copy> Fifo<T, Borrowed<'a, T>> {
    /// Builds a fifo over a caller-owned buffer. The capacity is the largest
    /// power of two that fits in `buf`; any tail beyond it is left unused.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `buf` holds fewer than 2 elements or `T` is
    /// zero-sized.
    pub fn borrowed(buf: &'a mut [T]) -> Result<Self, FifoError> {
        storage_bytes::<T>(buf.len())?;
        let capacity = match ring::round_down_capacity(buf.len()) {
            Ok(capacity) => capacity,
            Err(err) => {
                warn!(len = buf.len(), %err, "rejected borrowed buffer");
                return Err(err.into());
            }
        };
        debug!(len = buf.len(), capacity, "attached borrowed buffer");
        Ok(Self::with_storage(Borrowed::new(buf), capacity))
    }
}

impl<T: Copy, S: Storage<T>> Fifo<T, S> {
    fn with_storage(storage: S, capacity: usize) -> Self {
        Self {
            ring: Ring::new(storage, capacity),
        }
    }

    pub(crate) const fn ring(&self) -> &Ring<T, S> {
        &self.ring
    }

    /// Always true: a fifo only exists once its storage is attached.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.ring.capacity() >= ring::MIN_CAPACITY
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn element_size(&self) -> usize {
        size_of::<T>()
    }

    /// Width of the record length header; 0 for a flat fifo.
    #[must_use]
    pub const fn record_header_width(&self) -> usize {
        0
    }

    #[must_use]
    pub const fn framing(&self) -> FramingMode {
        FramingMode::Flat
    }

    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        S::OWNERSHIP
    }

    /// Number of elements the fifo can hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Number of free slots.
    #[must_use]
    pub fn unused(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Bytes queued, i.e. `len() * element_size()`.
    #[must_use]
    pub fn peek_len(&self) -> usize {
        self.len() * self.element_size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// The backing storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        self.ring.storage()
    }

    /// Gives the backing storage back, dropping any queued elements.
    #[must_use]
    pub fn into_storage(self) -> S {
        self.ring.into_storage()
    }
}

impl<T: Copy, S: Storage<T>> Fifo<T, S> {
    /// Appends one element.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` if the fifo is full; nothing changes.
    #[inline]
    pub fn put(&mut self, value: T) -> Result<(), T> {
        // SAFETY: `&mut self` makes us the only producer and consumer.
        let result = unsafe { self.ring.put(value) };
        if result.is_err() {
            trace!(capacity = self.capacity(), "put rejected: fifo full");
        }
        result
    }

    /// Removes the oldest element.
    #[inline]
    #[must_use]
    pub fn get(&mut self) -> Option<T> {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring.get() }
    }

    /// Returns the oldest element without removing it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        // SAFETY: `&self` excludes every `&mut` transfer, so no other
        // consumer exists while we read.
        unsafe { self.ring.peek() }
    }

    /// Appends as many elements of `src` as fit and returns that count.
    #[inline]
    pub fn copy_in(&mut self, src: &[T]) -> usize {
        // SAFETY: `&mut self` makes us the only producer.
        unsafe { self.ring.copy_in(src) }
    }

    /// Moves up to `dst.len()` elements out and returns that count.
    #[inline]
    pub fn copy_out(&mut self, dst: &mut [T]) -> usize {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring.copy_out(dst) }
    }

    /// Copies up to `dst.len()` elements without removing them.
    #[inline]
    pub fn peek_many(&self, dst: &mut [T]) -> usize {
        // SAFETY: see `peek`.
        unsafe { self.ring.peek_many(dst) }
    }

    /// Discards the oldest element, if any.
    #[inline]
    pub fn skip(&mut self) {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring.skip() }
    }

    /// Empties the fifo and rewinds both cursors to zero.
    pub fn reset(&mut self) {
        self.ring.reset();
    }

    /// Discards everything queued by moving the read cursor to the write cursor.
    pub fn reset_out(&mut self) {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring.reset_out() }
    }

    /// Appends up to `len` elements produced by `src`.
    ///
    /// The count is limited by the free space. Either every element is
    /// published or none is.
    ///
    /// # Errors
    ///
    /// Returns the source's [`Fault`]; the fifo is left unmodified.
    pub fn copy_in_from<Src>(&mut self, src: &mut Src, len: usize) -> Result<usize, Fault>
    where
        Src: Source<T> + ?Sized,
    {
        // SAFETY: `&mut self` makes us the only producer.
        unsafe { self.ring.copy_in_from(src, len) }
    }

    /// Moves up to `len` elements into `sink`.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`Fault`]. The elements it accepted before failing
    /// (`fault.accepted`) are consumed; the rest stay queued.
    pub fn copy_out_to<K>(&mut self, sink: &mut K, len: usize) -> Result<usize, Fault>
    where
        K: Sink<T> + ?Sized,
    {
        // SAFETY: `&mut self` makes us the only consumer.
        unsafe { self.ring.copy_out_to(sink, len) }
    }

    /// Splits the fifo into a producer and a consumer that may run on two
    /// threads at once without locking.
    pub fn split(&mut self) -> (Producer<'_, T, S>, Consumer<'_, T, S>) {
        (Producer::new(&self.ring), Consumer::new(&self.ring))
    }

    #[cfg(test)]
    pub(crate) fn seed_cursors(&mut self, pos: usize) {
        self.ring.seed(pos);
    }
}

impl<T, S> std::fmt::Debug for Fifo<T, S>
where
    T: Copy,
    S: Storage<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fifo")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("element_size", &self.element_size())
            .field("ownership", &self.ownership())
            .finish()
    }
}
