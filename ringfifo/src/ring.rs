//! Core ring index engine shared by the flat and record front ends.
//!
//! Cursors are unbounded `usize` counters of elements ever produced
//! (`head`) and consumed (`tail`). They are masked only when a slot address
//! is computed, so `head - tail` in wrapping arithmetic is the exact fill
//! level as long as the capacity is far below `2^usize::BITS`. No slot is
//! reserved to tell full from empty.
//!
//! # Safety
//!
//! Methods in the producer and consumer sections are `unsafe` because the
//! caller must uphold the SPSC invariant: at most one thread acts as producer
//! and at most one as consumer at any time. The producer only writes `head`
//! and the slots at or after it; the consumer only writes `tail`.

use std::marker::PhantomData;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Fault, InvalidArgument};
use crate::external::{Sink, Source};
use crate::storage::Storage;

/// Smallest ring the engine accepts.
pub(crate) const MIN_CAPACITY: usize = 2;

/// Capacity of storage whose size is fixed at definition.
pub(crate) const fn fixed_capacity(slots: usize) -> Result<usize, InvalidArgument> {
    if !slots.is_power_of_two() {
        Err(InvalidArgument::NotPowerOfTwo(slots))
    } else if slots < MIN_CAPACITY {
        Err(InvalidArgument::TooSmall(slots))
    } else {
        Ok(slots)
    }
}

/// Capacity for a freshly allocated ring: `requested` rounded up.
pub(crate) fn round_up_capacity(requested: usize) -> Result<usize, InvalidArgument> {
    let capacity = requested
        .checked_next_power_of_two()
        .ok_or(InvalidArgument::Overflow(requested))?;
    if capacity < MIN_CAPACITY {
        return Err(InvalidArgument::TooSmall(requested));
    }
    Ok(capacity)
}

/// Capacity for a caller buffer of `slots` elements: rounded down, never
/// past the end of the buffer.
pub(crate) const fn round_down_capacity(slots: usize) -> Result<usize, InvalidArgument> {
    if slots < MIN_CAPACITY {
        return Err(InvalidArgument::TooSmall(slots));
    }
    Ok(1usize << slots.ilog2())
}

/// Producer-side state.
#[repr(C)]
#[repr(align(64))]
pub(crate) struct ProducerState {
    /// Elements ever published. Owned by the producer, read by the consumer.
    head: AtomicUsize,
}

/// Consumer-side state.
#[repr(C)]
#[repr(align(64))]
pub(crate) struct ConsumerState {
    /// Elements ever consumed. Owned by the consumer, read by the producer.
    tail: AtomicUsize,
}

/// Cursors, mask and slot storage.
#[repr(C)]
pub(crate) struct Ring<T, S> {
    producer: ProducerState,
    consumer: ConsumerState,
    mask: usize,
    storage: S,
    _marker: PhantomData<T>,
}

impl<T: Copy, S: Storage<T>> Ring<T, S> {
    /// Builds an empty ring over the first `capacity` slots of `storage`.
    ///
    /// `capacity` must be a power of two, at least [`MIN_CAPACITY`], and no
    /// larger than `storage.slots()`.
    pub(crate) fn new(storage: S, capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity >= MIN_CAPACITY);
        debug_assert!(capacity <= storage.slots());
        Self {
            producer: ProducerState {
                head: AtomicUsize::new(0),
            },
            consumer: ConsumerState {
                tail: AtomicUsize::new(0),
            },
            mask: capacity - 1,
            storage,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        self.mask + 1
    }

    pub(crate) const fn storage(&self) -> &S {
        &self.storage
    }

    pub(crate) fn into_storage(self) -> S {
        self.storage
    }

    /// Fill level seen by an observer that owns neither cursor.
    ///
    /// `tail` is loaded first so the difference can never go negative; the
    /// clamp covers a producer that refilled in between.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        let tail = self.consumer.tail.load(Ordering::Acquire);
        let head = self.producer.head.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.capacity())
    }

    /// Splits `n` slots starting at logical position `pos` into the offset of
    /// the first physical run and its length; the rest wraps to slot 0.
    #[inline]
    const fn run(&self, pos: usize, n: usize) -> (usize, usize) {
        let offset = pos & self.mask;
        let first = self.capacity() - offset;
        (offset, if n < first { n } else { first })
    }

    /// # Safety
    ///
    /// `n <= capacity`, and the caller must own the slots
    /// `pos..pos + n` under the SPSC protocol for the returned lifetime.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn slots_mut(&self, pos: usize, n: usize) -> (&mut [T], &mut [T]) {
        debug_assert!(n <= self.capacity());
        let (offset, first) = self.run(pos, n);
        let base = self.storage.as_ptr();
        // SAFETY: both runs lie inside the first `capacity` slots, which the
        // storage keeps valid and initialized; the caller owns them.
        unsafe {
            (
                slice::from_raw_parts_mut(base.add(offset), first),
                slice::from_raw_parts_mut(base, n - first),
            )
        }
    }

    /// # Safety
    ///
    /// As [`Ring::slots_mut`], but the slots must only be protected from
    /// concurrent writes.
    #[inline]
    unsafe fn slots(&self, pos: usize, n: usize) -> (&[T], &[T]) {
        debug_assert!(n <= self.capacity());
        let (offset, first) = self.run(pos, n);
        let base = self.storage.as_ptr().cast_const();
        // SAFETY: see `slots_mut`.
        unsafe {
            (
                slice::from_raw_parts(base.add(offset), first),
                slice::from_raw_parts(base, n - first),
            )
        }
    }
}

/// Producer role: only the thread that owns `head` may call the unsafe methods.
impl<T: Copy, S: Storage<T>> Ring<T, S> {
    /// Free slots as seen by the producer. A stale `tail` only under-reports.
    #[inline]
    pub(crate) fn producer_unused(&self) -> usize {
        let head = self.producer.head.load(Ordering::Relaxed);
        let tail = self.consumer.tail.load(Ordering::Acquire);
        self.capacity() - head.wrapping_sub(tail)
    }

    /// Writes one element and publishes it.
    ///
    /// # Safety
    ///
    /// Caller must be the only producer.
    #[inline]
    pub(crate) unsafe fn put(&self, value: T) -> Result<(), T> {
        if self.producer_unused() == 0 {
            return Err(value);
        }
        let head = self.producer.head.load(Ordering::Relaxed);
        // SAFETY: the slot at `head` is free (checked above) and unpublished,
        // so the consumer cannot be reading it.
        unsafe {
            *self.storage.as_ptr().add(head & self.mask) = value;
        }
        // Release orders the slot write before the cursor becomes visible.
        self.producer
            .head
            .store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Copies as much of `src` as fits and publishes it.
    ///
    /// # Safety
    ///
    /// Caller must be the only producer.
    #[inline]
    pub(crate) unsafe fn copy_in(&self, src: &[T]) -> usize {
        let n = src.len().min(self.producer_unused());
        // SAFETY: `n` slots past `head` are free; we are the producer.
        unsafe {
            self.write_at(0, &src[..n]);
            self.commit(n);
        }
        n
    }

    /// Writes `src` at `head + offset` without publishing.
    ///
    /// # Safety
    ///
    /// Caller must be the only producer and `offset + src.len()` must not
    /// exceed [`Ring::producer_unused`].
    #[inline]
    pub(crate) unsafe fn write_at(&self, offset: usize, src: &[T]) {
        // SAFETY: forwarded from the caller.
        let (first, second) = unsafe { self.producer_slots(offset, src.len()) };
        let (a, b) = src.split_at(first.len());
        first.copy_from_slice(a);
        second.copy_from_slice(b);
    }

    /// Unpublished slots `head + offset .. head + offset + n`.
    ///
    /// # Safety
    ///
    /// As [`Ring::write_at`].
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn producer_slots(&self, offset: usize, n: usize) -> (&mut [T], &mut [T]) {
        let head = self.producer.head.load(Ordering::Relaxed);
        // SAFETY: the range is free and unpublished.
        unsafe { self.slots_mut(head.wrapping_add(offset), n) }
    }

    /// Publishes `n` slots written since the last commit.
    ///
    /// # Safety
    ///
    /// Caller must be the only producer and must have written all `n` slots.
    #[inline]
    pub(crate) unsafe fn commit(&self, n: usize) {
        let head = self.producer.head.load(Ordering::Relaxed);
        self.producer
            .head
            .store(head.wrapping_add(n), Ordering::Release);
    }

    /// Fills up to `len` free slots from a fallible source. On a fault no
    /// slot is published.
    ///
    /// # Safety
    ///
    /// Caller must be the only producer.
    pub(crate) unsafe fn copy_in_from<Src>(&self, src: &mut Src, len: usize) -> Result<usize, Fault>
    where
        Src: Source<T> + ?Sized,
    {
        let n = len.min(self.producer_unused());
        // SAFETY: `n` slots past `head` are free; we are the producer.
        let (first, second) = unsafe { self.producer_slots(0, n) };
        src.read_elems(first)?;
        if !second.is_empty() {
            src.read_elems(second)
                .map_err(|fault| fault.offset(first.len()))?;
        }
        // SAFETY: both segments were fully written.
        unsafe { self.commit(n) };
        Ok(n)
    }
}

/// Consumer role: only the thread that owns `tail` may call the unsafe methods.
impl<T: Copy, S: Storage<T>> Ring<T, S> {
    /// Queued elements as seen by the consumer. A stale `head` only under-reports.
    #[inline]
    pub(crate) fn consumer_len(&self) -> usize {
        let tail = self.consumer.tail.load(Ordering::Relaxed);
        let head = self.producer.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// # Safety
    ///
    /// Caller must be the only consumer.
    #[inline]
    pub(crate) unsafe fn get(&self) -> Option<T> {
        // SAFETY: forwarded from the caller.
        let value = unsafe { self.peek()? };
        // SAFETY: `peek` found at least one queued element.
        unsafe { self.release(1) };
        Some(value)
    }

    /// # Safety
    ///
    /// Caller must be the only consumer.
    #[inline]
    pub(crate) unsafe fn peek(&self) -> Option<T> {
        if self.consumer_len() == 0 {
            return None;
        }
        let tail = self.consumer.tail.load(Ordering::Relaxed);
        // SAFETY: the slot at `tail` is published (Acquire in
        // `consumer_len`) and the producer will not reuse it until we release.
        Some(unsafe { *self.storage.as_ptr().add(tail & self.mask) })
    }

    /// # Safety
    ///
    /// Caller must be the only consumer.
    #[inline]
    pub(crate) unsafe fn copy_out(&self, dst: &mut [T]) -> usize {
        // SAFETY: forwarded from the caller.
        unsafe {
            let n = self.peek_many(dst);
            self.release(n);
            n
        }
    }

    /// # Safety
    ///
    /// Caller must be the only consumer.
    #[inline]
    pub(crate) unsafe fn peek_many(&self, dst: &mut [T]) -> usize {
        let n = dst.len().min(self.consumer_len());
        // SAFETY: `n` slots from `tail` are published.
        unsafe { self.read_at(0, &mut dst[..n]) };
        n
    }

    /// Copies published slots starting at `tail + offset` into `dst`.
    ///
    /// # Safety
    ///
    /// Caller must be the only consumer and `offset + dst.len()` must not
    /// exceed [`Ring::consumer_len`].
    #[inline]
    pub(crate) unsafe fn read_at(&self, offset: usize, dst: &mut [T]) {
        // SAFETY: forwarded from the caller.
        let (first, second) = unsafe { self.consumer_slots(offset, dst.len()) };
        let (a, b) = dst.split_at_mut(first.len());
        a.copy_from_slice(first);
        b.copy_from_slice(second);
    }

    /// # Safety
    ///
    /// As [`Ring::read_at`].
    #[inline]
    pub(crate) unsafe fn consumer_slots(&self, offset: usize, n: usize) -> (&[T], &[T]) {
        let tail = self.consumer.tail.load(Ordering::Relaxed);
        // SAFETY: the range is published and not yet released.
        unsafe { self.slots(tail.wrapping_add(offset), n) }
    }

    /// Hands `n` consumed slots back to the producer.
    ///
    /// # Safety
    ///
    /// Caller must be the only consumer and `n <= consumer_len()`.
    #[inline]
    pub(crate) unsafe fn release(&self, n: usize) {
        let tail = self.consumer.tail.load(Ordering::Relaxed);
        // Release orders our slot reads before the producer may reuse them.
        self.consumer
            .tail
            .store(tail.wrapping_add(n), Ordering::Release);
    }

    /// # Safety
    ///
    /// Caller must be the only consumer.
    #[inline]
    pub(crate) unsafe fn skip(&self) {
        if self.consumer_len() > 0 {
            // SAFETY: one element is queued.
            unsafe { self.release(1) };
        }
    }

    /// Discards everything published so far.
    ///
    /// # Safety
    ///
    /// Caller must be the only consumer.
    #[inline]
    pub(crate) unsafe fn reset_out(&self) {
        let head = self.producer.head.load(Ordering::Acquire);
        self.consumer.tail.store(head, Ordering::Release);
    }

    /// Drains up to `len` elements into a fallible sink. The read cursor
    /// advances by what the sink accepted, even when it faults.
    ///
    /// # Safety
    ///
    /// Caller must be the only consumer.
    pub(crate) unsafe fn copy_out_to<K>(&self, sink: &mut K, len: usize) -> Result<usize, Fault>
    where
        K: Sink<T> + ?Sized,
    {
        let n = len.min(self.consumer_len());
        // SAFETY: `n` slots from `tail` are published; we are the consumer.
        let (first, second) = unsafe { self.consumer_slots(0, n) };
        let result = sink.write_elems(first).and_then(|()| {
            if second.is_empty() {
                Ok(())
            } else {
                sink.write_elems(second)
                    .map_err(|fault| fault.offset(first.len()))
            }
        });
        match result {
            Ok(()) => {
                // SAFETY: all `n` elements were handed to the sink.
                unsafe { self.release(n) };
                Ok(n)
            }
            Err(mut fault) => {
                fault.accepted = fault.accepted.min(n);
                // SAFETY: `fault.accepted <= n` elements were handed over.
                unsafe { self.release(fault.accepted) };
                Err(fault)
            }
        }
    }
}

/// Operations that need both cursors to themselves.
impl<T: Copy, S: Storage<T>> Ring<T, S> {
    /// Empties the ring and rewinds both cursors to zero.
    pub(crate) fn reset(&mut self) {
        *self.producer.head.get_mut() = 0;
        *self.consumer.tail.get_mut() = 0;
    }

    /// Moves both cursors to `pos`, leaving the ring empty.
    #[cfg(test)]
    pub(crate) fn seed(&mut self, pos: usize) {
        *self.producer.head.get_mut() = pos;
        *self.consumer.tail.get_mut() = pos;
    }
}

// SAFETY: the ring is Sync because concurrent access is mediated by atomics:
// - `head`/`tail` are published with Release and observed with Acquire
// - each slot is owned by exactly one side at a time under the SPSC protocol
unsafe impl<T: Send, S: Send> Sync for Ring<T, S> {}
