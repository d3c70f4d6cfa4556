//! Storage allocated at run time.

use std::cell::UnsafeCell;
use std::mem::size_of;

use super::{Ownership, Storage};
use crate::error::{FifoError, InvalidArgument};
use crate::trace::debug;

/// Slots allocated from the heap and released when dropped.
pub struct Heap<T> {
    slots: Box<[UnsafeCell<T>]>,
}

impl<T: Copy + Default> Heap<T> {
    /// Allocates exactly `slots` default-filled elements.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `T` is zero-sized or the byte size overflows,
    /// `OutOfMemory` if the allocator refuses the request.
    pub fn with_slots(slots: usize) -> Result<Self, FifoError> {
        let bytes = storage_bytes::<T>(slots)?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(slots)
            .map_err(|_| FifoError::OutOfMemory { bytes })?;
        buf.resize_with(slots, || UnsafeCell::new(T::default()));

        debug!(slots, bytes, "allocated ring storage");
        Ok(Self {
            slots: buf.into_boxed_slice(),
        })
    }
}

/// Byte size of `slots` elements of `T`, rejecting zero-sized types and
/// sizes the allocator could never satisfy.
pub(crate) fn storage_bytes<T>(slots: usize) -> Result<usize, InvalidArgument> {
    let size = size_of::<T>();
    if size == 0 {
        return Err(InvalidArgument::ZeroSizedElement);
    }
    slots
        .checked_mul(size)
        .filter(|bytes| *bytes <= isize::MAX as usize)
        .ok_or(InvalidArgument::Overflow(slots))
}

// SAFETY: the boxed slice lives as long as `self`, never changes length, and
// every element is an `UnsafeCell`, so writes through `&self` are permitted.
unsafe impl<T> Storage<T> for Heap<T> {
    const OWNERSHIP: Ownership = Ownership::Owned;

    #[inline]
    fn slots(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn as_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.slots.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_allocates_exact_slots() {
        let storage = Heap::<u64>::with_slots(16).unwrap();
        assert_eq!(storage.slots(), 16);
        assert_eq!(<Heap<u64> as Storage<u64>>::OWNERSHIP, Ownership::Owned);
    }

    #[test]
    fn test_heap_rejects_zero_sized() {
        assert!(matches!(
            Heap::<()>::with_slots(4),
            Err(FifoError::InvalidArgument(InvalidArgument::ZeroSizedElement))
        ));
    }

    #[test]
    fn test_heap_rejects_byte_overflow() {
        assert!(matches!(
            Heap::<u64>::with_slots(usize::MAX / 4),
            Err(FifoError::InvalidArgument(InvalidArgument::Overflow(_)))
        ));
    }

    #[test]
    fn test_storage_bytes() {
        assert_eq!(storage_bytes::<u32>(128), Ok(512));
        assert_eq!(storage_bytes::<u8>(0), Ok(0));
    }
}
