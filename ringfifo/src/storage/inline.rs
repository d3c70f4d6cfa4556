//! Storage embedded in the fifo value.

use std::cell::UnsafeCell;

use super::{Ownership, Storage};

/// `N` slots stored inline, no heap allocation.
pub struct Inline<T, const N: usize> {
    slots: UnsafeCell<[T; N]>,
}

impl<T: Copy + Default, const N: usize> Inline<T, N> {
    /// Creates default-filled inline storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: UnsafeCell::new([T::default(); N]),
        }
    }
}

impl<T: Copy + Default, const N: usize> Default for Inline<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the slots sit behind an `UnsafeCell` owned by this value, so the
// pointer is valid for `N` elements while `self` lives and may be written
// through `&self`.
unsafe impl<T, const N: usize> Storage<T> for Inline<T, N> {
    const OWNERSHIP: Ownership = Ownership::Embedded;

    #[inline]
    fn slots(&self) -> usize {
        N
    }

    #[inline]
    fn as_ptr(&self) -> *mut T {
        self.slots.get().cast::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_reports_size_and_ownership() {
        let storage = Inline::<u32, 8>::new();
        assert_eq!(storage.slots(), 8);
        assert_eq!(<Inline<u32, 8> as Storage<u32>>::OWNERSHIP, Ownership::Embedded);
        assert_eq!(storage.as_ptr(), storage.as_ptr());
    }
}
