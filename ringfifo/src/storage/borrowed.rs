//! Storage lent by the caller.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

use super::{Ownership, Storage};

/// A caller-owned slice used as ring slots. Nothing is freed on drop; the
/// borrow simply ends, and [`Borrowed::into_inner`] hands the slice back.
pub struct Borrowed<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> Borrowed<'a, T> {
    /// Takes the exclusive borrow of `buf` for the lifetime of the ring.
    #[must_use]
    pub fn new(buf: &'a mut [T]) -> Self {
        Self {
            len: buf.len(),
            ptr: NonNull::from(buf).cast::<T>(),
            _marker: PhantomData,
        }
    }

    /// Returns the whole original slice, including any tail the ring did not use.
    #[must_use]
    pub fn into_inner(self) -> &'a mut [T] {
        // SAFETY: `ptr`/`len` came from a `&'a mut [T]` whose exclusivity this
        // value has held ever since; giving it back ends our use of it.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<'a, T> From<&'a mut [T]> for Borrowed<'a, T> {
    fn from(buf: &'a mut [T]) -> Self {
        Self::new(buf)
    }
}

// SAFETY: equivalent to owning `&'a mut [T]`, which is `Send` when `T: Send`.
unsafe impl<T: Send> Send for Borrowed<'_, T> {}

// SAFETY: the pointer comes from an exclusive borrow held for `'a`, which
// outlives `self`; the slice length is fixed.
unsafe impl<T> Storage<T> for Borrowed<'_, T> {
    const OWNERSHIP: Ownership = Ownership::Borrowed;

    #[inline]
    fn slots(&self) -> usize {
        self.len
    }

    #[inline]
    fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrowed_returns_slice() {
        let mut buf = [1u16, 2, 3];
        let storage = Borrowed::new(&mut buf);
        assert_eq!(storage.slots(), 3);
        // SAFETY: index 1 is in bounds and nothing else touches the buffer.
        unsafe { *storage.as_ptr().add(1) = 20 };

        let back = storage.into_inner();
        assert_eq!(back, &[1, 20, 3]);
    }
}
