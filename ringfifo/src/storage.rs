//! Backing storage for ring slots.
//!
//! The [`Storage`] trait lets the ring be written independently of where its
//! slots live. Three backends are provided, one per ownership discipline:
//!
//! - [`Inline`] - slots embedded in the fifo value itself, capacity fixed at definition
//! - [`Heap`] - slots allocated by the library and freed when the fifo is dropped
//! - [`Borrowed`] - a caller-owned slice, never freed here

pub mod borrowed;
pub mod heap;
pub mod inline;

pub use borrowed::Borrowed;
pub use heap::Heap;
pub use inline::Inline;

/// Who owns the memory behind a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Slots are part of the fifo value.
    Embedded,
    /// Slots were allocated by the fifo and are released on drop.
    Owned,
    /// Slots belong to the caller and outlive the fifo.
    Borrowed,
}

/// Slot memory a ring can be built on.
///
/// # Safety
///
/// Implementers must guarantee that:
/// - `as_ptr` returns the same pointer on every call, valid for reads and
///   writes of `slots()` initialized elements for as long as `self` lives
/// - writes through that pointer are permitted while only `&self` is held
///   (the memory sits behind `UnsafeCell` or an exclusive borrow)
/// - `slots()` never changes
pub unsafe trait Storage<T> {
    /// Ownership discipline of this backend.
    const OWNERSHIP: Ownership;

    /// Number of elements the backend can hold. The ring may use fewer.
    fn slots(&self) -> usize;

    /// Pointer to the first slot.
    fn as_ptr(&self) -> *mut T;
}
