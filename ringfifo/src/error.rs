//! Error types shared by every layer of the crate.
//!
//! Only construction and external transfers can fail hard. A full or empty
//! ring is not an error: `put` hands the value back, `get` returns `None`,
//! and a record that does not fit comes back as [`Rejected`].

use std::io;

use thiserror::Error;

/// Hard failures surfaced by constructors and the external adapters.
#[derive(Debug, Error)]
pub enum FifoError {
    /// A capacity or element type the ring cannot be built from.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),
    /// The allocator refused the backing storage.
    #[error("out of memory: could not allocate {bytes} bytes of ring storage")]
    OutOfMemory { bytes: usize },
    /// An external source or sink failed mid-transfer.
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Why a constructor rejected its arguments.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidArgument {
    /// Embedded capacities are fixed at definition and must already be a power of two.
    #[error("capacity {0} is not a power of two")]
    NotPowerOfTwo(usize),
    /// After rounding the ring would hold fewer than two elements.
    #[error("capacity {0} is below the minimum of 2")]
    TooSmall(usize),
    /// Rounding up, or the byte size of the storage, overflowed `usize`.
    #[error("capacity {0} overflows the addressable size")]
    Overflow(usize),
    /// Zero-sized element types have no bytes to queue.
    #[error("zero-sized element types are not supported")]
    ZeroSizedElement,
}

/// A record that was not written. The ring is left untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Header plus payload do not fit in the free space.
    #[error("record of {needed} bytes (header included) does not fit in {unused} free bytes")]
    Full { needed: usize, unused: usize },
    /// The payload length cannot be expressed by the record header.
    #[error("record payload of {len} bytes exceeds the header maximum of {max}")]
    TooLarge { len: usize, max: usize },
}

/// Failure reported by an external [`Source`](crate::Source) or [`Sink`](crate::Sink).
#[derive(Debug, Error)]
#[error("external transfer faulted after {accepted} elements: {source}")]
pub struct Fault {
    /// Elements transferred before the failure.
    pub accepted: usize,
    #[source]
    pub source: io::Error,
}

impl Fault {
    #[must_use]
    pub fn new(accepted: usize, source: io::Error) -> Self {
        Self { accepted, source }
    }

    /// Shift `accepted` by elements that were transferred by earlier segments.
    pub(crate) fn offset(mut self, by: usize) -> Self {
        self.accepted += by;
        self
    }
}
