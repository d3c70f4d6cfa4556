//! Fixed-capacity ring buffers with lock-free single-producer/single-consumer
//! transfer.
//!
//! - [`Fifo`] queues fixed-size `Copy` elements
//! - [`RecordFifo`] queues variable-length byte records behind a 1 or 2 byte
//!   length header
//!
//! Capacities are powers of two so slot addresses are a mask away from the
//! cursors, and the cursors themselves are free-running counters that wrap
//! through `usize::MAX` without losing track of the fill level.
//!
//! Storage is pluggable: inline in the value ([`Inline`]), allocated
//! ([`Heap`]) or lent by the caller ([`Borrowed`]).
//!
//! One producer thread and one consumer thread can work concurrently through
//! the halves returned by [`Fifo::split`]. More than one thread per side
//! needs a [`Locked`] wrapper on that side.

pub mod error;
pub mod external;
pub mod fifo;
pub mod lock;
pub mod record;
pub mod spsc;
pub mod storage;

mod ring;
mod trace;

pub use error::{Fault, FifoError, InvalidArgument, Rejected};
pub use external::{ReadSource, Sink, Source, WriteSink};
pub use fifo::Fifo;
pub use lock::{Lock, Locked, SpinGuard, SpinLock};
pub use record::{FramingMode, HeaderWidth, Received, RecordFifo};
pub use spsc::{Consumer, Producer, RecordConsumer, RecordProducer};
pub use storage::{Borrowed, Heap, Inline, Ownership, Storage};
pub use trace::init_tracing;
