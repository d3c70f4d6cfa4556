//! Logging for ring lifecycle and rejected transfers.
//!
//! The crate emits three kinds of events:
//!
//! - `debug!` when storage is allocated or a borrowed buffer is attached,
//!   with the requested and rounded capacity
//! - `warn!` when a constructor rejects its capacity or element type
//! - `trace!` when a put or record push is turned away because the ring is full
//!
//! All of them compile away unless the `tracing` feature is on, so `put` and
//! `get` stay branch-free of logging in the default build.

/// Prints ring events through a `tracing-subscriber` fmt layer, stamped with
/// time since start and the emitting thread.
///
/// `RUST_LOG` picks the filter, defaulting to `ringfifo=trace`. Only the
/// first call installs a subscriber. Without the `tracing` feature this is
/// an empty function.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ringfifo=trace"));

    // Test binaries call this once per test; later calls are no-ops.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use warn_noop as warn;
