//! Caller-supplied mutual exclusion for sharing one side of a fifo.
//!
//! The split halves are lock-free only for one producer and one consumer.
//! When several threads must produce (or consume), wrap that half in
//! [`Locked`] and every transfer runs under the lock. The other side stays
//! lock-free.
//!
//! ```
//! use std::thread;
//! use ringfifo::{Fifo, Locked};
//!
//! let mut fifo = Fifo::<u32, _>::allocate(16)?;
//! let (producer, consumer) = fifo.split();
//! let producer = Locked::<_>::new(producer);
//!
//! thread::scope(|s| {
//!     for t in 0..2 {
//!         let producer = &producer;
//!         s.spawn(move || {
//!             while producer.with(|p| p.put(t)).is_err() {
//!                 std::hint::spin_loop();
//!             }
//!         });
//!     }
//! });
//!
//! let mut seen = [consumer.get().unwrap(), consumer.get().unwrap()];
//! seen.sort();
//! assert_eq!(seen, [0, 1]);
//! # Ok::<(), ringfifo::FifoError>(())
//! ```

use std::cell::UnsafeCell;
use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A mutual-exclusion primitive. Dropping the guard releases the lock, so
/// every exit path of a locked section releases it, unwinding included.
pub trait Lock {
    type Guard<'a>
    where
        Self: 'a;

    /// Blocks (or spins) until the lock is held.
    fn acquire(&self) -> Self::Guard<'_>;
}

/// Test-and-test-and-set spinlock.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

/// Releases a [`SpinLock`] on drop.
#[derive(Debug)]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Lock for SpinLock {
    type Guard<'a> = SpinGuard<'a>;

    fn acquire(&self) -> SpinGuard<'_> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        SpinGuard { lock: self }
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// A poisoned mutex is still acquired: a panic inside a transfer leaves the
/// ring consistent, since cursors only move after the data is in place.
impl Lock for Mutex<()> {
    type Guard<'a> = MutexGuard<'a, ()>;

    fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A handle that is only reachable while `lock` is held.
pub struct Locked<H, L = SpinLock> {
    lock: L,
    handle: UnsafeCell<H>,
}

impl<H, L: Lock + Default> Locked<H, L> {
    pub fn new(handle: H) -> Self {
        Self::with_lock(handle, L::default())
    }
}

impl<H, L: Lock> Locked<H, L> {
    pub const fn with_lock(handle: H, lock: L) -> Self {
        Self {
            lock,
            handle: UnsafeCell::new(handle),
        }
    }

    /// Runs `f` on the handle while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let _guard = self.lock.acquire();
        // SAFETY: the guard gives us exclusive access until it drops, which
        // happens after `f` returns or unwinds.
        f(unsafe { &mut *self.handle.get() })
    }

    /// Exclusive access without locking.
    pub fn get_mut(&mut self) -> &mut H {
        self.handle.get_mut()
    }

    pub fn into_inner(self) -> H {
        self.handle.into_inner()
    }
}

// SAFETY: the handle is only touched through `with`, which serializes access
// under `lock`; moving `H` between threads needs `H: Send`.
unsafe impl<H: Send, L: Lock + Sync> Sync for Locked<H, L> {}

impl<H, L> std::fmt::Debug for Locked<H, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locked").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;

    use super::*;
    use crate::Fifo;
    use crate::storage::Inline;

    #[test]
    fn test_spinlock_excludes() {
        let counter = Locked::<u64>::new(0);
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        counter.with(|c| *c += 1);
                    }
                });
            }
        });
        assert_eq!(counter.into_inner(), 40_000);
    }

    #[test]
    fn test_lock_released_on_panic() {
        let spin = Locked::<Vec<u8>>::new(Vec::new());
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            spin.with(|v| {
                v.push(1);
                if v.len() == 1 {
                    panic!("transfer failed");
                }
            });
        }));
        assert!(result.is_err());
        spin.with(|v| v.push(2));
        assert_eq!(spin.into_inner(), vec![1, 2]);

        let mutex = Locked::<Vec<u8>, Mutex<()>>::new(Vec::new());
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            mutex.with(|v| {
                if v.is_empty() {
                    panic!("transfer failed");
                }
            });
        }));
        assert!(result.is_err());
        mutex.with(|v| v.push(3));
        assert_eq!(mutex.into_inner(), vec![3]);
    }

    #[test]
    fn test_locked_whole_fifo() {
        let fifo = Fifo::<u16, Inline<u16, 8>>::embedded().unwrap();
        let mut locked = Locked::<_, Mutex<()>>::new(fifo);
        assert_eq!(locked.with(|f| f.copy_in(&[1, 2, 3])), 3);
        assert_eq!(locked.with(Fifo::get), Some(1));
        assert_eq!(locked.get_mut().len(), 2);
    }

    #[test]
    fn test_multi_producer_delivery() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 5_000;

        let mut fifo = Fifo::<u64, _>::allocate(64).unwrap();
        let (producer, consumer) = fifo.split();
        let producer = Locked::<_>::new(producer);

        let received = thread::scope(|s| {
            for t in 0..PRODUCERS {
                let producer = &producer;
                s.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let value = (t << 32) | i;
                        while producer.with(|p| p.put(value)).is_err() {
                            hint::spin_loop();
                        }
                    }
                });
            }

            let mut received = Vec::new();
            while received.len() < (PRODUCERS * PER_PRODUCER) as usize {
                match consumer.get() {
                    Some(v) => received.push(v),
                    None => hint::spin_loop(),
                }
            }
            received
        });

        // Each producer's values arrive in order, with no loss or duplication.
        let mut last = [None::<u64>; PRODUCERS as usize];
        for &v in &received {
            let (t, i) = ((v >> 32) as usize, v & 0xFFFF_FFFF);
            assert!(last[t].is_none_or(|prev| prev < i));
            last[t] = Some(i);
        }
        let unique: HashSet<_> = received.iter().collect();
        assert_eq!(unique.len(), received.len());
    }
}
