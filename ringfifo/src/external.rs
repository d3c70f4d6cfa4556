//! Transfers whose far side can fail part-way.
//!
//! A [`Source`] feeds the producer side and a [`Sink`] drains the consumer
//! side. The two directions treat a [`Fault`] differently:
//!
//! - filling from a source is all-or-nothing: nothing is published unless
//!   every requested element was produced
//! - draining into a sink is lossy: whatever the sink accepted before the
//!   fault is consumed
//!
//! [`ReadSource`] and [`WriteSink`] adapt `std::io` byte streams.

use std::io::{self, Read, Write};

use crate::error::Fault;

/// Fallible producer of elements.
pub trait Source<T> {
    /// Fill all of `dst`, or fail.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] if `dst` could not be completely filled. Anything
    /// already written to `dst` is discarded by the caller.
    fn read_elems(&mut self, dst: &mut [T]) -> Result<(), Fault>;
}

/// Fallible consumer of elements.
pub trait Sink<T> {
    /// Accept all of `src`, or fail.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] whose `accepted` counts the leading elements of
    /// `src` the sink did take before failing.
    fn write_elems(&mut self, src: &[T]) -> Result<(), Fault>;
}

impl<T, Src: Source<T> + ?Sized> Source<T> for &mut Src {
    fn read_elems(&mut self, dst: &mut [T]) -> Result<(), Fault> {
        (**self).read_elems(dst)
    }
}

impl<T, K: Sink<T> + ?Sized> Sink<T> for &mut K {
    fn write_elems(&mut self, src: &[T]) -> Result<(), Fault> {
        (**self).write_elems(src)
    }
}

/// A slice is a source that runs dry: it yields its elements front to back
/// and faults with `UnexpectedEof` when asked for more than it has left.
impl<T: Copy> Source<T> for &[T] {
    fn read_elems(&mut self, dst: &mut [T]) -> Result<(), Fault> {
        if dst.len() > self.len() {
            return Err(Fault::new(
                0,
                io::Error::new(io::ErrorKind::UnexpectedEof, "source slice exhausted"),
            ));
        }
        let (head, rest) = self.split_at(dst.len());
        dst.copy_from_slice(head);
        *self = rest;
        Ok(())
    }
}

/// A vector accepts everything.
impl<T: Copy> Sink<T> for Vec<T> {
    fn write_elems(&mut self, src: &[T]) -> Result<(), Fault> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// Byte source over any [`Read`].
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Source<u8> for ReadSource<R> {
    fn read_elems(&mut self, dst: &mut [u8]) -> Result<(), Fault> {
        self.inner
            .read_exact(dst)
            .map_err(|source| Fault::new(0, source))
    }
}

/// Byte sink over any [`Write`]. Counts what the writer accepted so a fault
/// reports exactly how far the transfer got.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink<u8> for WriteSink<W> {
    fn write_elems(&mut self, src: &[u8]) -> Result<(), Fault> {
        let mut accepted = 0;
        while accepted < src.len() {
            match self.inner.write(&src[accepted..]) {
                Ok(0) => {
                    return Err(Fault::new(
                        accepted,
                        io::Error::new(io::ErrorKind::WriteZero, "sink accepted no bytes"),
                    ));
                }
                Ok(n) => accepted += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Fault::new(accepted, e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that takes `budget` bytes and then refuses.
    struct Budget {
        budget: usize,
        taken: Vec<u8>,
    }

    impl Write for Budget {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("budget exhausted"));
            }
            let n = buf.len().min(self.budget).min(3);
            self.budget -= n;
            self.taken.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_slice_source_runs_dry() {
        let data = [1u8, 2, 3];
        let mut src: &[u8] = &data;
        let mut dst = [0u8; 2];

        src.read_elems(&mut dst).unwrap();
        assert_eq!(dst, [1, 2]);
        assert_eq!(src, &[3]);

        let fault = src.read_elems(&mut dst).unwrap_err();
        assert_eq!(fault.source.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(src, &[3]);
    }

    #[test]
    fn test_read_source_faults_on_short_reader() {
        let mut src = ReadSource::new(&b"ab"[..]);
        let mut dst = [0u8; 4];
        let fault = src.read_elems(&mut dst).unwrap_err();
        assert_eq!(fault.accepted, 0);
        assert_eq!(fault.source.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_write_sink_counts_accepted_bytes() {
        let mut sink = WriteSink::new(Budget {
            budget: 5,
            taken: Vec::new(),
        });

        let fault = sink.write_elems(b"abcdefgh").unwrap_err();
        assert_eq!(fault.accepted, 5);
        assert_eq!(sink.into_inner().taken, b"abcde");
    }

    #[test]
    fn test_write_sink_reports_write_zero() {
        let mut buf = [0u8; 2];
        let mut sink = WriteSink::new(&mut buf[..]);
        let fault = sink.write_elems(b"xyz").unwrap_err();
        assert_eq!(fault.accepted, 2);
        assert_eq!(fault.source.kind(), io::ErrorKind::WriteZero);
    }
}
