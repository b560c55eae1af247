//! Byte-counting sink.
//!
//! Wraps any `Write` and tracks the cumulative number of bytes passed
//! through. The total lives in an `Arc<AtomicU64>` so the rolling writer can
//! observe the compressed file size for rotation decisions without reaching
//! into the compressor that owns the sink.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A `Write` adapter that counts bytes as they pass through unchanged.
///
/// Purely observational: no buffering, no transformation, failures from the
/// wrapped sink propagate as-is.
pub struct CountingWriter<W: Write> {
    inner: W,
    count: Arc<AtomicU64>,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_initial(inner, 0)
    }

    /// Wraps `inner` with the counter pre-seeded, for resuming a file that
    /// already holds `initial` bytes on disk.
    pub fn with_initial(inner: W, initial: u64) -> Self {
        Self {
            inner,
            count: Arc::new(AtomicU64::new(initial)),
        }
    }

    /// Shared handle to the running total.
    pub fn count_handle(&self) -> Arc<AtomicU64> {
        self.count.clone()
    }

    /// Bytes written so far (including any initial seed).
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count.fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bytes_written() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"hello").unwrap();
        w.write_all(b" world").unwrap();
        assert_eq!(w.count(), 11);
        assert_eq!(w.get_ref().as_slice(), b"hello world");
    }

    #[test]
    fn initial_seed_is_included() {
        let mut w = CountingWriter::with_initial(Vec::new(), 100);
        w.write_all(b"abc").unwrap();
        assert_eq!(w.count(), 103);
        // Seed only affects the counter, not the sink contents
        assert_eq!(w.get_ref().len(), 3);
    }

    #[test]
    fn handle_observes_writes() {
        let mut w = CountingWriter::new(Vec::new());
        let handle = w.count_handle();
        assert_eq!(handle.load(Ordering::Relaxed), 0);
        w.write_all(&[0u8; 42]).unwrap();
        assert_eq!(handle.load(Ordering::Relaxed), 42);
    }
}
