//! Streaming single-member gzip encoder.
//!
//! This module implements [`GzipStream`], the compression half of the write
//! path. It produces a standards-valid gzip stream incrementally so that a
//! reader can decode a consistent prefix of the file *before* the stream is
//! finalized.
//!
//! ## How It Works
//!
//! ```text
//! write(bytes)
//!     ↓
//! raw deflate engine (flate2::Compress)   ← CRC-32 updated over the
//!     ↓ compressed output                   uncompressed input
//! CountingWriter → disk
//! ```
//!
//! A single gzip member is written per file:
//!
//! - 10-byte header `1F 8B 08 00 00 00 00 00 00 00` (emitted at open, unless
//!   resuming an existing finalized file)
//! - raw deflate blocks, with sync-flush boundaries inserted by the
//!   background flusher
//! - 8-byte trailer: CRC-32 of the uncompressed data (LE), then the
//!   uncompressed length modulo 2^32 (LE)
//!
//! ## Background Flusher
//!
//! Deflate buffers input aggressively, so freshly appended records may sit
//! inside the engine for a long time on a quiet stream. A dedicated thread
//! wakes every `flush_interval` and performs a deflate *sync flush*: all
//! buffered compressed output is drained at a block boundary and the sink is
//! flushed. This bounds how stale the on-disk prefix can get, at the cost of
//! a slightly worse compression ratio (each flush boundary resets the
//! encoder's ability to back-reference).
//!
//! The flusher shares the engine mutex with `write()` — engine calls must
//! never interleave — and is stopped and joined before `close()` returns, so
//! the trailer write cannot race a flush.

use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crc32fast::Hasher;
use flate2::{Compress, Compression, FlushCompress, Status};
use tracing::{debug, warn};

use crate::count::CountingWriter;
use crate::error::{Error, Result};

/// Fixed gzip member header: magic `1F 8B`, method 8 (deflate), no flags,
/// zeroed modification time, no extra-flags, OS byte 0.
pub const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Default size of the buffer that receives compressed output from the
/// deflate engine.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Default wake-up period of the background flusher.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Engine-side state. Everything the deflate engine touches lives behind one
/// mutex so `write()` and the periodic flush are mutually exclusive.
struct Engine<W: Write> {
    compress: Compress,
    sink: CountingWriter<W>,
    crc: Hasher,
    /// Scratch buffer receiving compressed output; capacity is the drain
    /// granularity.
    buf: Vec<u8>,
    finished: bool,
}

impl<W: Write> Engine<W> {
    /// Feeds `data` into the deflate engine, draining compressed output
    /// until the engine has consumed the whole slice.
    fn deflate(&mut self, data: &[u8]) -> Result<()> {
        let mut pos = 0;
        while pos < data.len() {
            let consumed_before = self.compress.total_in();
            self.buf.clear();
            self.compress
                .compress_vec(&data[pos..], &mut self.buf, FlushCompress::None)?;
            pos += (self.compress.total_in() - consumed_before) as usize;

            if !self.buf.is_empty() {
                self.sink.write_all(&self.buf)?;
            }
        }

        self.crc.update(data);
        Ok(())
    }

    /// Sync-flushes the deflate engine and the sink: every byte written so
    /// far becomes decodable from the file, without finalizing the stream.
    fn sync_flush(&mut self) -> Result<()> {
        if !self.finished {
            loop {
                self.buf.clear();
                self.compress
                    .compress_vec(&[], &mut self.buf, FlushCompress::Sync)?;
                self.sink.write_all(&self.buf)?;

                // A full buffer means the engine may be holding more output
                if self.buf.len() < self.buf.capacity() {
                    break;
                }
            }
        }

        self.sink.flush()?;
        Ok(())
    }

    /// Finalizes the deflate stream and writes the gzip trailer. Must run
    /// exactly once.
    fn finish(&mut self) -> Result<()> {
        loop {
            self.buf.clear();
            let status = self
                .compress
                .compress_vec(&[], &mut self.buf, FlushCompress::Finish)?;
            self.sink.write_all(&self.buf)?;

            if status == Status::StreamEnd {
                break;
            }
        }

        // Trailer: CRC-32 of the uncompressed input, then its length modulo
        // 2^32, both little-endian, per the gzip trailer definition.
        let crc = std::mem::take(&mut self.crc).finalize();
        let length = (self.compress.total_in() & 0xffff_ffff) as u32;
        let mut trailer = [0u8; 8];
        trailer[..4].copy_from_slice(&crc.to_le_bytes());
        trailer[4..].copy_from_slice(&length.to_le_bytes());
        self.sink.write_all(&trailer)?;
        self.sink.flush()?;

        self.finished = true;
        Ok(())
    }
}

/// Incremental single-member gzip encoder with a periodic background flush.
///
/// Writes compress on the caller's thread; a dedicated flusher thread
/// sync-flushes the engine every `flush_interval` so a tailing reader can
/// always decode a recent prefix. [`GzipStream::close`] is idempotent and
/// joins the flusher before writing the trailer.
pub struct GzipStream<W: Write + Send + 'static> {
    engine: Arc<Mutex<Engine<W>>>,
    stop_tx: Option<mpsc::Sender<()>>,
    flusher: Option<JoinHandle<()>>,
}

impl<W: Write + Send + 'static> GzipStream<W> {
    /// Opens a gzip stream over `sink` with default buffer size and flush
    /// interval.
    pub fn open(sink: CountingWriter<W>, write_header: bool) -> Result<Self> {
        Self::with_options(sink, write_header, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL)
    }

    /// Opens a gzip stream over `sink`.
    ///
    /// `write_header` must be false only when resuming an existing,
    /// previously finalized file in append mode; a header is never
    /// re-emitted for resumed files.
    pub fn with_options(
        mut sink: CountingWriter<W>,
        write_header: bool,
        buffer_size: usize,
        flush_interval: Duration,
    ) -> Result<Self> {
        if write_header {
            sink.write_all(&GZIP_HEADER)?;
        }

        let engine = Arc::new(Mutex::new(Engine {
            compress: Compress::new(Compression::default(), false),
            sink,
            crc: Hasher::new(),
            buf: Vec::with_capacity(buffer_size.max(1)),
            finished: false,
        }));

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let flusher_engine = Arc::clone(&engine);
        let flusher = std::thread::Builder::new()
            .name("gzroll-flush".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(flush_interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Ok(mut engine) = flusher_engine.lock() else {
                                break;
                            };
                            if engine.finished {
                                break;
                            }
                            if let Err(err) = engine.sync_flush() {
                                warn!(error = %err, "periodic gzip flush failed");
                            }
                        }
                        // Explicit stop, or the stream was dropped
                        _ => break,
                    }
                }
                debug!("gzip flusher stopped");
            })?;

        Ok(Self {
            engine,
            stop_tx: Some(stop_tx),
            flusher: Some(flusher),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Engine<W>>> {
        self.engine
            .lock()
            .map_err(|_| Error::Compression("gzip engine mutex poisoned".to_string()))
    }

    /// Compresses and writes `data`. A zero-length slice is a no-op; writing
    /// after [`close`](Self::close) fails with [`Error::StreamFinished`].
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let mut engine = self.lock()?;

        if engine.finished {
            return Err(Error::StreamFinished);
        }
        if data.is_empty() {
            return Ok(());
        }

        engine.deflate(data)
    }

    /// Forces a sync flush now, without waiting for the periodic flusher.
    pub fn flush(&self) -> Result<()> {
        self.lock()?.sync_flush()
    }

    /// Bytes written to the underlying sink so far (compressed size).
    pub fn sink_size(&self) -> u64 {
        self.lock().map(|engine| engine.sink.count()).unwrap_or(0)
    }

    /// Finalizes the stream: stops and joins the flusher, drains the deflate
    /// engine, writes the gzip trailer and flushes the sink.
    ///
    /// Idempotent — repeated calls after the first are no-ops.
    pub fn close(&mut self) -> Result<()> {
        let Some(stop_tx) = self.stop_tx.take() else {
            return Ok(());
        };

        // Wake the flusher and wait for it to exit before touching the
        // engine, so the trailer write cannot race a periodic flush.
        let _ = stop_tx.send(());
        drop(stop_tx);
        if let Some(flusher) = self.flusher.take() {
            let _ = flusher.join();
        }

        let mut engine = self.lock()?;
        if engine.finished {
            return Ok(());
        }
        engine.finish()
    }
}

impl<W: Write + Send + 'static> Drop for GzipStream<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to finalize gzip stream on drop");
        }
    }
}
