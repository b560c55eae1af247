//! The rolling writer.
//!
//! [`RollingWriter`] owns the single active stream for one target path and
//! orchestrates the rest of the crate:
//!
//! ```text
//! append(bytes)
//!     ↓ (writer mutex)
//! GzipStream.write()      ← incremental compression + CRC
//!     ↓
//! CountingWriter → disk   ← feeds current_size()
//!
//! check_rollover(true)
//!     ↓ (same mutex)
//! retention plan          ← which files to delete/rename, next path
//!     ↓
//! close active stream     ← trailer written exactly once
//!     ↓
//! execute plan            ← filesystem side effects
//!     ↓
//! open new active stream
//! ```
//!
//! One writer instance serves one target; arbitrarily many threads may share
//! it, and every operation serializes through its mutex. All state is owned
//! per instance, so multiple independent targets coexist in one process.
//!
//! ## Failure Handling
//!
//! A failed rollover never leaves the target without a usable stream: the
//! writer re-opens the path it was writing to (append mode) and keeps going,
//! retrying the rotation on the next trigger. Already-flushed bytes are
//! never touched by a failed rollover.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::Local;
use fs2::FileExt;
use tracing::{debug, error, info, warn};

use crate::config::{RetentionConfig, RollerConfig};
use crate::count::CountingWriter;
use crate::error::{Error, Result};
use crate::gzip::GzipStream;
use crate::pattern::FilePattern;
use crate::retention::{DirectWriteRetention, IndexedRetention};

/// The currently open stream: compressor, shared size counter and the
/// path being written. Exactly one per writer while the writer is open.
struct ActiveStream {
    gz: GzipStream<File>,
    size: Arc<AtomicU64>,
    path: PathBuf,
    /// Duplicate handle used for whole-file advisory locking.
    lock_file: Option<File>,
    created_at: SystemTime,
}

enum Policy {
    Indexed(IndexedRetention),
    Direct(DirectWriteRetention),
}

struct WriterState {
    config: RollerConfig,
    pattern: FilePattern,
    policy: Policy,
    stream: Option<ActiveStream>,
}

/// A size/time-rotated gzip log writer for a single target path.
///
/// `append` succeeds only while the writer is open; `close` transitions it
/// to the closed state and is idempotent.
pub struct RollingWriter {
    state: Mutex<WriterState>,
}

impl RollingWriter {
    /// Opens the writer and its first active stream.
    ///
    /// An existing non-empty active file is resumed in append mode without
    /// re-emitting a gzip header, with the size counter seeded from its
    /// on-disk length; otherwise a fresh stream (header included) starts at
    /// size zero.
    pub fn open(config: RollerConfig) -> Result<Self> {
        let pattern = FilePattern::parse(&config.pattern)?;
        let mut policy = match config.retention {
            RetentionConfig::Indexed {
                min_index,
                max_index,
                ordering,
            } => Policy::Indexed(IndexedRetention::new(min_index, max_index, ordering)),
            RetentionConfig::Unbounded => Policy::Indexed(IndexedRetention::unbounded()),
            RetentionConfig::DirectWrite { max_files } => {
                Policy::Direct(DirectWriteRetention::new(max_files))
            }
        };

        fs::create_dir_all(&config.directory)?;

        let now = Local::now();
        let active_path = match &mut policy {
            Policy::Direct(retention) => {
                let name = retention.current_file_name(&config.directory, &pattern, &now)?;
                config.directory.join(name)
            }
            Policy::Indexed(_) => {
                let file_name = config.file_name.as_deref().ok_or_else(|| {
                    Error::InvalidPattern(
                        "indexed retention requires a fixed active file_name".to_string(),
                    )
                })?;
                config.directory.join(file_name)
            }
        };

        let stream = open_stream(&active_path, &config)?;

        Ok(Self {
            state: Mutex::new(WriterState {
                config,
                pattern,
                policy,
                stream: Some(stream),
            }),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, WriterState>> {
        self.state
            .lock()
            .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::Other, "writer mutex poisoned")))
    }

    /// Appends `bytes` to the active stream. Fails with
    /// [`Error::StreamFinished`] once the writer is closed.
    pub fn append(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state()?;
        let stream = state.stream.as_mut().ok_or(Error::StreamFinished)?;

        match &stream.lock_file {
            Some(lock_file) => {
                lock_file.lock_exclusive().map_err(Error::Lock)?;
                let result = stream.gz.write(bytes);
                if let Err(err) = lock_file.unlock() {
                    warn!(error = %err, "failed to release file lock");
                }
                result
            }
            None => stream.gz.write(bytes),
        }
    }

    /// Rotates now if `trigger` is true; otherwise does nothing. The
    /// decision itself belongs to the caller (see [`crate::trigger`]).
    pub fn check_rollover(&self, trigger: bool) -> Result<()> {
        if !trigger {
            return Ok(());
        }
        self.state()?.rollover()
    }

    /// Compressed size of the active file, including any resumed bytes.
    pub fn current_size(&self) -> u64 {
        self.state
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .stream
                    .as_ref()
                    .map(|stream| stream.size.load(Ordering::Relaxed))
            })
            .unwrap_or(0)
    }

    /// Path of the file currently being written, if the writer is open.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.stream.as_ref().map(|stream| stream.path.clone()))
    }

    /// Creation time of the active stream, if the writer is open.
    pub fn created_at(&self) -> Option<SystemTime> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.stream.as_ref().map(|stream| stream.created_at))
    }

    /// Sync-flushes the active stream so everything appended so far is
    /// decodable from disk.
    pub fn flush(&self) -> Result<()> {
        let state = self.state()?;
        match &state.stream {
            Some(stream) => stream.gz.flush(),
            None => Ok(()),
        }
    }

    /// Closes the active stream (trailer written) and transitions to the
    /// closed state. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state()?;
        let Some(mut active) = state.stream.take() else {
            return Ok(());
        };
        let result = active.gz.close();
        info!(path = %active.path.display(), "writer closed");
        result
    }
}

impl WriterState {
    fn rollover(&mut self) -> Result<()> {
        let Some(active) = &self.stream else {
            debug!("rollover requested on a closed writer, ignored");
            return Ok(());
        };
        let active_path = active.path.clone();
        let now = Local::now();

        match &mut self.policy {
            Policy::Indexed(retention) => {
                // Plan before touching the stream: a failed candidate scan
                // leaves the writer fully intact.
                let plan =
                    retention.plan(&self.config.directory, &self.pattern, &active_path, &now)?;

                close_active(&mut self.stream);

                if let Err(err) = plan.execute() {
                    warn!(
                        error = %err,
                        path = %active_path.display(),
                        "rollover aborted, resuming previous file"
                    );
                    self.stream = Some(reopen_fallback(&active_path, &self.config)?);
                    return Err(err);
                }

                let stream = open_stream(&plan.next_path, &self.config)?;
                info!(path = %plan.next_path.display(), "rollover complete");
                self.stream = Some(stream);
                Ok(())
            }
            Policy::Direct(retention) => {
                close_active(&mut self.stream);

                let rotated = retention
                    .rollover(&self.config.directory, &self.pattern, &active_path, &now);
                let named = match rotated {
                    Ok(()) => {
                        retention.current_file_name(&self.config.directory, &self.pattern, &now)
                    }
                    Err(err) => Err(err),
                };

                let next_path = match named {
                    Ok(name) => self.config.directory.join(name),
                    Err(err) => {
                        warn!(
                            error = %err,
                            path = %active_path.display(),
                            "rollover aborted, resuming previous file"
                        );
                        self.stream = Some(reopen_fallback(&active_path, &self.config)?);
                        return Err(err);
                    }
                };

                let stream = open_stream(&next_path, &self.config)?;
                info!(path = %next_path.display(), "rollover complete");
                self.stream = Some(stream);
                Ok(())
            }
        }
    }
}

/// Finalizes and drops the active stream, logging instead of failing: at
/// this point in a rollover the decision to rotate is already made.
fn close_active(stream: &mut Option<ActiveStream>) {
    if let Some(mut active) = stream.take() {
        if let Err(err) = active.gz.close() {
            error!(
                path = %active.path.display(),
                error = %err,
                "failed to finalize stream before rollover"
            );
        }
    }
}

fn open_stream(path: &Path, config: &RollerConfig) -> Result<ActiveStream> {
    let existing_len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
        Err(err) => {
            return Err(Error::Open {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let created_at = if existing_len > 0 {
        file.metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .unwrap_or_else(SystemTime::now)
    } else {
        SystemTime::now()
    };

    let lock_file = if config.locking {
        Some(file.try_clone()?)
    } else {
        None
    };

    let sink = CountingWriter::with_initial(file, existing_len);
    let size = sink.count_handle();

    // A resumed non-empty file was already finalized once; the header is
    // never re-emitted for it.
    let write_header = existing_len == 0;
    let gz = GzipStream::with_options(
        sink,
        write_header,
        config.buffer_size,
        config.flush_interval(),
    )?;

    info!(
        path = %path.display(),
        resumed = existing_len > 0,
        size = existing_len,
        "log stream opened"
    );

    Ok(ActiveStream {
        gz,
        size,
        path: path.to_path_buf(),
        lock_file,
        created_at,
    })
}

fn reopen_fallback(path: &Path, config: &RollerConfig) -> Result<ActiveStream> {
    open_stream(path, config).map_err(|err| {
        error!(
            path = %path.display(),
            error = %err,
            "unable to reopen previous file, writer left without an active stream"
        );
        err
    })
}

impl io::Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RollingWriter::append(self, buf)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        RollingWriter::flush(self).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexOrdering;
    use std::io::Read;
    use std::time::Duration;
    use tempfile::TempDir;

    fn indexed_config(dir: &Path) -> RollerConfig {
        let mut config = RollerConfig::new(dir, "app.%i.log.gz");
        config.file_name = Some("app.log".to_string());
        config.retention = RetentionConfig::Indexed {
            min_index: 1,
            max_index: 3,
            ordering: IndexOrdering::Ascending,
        };
        config
    }

    fn decode(path: &Path) -> Vec<u8> {
        let mut decoder = flate2::read::GzDecoder::new(File::open(path).unwrap());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn append_and_close_round_trips() {
        let dir = TempDir::new().unwrap();
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();

        writer.append(b"abc").unwrap();
        writer.append(b"def").unwrap();
        writer.close().unwrap();

        assert_eq!(decode(&dir.path().join("app.log")), b"abcdef");
    }

    #[test]
    fn append_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();
        writer.close().unwrap();
        writer.close().unwrap(); // idempotent

        assert!(matches!(
            writer.append(b"late"),
            Err(Error::StreamFinished)
        ));
    }

    #[test]
    fn false_trigger_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();
        writer.append(b"stay").unwrap();
        writer.check_rollover(false).unwrap();

        assert_eq!(writer.current_path(), Some(dir.path().join("app.log")));
        assert!(!dir.path().join("app.1.log.gz").exists());
        writer.close().unwrap();
    }

    #[test]
    fn rollover_archives_and_reopens() {
        let dir = TempDir::new().unwrap();
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();

        writer.append(b"generation one\n").unwrap();
        writer.check_rollover(true).unwrap();
        writer.append(b"generation two\n").unwrap();
        writer.close().unwrap();

        assert_eq!(
            decode(&dir.path().join("app.1.log.gz")),
            b"generation one\n"
        );
        assert_eq!(decode(&dir.path().join("app.log")), b"generation two\n");
    }

    #[test]
    fn failed_rollover_keeps_writer_usable() {
        let dir = TempDir::new().unwrap();
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();
        writer.append(b"generation one\n").unwrap();

        // Squat a directory on the archive destination so the plan's final
        // rename fails.
        fs::create_dir(dir.path().join("app.1.log.gz")).unwrap();
        let err = writer.check_rollover(true).unwrap_err();
        assert!(matches!(err, Error::Rotation(_)));

        // The writer fell back to its previous path and keeps accepting
        // appends.
        assert_eq!(writer.current_path(), Some(dir.path().join("app.log")));
        writer.append(b"generation two\n").unwrap();

        // Once the obstruction is gone the next trigger rotates normally.
        fs::remove_dir(dir.path().join("app.1.log.gz")).unwrap();
        writer.check_rollover(true).unwrap();
        writer.append(b"generation three\n").unwrap();
        writer.close().unwrap();

        // The archived file holds one gzip member per open; nothing written
        // before the failed rotation was lost.
        let mut decoder = flate2::read::MultiGzDecoder::new(
            File::open(dir.path().join("app.1.log.gz")).unwrap(),
        );
        let mut recovered = String::new();
        decoder.read_to_string(&mut recovered).unwrap();
        assert_eq!(recovered, "generation one\ngeneration two\n");
        assert_eq!(decode(&dir.path().join("app.log")), b"generation three\n");
    }

    #[test]
    fn size_counter_resets_on_rollover() {
        let dir = TempDir::new().unwrap();
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();

        writer.append(b"some payload worth counting").unwrap();
        writer.flush().unwrap();
        let before = writer.current_size();
        assert!(before > 0);

        writer.check_rollover(true).unwrap();
        assert!(writer.current_size() < before);
        writer.close().unwrap();
    }

    #[test]
    fn resume_appends_without_second_header() {
        let dir = TempDir::new().unwrap();

        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();
        writer.append(b"before restart\n").unwrap();
        writer.close().unwrap();
        let finalized_len = fs::metadata(dir.path().join("app.log")).unwrap().len();

        // Reopen the same target, as after a process restart
        let writer = RollingWriter::open(indexed_config(dir.path())).unwrap();
        assert_eq!(writer.current_size(), finalized_len);
        writer.append(b"after restart\n").unwrap();
        writer.close().unwrap();

        let raw = fs::read(dir.path().join("app.log")).unwrap();
        // One header only, at the very start
        assert_eq!(&raw[..3], &[0x1f, 0x8b, 0x08]);
        assert_eq!(
            raw[10..].windows(3).filter(|w| w == &[0x1f, 0x8b, 0x08]).count(),
            0
        );
    }

    #[test]
    fn locking_mode_still_writes() {
        let dir = TempDir::new().unwrap();
        let mut config = indexed_config(dir.path());
        config.locking = true;

        let writer = RollingWriter::open(config).unwrap();
        writer.append(b"locked write\n").unwrap();
        writer.close().unwrap();
        assert_eq!(decode(&dir.path().join("app.log")), b"locked write\n");
    }

    #[test]
    fn concurrent_appends_serialize() {
        let dir = TempDir::new().unwrap();
        let mut config = indexed_config(dir.path());
        config.flush_interval_ms = 50;
        let writer = std::sync::Arc::new(RollingWriter::open(config).unwrap());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let writer = writer.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    writer.append(b"line\n").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        writer.close().unwrap();

        let decoded = decode(&dir.path().join("app.log"));
        assert_eq!(decoded.len(), 4 * 100 * 5);
        assert!(decoded.chunks(5).all(|chunk| chunk == b"line\n"));
    }

    #[test]
    fn write_trait_feeds_append() {
        use std::io::Write;

        let dir = TempDir::new().unwrap();
        let mut writer = RollingWriter::open(indexed_config(dir.path())).unwrap();
        writeln!(writer, "via the Write trait").unwrap();
        writer.close().unwrap();

        assert_eq!(decode(&dir.path().join("app.log")), b"via the Write trait\n");
    }

    #[test]
    fn indexed_requires_file_name() {
        let dir = TempDir::new().unwrap();
        let config = RollerConfig::new(dir.path(), "app.%i.log.gz");
        assert!(matches!(
            RollingWriter::open(config),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn flush_interval_keeps_prefix_fresh() {
        let dir = TempDir::new().unwrap();
        let mut config = indexed_config(dir.path());
        config.flush_interval_ms = 20;
        let writer = RollingWriter::open(config).unwrap();

        writer.append(b"stale-bounded\n").unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while writer.current_size() <= 10 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(writer.current_size() > 10);
        writer.close().unwrap();
    }
}
