//! gzroll - Rolling Gzip Log Files
//!
//! This crate writes log data into gzip-compressed files that rotate on
//! demand, with a bounded set of archived siblings kept on disk.
//!
//! ## What does it do?
//!
//! A [`RollingWriter`] owns one active `.gz` file and compresses every
//! appended byte into it incrementally. When the caller decides it is time
//! to rotate (size, age, whatever policy it runs), the writer:
//!
//! 1. **Finalizes** the active stream (gzip trailer written exactly once)
//! 2. **Applies retention**: deletes and renames archived files so at most
//!    a configured number survive
//! 3. **Reopens** a fresh active stream and keeps accepting appends
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐
//! │  Log source  │
//! └──────┬───────┘
//!        │ append(bytes)
//!        ▼
//! ┌───────────────────┐
//! │  RollingWriter    │ ◄── one per target path, thread-safe
//! │  - active stream  │
//! │  - retention      │
//! └────────┬──────────┘
//!          │ bytes
//!          ▼
//! ┌───────────────────┐
//! │  GzipStream       │ ◄── raw deflate + CRC + periodic sync flush
//! └────────┬──────────┘
//!          │ compressed bytes
//!          ▼
//! ┌───────────────────┐
//! │  CountingWriter   │ ◄── feeds current_size()
//! └────────┬──────────┘
//!          │
//!          ▼
//!      app.log  app.1.log.gz  app.2.log.gz ...
//! ```
//!
//! ## Main Components
//!
//! ### RollingWriter
//! The entry point. Serializes appends, flushes and rollovers for one
//! target across any number of threads, and guarantees a usable stream
//! survives a failed rotation.
//!
//! ### GzipStream
//! An incremental gzip compressor over any `Write` sink. A background
//! thread sync-flushes it periodically so the on-disk prefix is always
//! decodable, bounding data loss on crash to one flush interval.
//!
//! ### Retention
//! Two families, selected by [`RetentionConfig`]:
//! - **Indexed** ([`IndexedRetention`]): a fixed active file plus a window
//!   of archived indices, ascending or descending, or unbounded.
//! - **Direct-write** ([`DirectWriteRetention`]): the active file is
//!   already named by the pattern; rollover renames it to `.gz` and purges
//!   beyond `max_files`.
//!
//! ### FilePattern
//! Parses naming patterns like `app.%i.log.gz` or
//! `app-%d{%Y-%m-%d}.%i.log`: exactly one `%i` index slot, optional
//! chrono-formatted `%d{...}` date slots.
//!
//! ## Usage Example
//!
//! ```ignore
//! use gzroll::{RollerConfig, RollingWriter, SizeTrigger, TriggerPolicy};
//!
//! let mut config = RollerConfig::new("/var/log/app", "app.%i.log.gz");
//! config.file_name = Some("app.log".to_string());
//!
//! let writer = RollingWriter::open(config)?;
//! let mut trigger = SizeTrigger::new(10 * 1024 * 1024);
//!
//! for line in lines {
//!     writer.check_rollover(trigger.should_rotate(writer.current_size(), line.len()))?;
//!     writer.append(line.as_bytes())?;
//! }
//! writer.close()?;
//! # Ok::<(), gzroll::Error>(())
//! ```

pub mod config;
pub mod count;
pub mod error;
pub mod gzip;
pub mod pattern;
pub mod retention;
pub mod trigger;
pub mod writer;

pub use config::{IndexOrdering, RetentionConfig, RollerConfig};
pub use count::CountingWriter;
pub use error::{Error, Result};
pub use gzip::{GzipStream, GZIP_HEADER};
pub use pattern::{FilePattern, GZIP_EXTENSION};
pub use retention::{DirectWriteRetention, IndexedRetention, RolloverPlan};
pub use trigger::{AgeTrigger, SizeTrigger, TriggerPolicy};
pub use writer::RollingWriter;
