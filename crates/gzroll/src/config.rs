//! Writer Configuration
//!
//! Controls where the active file lives, how rotated files are named and
//! retained, and the write-path tuning knobs:
//!
//! - **directory / file_name / pattern**: the active file and the naming
//!   pattern for rotated files (see [`crate::pattern::FilePattern`])
//! - **retention**: which files survive a rollover (indexed window,
//!   unbounded, or direct-write)
//! - **flush_interval_ms**: period of the background gzip sync flush
//!   (default: 1 second)
//! - **buffer_size**: compressed-output drain buffer (default: 8 KiB)
//! - **locking**: hold a whole-file advisory lock around each write, for
//!   cooperation with other processes (default: off)
//!
//! ## Usage
//!
//! ```ignore
//! use gzroll::{IndexOrdering, RetentionConfig, RollerConfig};
//!
//! // Fixed active file, seven indexed archives
//! let mut config = RollerConfig::new("./logs", "app.%i.log.gz");
//! config.file_name = Some("app.log".to_string());
//!
//! // Date-bucketed direct-write files, five per day
//! let config = RollerConfig {
//!     retention: RetentionConfig::DirectWrite { max_files: 5 },
//!     ..RollerConfig::new("./logs", "app-%d{%Y-%m-%d}-%i.log.gz")
//! };
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollerConfig {
    /// Directory holding the active file and its rotated siblings.
    pub directory: PathBuf,

    /// Name of the active file. Required for indexed retention; ignored by
    /// direct-write, which derives the active name from the pattern.
    #[serde(default)]
    pub file_name: Option<String>,

    /// Naming pattern for rotated files, with one `%i` index slot and
    /// optional `%d{...}` date slots.
    pub pattern: String,

    /// Retention policy applied at rollover.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Period of the background gzip sync flush, in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Size of the buffer draining compressed output from the deflate
    /// engine.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Hold a whole-file advisory lock for the duration of each write.
    /// Only matters when other processes write the same file.
    #[serde(default)]
    pub locking: bool,
}

impl RollerConfig {
    pub fn new(directory: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: None,
            pattern: pattern.into(),
            retention: RetentionConfig::default(),
            flush_interval_ms: default_flush_interval_ms(),
            buffer_size: default_buffer_size(),
            locking: false,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_buffer_size() -> usize {
    8 * 1024
}

/// Which rotated files survive a rollover.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RetentionConfig {
    /// Bounded window of indexed archives next to a fixed active file.
    Indexed {
        #[serde(default = "default_min_index")]
        min_index: u32,
        #[serde(default = "default_max_index")]
        max_index: u32,
        #[serde(default)]
        ordering: IndexOrdering,
    },

    /// Indexed archives that grow without bound; nothing is ever deleted.
    Unbounded,

    /// Date-bucketed files written directly under their near-final name,
    /// suffixed with `.gz` at rollover.
    DirectWrite {
        #[serde(default = "default_max_files")]
        max_files: u32,
    },
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig::Indexed {
            min_index: default_min_index(),
            max_index: default_max_index(),
            ordering: IndexOrdering::default(),
        }
    }
}

fn default_min_index() -> u32 {
    1
}

fn default_max_index() -> u32 {
    7
}

fn default_max_files() -> u32 {
    7
}

/// Direction of index numbering within an indexed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrdering {
    /// Smallest index is the oldest file; new archives take the top index.
    #[default]
    Ascending,
    /// Smallest index is the newest file; survivors shift up to make room
    /// at the bottom.
    Descending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RollerConfig::new("/var/log/app", "app.%i.log.gz");
        assert_eq!(config.flush_interval(), Duration::from_secs(1));
        assert_eq!(config.buffer_size, 8 * 1024);
        assert!(!config.locking);
        assert!(matches!(
            config.retention,
            RetentionConfig::Indexed {
                min_index: 1,
                max_index: 7,
                ordering: IndexOrdering::Ascending
            }
        ));
    }

    #[test]
    fn retention_deserializes_from_tagged_form() {
        let json = r#"{"type":"directwrite","max_files":3}"#;
        let retention: RetentionConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(
            retention,
            RetentionConfig::DirectWrite { max_files: 3 }
        ));

        let json = r#"{"type":"indexed","ordering":"descending"}"#;
        let retention: RetentionConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(
            retention,
            RetentionConfig::Indexed {
                min_index: 1,
                max_index: 7,
                ordering: IndexOrdering::Descending
            }
        ));
    }
}
