//! Retention policies for rotated files.
//!
//! A retention policy answers two questions at rollover time: which
//! historical files to delete or rename, and which path the next active
//! stream should open. Two policies are provided:
//!
//! - [`IndexedRetention`] — the active file has a fixed name; finished files
//!   are archived under an indexed pattern within a bounded window
//!   (ascending or descending numbering), or with ever-increasing indices in
//!   unbounded mode.
//! - [`DirectWriteRetention`] — the active file is written directly under
//!   its near-final (date-bucketed, counter-indexed) name and only gains its
//!   `.gz` extension once the stream is finalized, so no observer ever sees
//!   a finished-looking name on a file still being compressed.
//!
//! Candidate files are rediscovered from disk on every rollover and never
//! cached across rollovers, so externally added or removed files are
//! tolerated.

mod direct;
mod indexed;

pub use direct::DirectWriteRetention;
pub use indexed::IndexedRetention;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pattern::FilePattern;

/// A historical file discovered on disk, with the index embedded in its
/// name. Ephemeral: rebuilt fresh on every rollover.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub index: u32,
    pub path: PathBuf,
}

/// Scans `directory` for files matching `pattern`, sorted by ascending
/// index. A missing directory yields no candidates.
pub fn scan_candidates(
    directory: &Path,
    pattern: &FilePattern,
    now: &DateTime<Local>,
) -> Result<Vec<Candidate>> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        if let Some(index) = pattern.parse_index(&file_name.to_string_lossy(), now) {
            candidates.push(Candidate {
                index,
                path: entry.path(),
            });
        }
    }

    candidates.sort_by_key(|c| c.index);
    debug!(count = candidates.len(), "eligible files scanned");
    Ok(candidates)
}

/// The computed result of one indexed rollover decision: filesystem
/// operations to perform, in order, plus the path the next active stream
/// should open. Computed, executed, then discarded.
#[derive(Debug)]
pub struct RolloverPlan {
    /// Files to delete, first.
    pub deletes: Vec<PathBuf>,
    /// Index-shifting renames, second. Ordered so they never collide.
    pub renames: Vec<(PathBuf, PathBuf)>,
    /// Final rename of the just-finished active file to its archive name,
    /// last. `None` when the archive name equals the active name.
    pub archive: Option<(PathBuf, PathBuf)>,
    /// Path for the next active stream.
    pub next_path: PathBuf,
}

impl RolloverPlan {
    /// Executes the plan's filesystem operations in order, aborting on the
    /// first failure. A partial execution is reported as [`Error::Rotation`]
    /// so the caller can keep its previous stream instead of losing data.
    pub fn execute(&self) -> Result<()> {
        for path in &self.deletes {
            fs::remove_file(path).map_err(|err| {
                Error::Rotation(format!("unable to delete {}: {err}", path.display()))
            })?;
            debug!(path = %path.display(), "deleted rotated file");
        }

        for (from, to) in &self.renames {
            fs::rename(from, to).map_err(|err| {
                Error::Rotation(format!(
                    "unable to rename {} to {}: {err}",
                    from.display(),
                    to.display()
                ))
            })?;
            debug!(from = %from.display(), to = %to.display(), "renamed rotated file");
        }

        if let Some((from, to)) = &self.archive {
            fs::rename(from, to).map_err(|err| {
                Error::Rotation(format!(
                    "unable to archive {} as {}: {err}",
                    from.display(),
                    to.display()
                ))
            })?;
            debug!(from = %from.display(), to = %to.display(), "archived active file");
        }

        Ok(())
    }
}
