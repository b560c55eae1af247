//! Indexed retention: fixed active file name, archives numbered within a
//! bounded window.
//!
//! Ascending ordering keeps the oldest archive at the smallest index and
//! deletes from the low end; descending keeps the newest at the smallest
//! index, deletes from the high end and makes room at `min_index` by
//! shifting every survivor up. Unbounded mode never deletes and numbers
//! archives with an ever-increasing index.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{error, warn};

use crate::config::IndexOrdering;
use crate::error::Result;
use crate::pattern::FilePattern;
use crate::retention::{scan_candidates, RolloverPlan};

const MIN_WINDOW_INDEX: u32 = 1;
const DEFAULT_MAX_INDEX: u32 = 7;

/// Retention window and ordering for the indexed policy. Immutable for the
/// lifetime of a target.
#[derive(Debug, Clone)]
pub struct IndexedRetention {
    min_index: u32,
    max_index: u32,
    ordering: IndexOrdering,
    unbounded: bool,
}

impl IndexedRetention {
    /// Creates a bounded window. Out-of-range values are clamped to safe
    /// defaults rather than rejected, matching the appender's forgiving
    /// configuration handling.
    pub fn new(min_index: u32, max_index: u32, ordering: IndexOrdering) -> Self {
        let min_index = if min_index < MIN_WINDOW_INDEX {
            error!(min_index, "minimum window index too small, limited to {MIN_WINDOW_INDEX}");
            MIN_WINDOW_INDEX
        } else {
            min_index
        };

        let max_index = if max_index < min_index {
            let clamped = min_index.max(DEFAULT_MAX_INDEX);
            error!(
                max_index,
                "maximum window index must not be below the minimum, set to {clamped}"
            );
            clamped
        } else {
            max_index
        };

        Self {
            min_index,
            max_index,
            ordering,
            unbounded: false,
        }
    }

    /// No deletion; archive indices grow without bound.
    pub fn unbounded() -> Self {
        Self {
            min_index: MIN_WINDOW_INDEX,
            max_index: u32::MAX,
            ordering: IndexOrdering::Ascending,
            unbounded: true,
        }
    }

    pub fn min_index(&self) -> u32 {
        self.min_index
    }

    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// Computes the rollover plan for the file at `active_path`. Pure with
    /// respect to the filesystem apart from the candidate scan; execution is
    /// the caller's step.
    pub fn plan(
        &self,
        directory: &Path,
        pattern: &FilePattern,
        active_path: &Path,
        now: &DateTime<Local>,
    ) -> Result<RolloverPlan> {
        let candidates = scan_candidates(directory, pattern, now)?;

        let (deletes, renames, next_index) = if self.unbounded {
            let next = candidates.last().map(|c| c.index + 1).unwrap_or(1);
            (Vec::new(), Vec::new(), next)
        } else {
            match self.ordering {
                IndexOrdering::Ascending => self.plan_ascending(candidates, directory, pattern, now),
                IndexOrdering::Descending => {
                    self.plan_descending(candidates, directory, pattern, now)
                }
            }
        };

        let archive_path = directory.join(pattern.format(next_index, now));
        let archive = if archive_path == active_path {
            warn!(
                path = %active_path.display(),
                "archive name equals the active file name, rename skipped"
            );
            None
        } else {
            // Indices beyond max_index (a window shrunk between runs) push
            // the archive onto a slot a shift rename just filled.
            if renames.iter().any(|(_, to)| *to == archive_path) {
                warn!(
                    path = %archive_path.display(),
                    "archive name collides with a shifted survivor, it will be overwritten"
                );
            }
            Some((active_path.to_path_buf(), archive_path))
        };

        Ok(RolloverPlan {
            deletes,
            renames,
            archive,
            next_path: active_path.to_path_buf(),
        })
    }

    /// Oldest file carries the smallest index. Deletes from the low end
    /// while the window is full, then closes the gap by shifting every
    /// survivor down by one (smallest-first, so renames cannot collide).
    #[allow(clippy::type_complexity)]
    fn plan_ascending(
        &self,
        mut candidates: Vec<super::Candidate>,
        directory: &Path,
        pattern: &FilePattern,
        now: &DateTime<Local>,
    ) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>, u32) {
        let window = (self.max_index - self.min_index + 1) as usize;
        let mut deletes = Vec::new();

        while candidates.len() >= window {
            deletes.push(candidates.remove(0).path);
        }

        let mut renames = Vec::new();
        if !deletes.is_empty() {
            for candidate in &candidates {
                let to = directory.join(pattern.format(candidate.index - 1, now));
                renames.push((candidate.path.clone(), to));
            }
        }

        let next_index = match candidates.last() {
            Some(last) if last.index < self.max_index => last.index + 1,
            Some(_) => self.max_index,
            None => self.min_index,
        };

        (deletes, renames, next_index)
    }

    /// Newest file carries the smallest index. Deletes from the high end
    /// while strictly over the window, then shifts every survivor up by one
    /// (largest-first) to make room at `min_index` for the new file.
    #[allow(clippy::type_complexity)]
    fn plan_descending(
        &self,
        mut candidates: Vec<super::Candidate>,
        directory: &Path,
        pattern: &FilePattern,
        now: &DateTime<Local>,
    ) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>, u32) {
        let window = (self.max_index - self.min_index + 1) as usize;
        let mut deletes = Vec::new();

        while candidates.len() > window {
            match candidates.pop() {
                Some(last) => deletes.push(last.path),
                None => break,
            }
        }

        let mut renames = Vec::new();
        for candidate in candidates.iter().rev() {
            let to = directory.join(pattern.format(candidate.index + 1, now));
            renames.push((candidate.path.clone(), to));
        }

        (deletes, renames, self.min_index)
    }
}
