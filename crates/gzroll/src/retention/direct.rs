//! Direct-write retention: log files are written directly under their
//! near-final, date-bucketed name and suffixed with `.gz` only once writing
//! completes.
//!
//! Because the active file carries no `.gz` extension, the candidate scan
//! (which matches the full pattern, extension included) sees only finished
//! files — an external observer can always tell a finalized archive from
//! the file still being compressed.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::pattern::{FilePattern, GZIP_EXTENSION};
use crate::retention::scan_candidates;

const MIN_MAX_FILES: u32 = 2;
const DEFAULT_MAX_FILES: u32 = 7;

/// Counter-based retention for date-bucketed file names.
#[derive(Debug)]
pub struct DirectWriteRetention {
    max_files: u32,
    /// Seeded lazily from disk; holds the index the next active file gets.
    next_index: Option<u32>,
    /// Cached suffix-less name of the file currently being written.
    current_file_name: Option<String>,
}

impl DirectWriteRetention {
    /// Creates the policy. `max_files` below 2 is rejected and replaced
    /// with the default.
    pub fn new(max_files: u32) -> Self {
        let max_files = if max_files < MIN_MAX_FILES {
            error!(max_files, "maximum files too small, limited to {DEFAULT_MAX_FILES}");
            DEFAULT_MAX_FILES
        } else {
            max_files
        };

        Self {
            max_files,
            next_index: None,
            current_file_name: None,
        }
    }

    pub fn max_files(&self) -> u32 {
        self.max_files
    }

    /// Name of the file the active stream should write to, without the
    /// `.gz` extension the pattern carries. Computed once and cached until
    /// the next rollover.
    pub fn current_file_name(
        &mut self,
        directory: &Path,
        pattern: &FilePattern,
        now: &DateTime<Local>,
    ) -> Result<String> {
        if let Some(name) = &self.current_file_name {
            return Ok(name.clone());
        }

        let candidates = scan_candidates(directory, pattern, now)?;
        let current_index = match self.next_index {
            Some(index) if index > 0 => index,
            _ => candidates.len() as u32,
        };
        let file_index = if candidates.is_empty() { 1 } else { current_index };

        let rendered = pattern.format(file_index, now);
        let name = rendered
            .strip_suffix(GZIP_EXTENSION)
            .unwrap_or(&rendered)
            .to_string();

        self.current_file_name = Some(name.clone());
        Ok(name)
    }

    /// Purges the oldest finished files, finalizes the active file by
    /// appending the `.gz` extension, and reseeds the index counter from
    /// what is actually on disk.
    ///
    /// The directory is re-scanned before every delete so externally removed
    /// or added files never confuse the purge. A failed delete stops purging
    /// without aborting the rollover; a failed rename is logged and the
    /// rollover proceeds — the next active file simply starts a new index.
    pub fn rollover(
        &mut self,
        directory: &Path,
        pattern: &FilePattern,
        active_path: &Path,
        now: &DateTime<Local>,
    ) -> Result<()> {
        loop {
            let candidates = scan_candidates(directory, pattern, now)?;
            debug!(
                count = candidates.len(),
                max_files = self.max_files,
                "direct-write purge pass"
            );
            if (candidates.len() as u32) <= self.max_files {
                break;
            }

            let oldest = &candidates[0];
            if let Err(err) = fs::remove_file(&oldest.path) {
                error!(path = %oldest.path.display(), error = %err, "unable to delete");
                break;
            }
            debug!(path = %oldest.path.display(), "deleted oldest file");
        }

        let finalized = {
            let mut name = active_path.as_os_str().to_os_string();
            name.push(GZIP_EXTENSION);
            std::path::PathBuf::from(name)
        };
        if let Err(err) = fs::rename(active_path, &finalized) {
            warn!(
                from = %active_path.display(),
                to = %finalized.display(),
                error = %err,
                "unable to finalize rotated file"
            );
        }

        // Reseed from disk now that the finished file carries its final
        // name, so consecutive rollovers within one bucket cannot hand out
        // an index that is already taken.
        let survivors = scan_candidates(directory, pattern, now)?;
        let highest = survivors.last().map(|c| c.index).unwrap_or(1);
        self.next_index = Some(highest + 1);
        self.current_file_name = None;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PATTERN: &str = "app-%d{%Y-%m-%d}-%i.log.gz";

    fn finished_file(dir: &Path, pattern: &FilePattern, index: u32, now: &DateTime<Local>) {
        fs::write(dir.join(pattern.format(index, now)), b"x").unwrap();
    }

    #[test]
    fn current_file_name_drops_gz_extension() {
        let dir = TempDir::new().unwrap();
        let pattern = FilePattern::parse(PATTERN).unwrap();
        let now = Local::now();

        let mut retention = DirectWriteRetention::new(5);
        let name = retention
            .current_file_name(dir.path(), &pattern, &now)
            .unwrap();
        assert_eq!(name, format!("app-{}-1.log", now.format("%Y-%m-%d")));
    }

    #[test]
    fn purge_keeps_bounded_set() {
        let dir = TempDir::new().unwrap();
        let pattern = FilePattern::parse(PATTERN).unwrap();
        let now = Local::now();
        for index in 1..=5 {
            finished_file(dir.path(), &pattern, index, &now);
        }

        let mut retention = DirectWriteRetention::new(3);
        let active = dir.path().join(
            retention
                .current_file_name(dir.path(), &pattern, &now)
                .unwrap(),
        );
        fs::write(&active, b"active").unwrap();

        retention
            .rollover(dir.path(), &pattern, &active, &now)
            .unwrap();

        // Oldest files purged down to the cap, active finalized with .gz
        let survivors = scan_candidates(dir.path(), &pattern, &now).unwrap();
        assert_eq!(survivors.len(), 3);
        assert!(!dir.path().join(pattern.format(1, &now)).exists());
        assert!(!dir.path().join(pattern.format(2, &now)).exists());
        assert!(!active.exists());
    }

    #[test]
    fn consecutive_rollovers_never_reuse_an_index() {
        let dir = TempDir::new().unwrap();
        let pattern = FilePattern::parse(PATTERN).unwrap();
        let now = Local::now();
        let mut retention = DirectWriteRetention::new(5);

        let mut finalized_names = Vec::new();
        for payload in [b"first".as_slice(), b"second", b"third"] {
            let active = dir.path().join(
                retention
                    .current_file_name(dir.path(), &pattern, &now)
                    .unwrap(),
            );
            fs::write(&active, payload).unwrap();
            retention
                .rollover(dir.path(), &pattern, &active, &now)
                .unwrap();
            finalized_names.push(active);
        }

        let survivors = scan_candidates(dir.path(), &pattern, &now).unwrap();
        assert_eq!(survivors.len(), 3);
        let indices: Vec<u32> = survivors.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(
            fs::read(dir.path().join(pattern.format(3, &now))).unwrap(),
            b"third"
        );
    }

    #[test]
    fn max_files_below_two_falls_back_to_default() {
        let retention = DirectWriteRetention::new(1);
        assert_eq!(retention.max_files(), 7);
    }
}
