// src/retention/sweeper.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::core::{ComponentLogger, LogContext, age_at};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub kept: usize,
    /// Directories, symlinks, the protected file and unreadable entries.
    pub skipped: usize,
}

/// Deletes regular files in one directory whose mtime is older than the
/// retention window.
pub struct RetentionSweeper {
    base_dir: PathBuf,
    retention: Duration,
    ctx: LogContext,
}

impl RetentionSweeper {
    pub fn new(base_dir: PathBuf, retention: Duration, ctx: LogContext) -> Self {
        Self {
            base_dir,
            retention,
            ctx,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Sweeps once. `protect` is never deleted, whatever its age.
    pub fn sweep(&self, now: SystemTime, protect: Option<&Path>) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match fs::read_dir(&self.base_dir) {
            Ok(e) => e,
            Err(err) => {
                self.warn(&format!(
                    "cannot list {}: {}",
                    self.base_dir.display(),
                    err
                ));
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.warn(&format!("unreadable entry: {}", err));
                    report.skipped += 1;
                    continue;
                }
            };
            let path = entry.path();

            if protect == Some(path.as_path()) {
                report.skipped += 1;
                continue;
            }

            // symlink_metadata: a link to an old file is not ours to delete
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    self.warn(&format!("cannot stat {}: {}", path.display(), err));
                    report.skipped += 1;
                    continue;
                }
            };
            if !meta.file_type().is_file() {
                report.skipped += 1;
                continue;
            }

            let mtime = match meta.modified() {
                Ok(t) => t,
                Err(err) => {
                    self.warn(&format!("no mtime for {}: {}", path.display(), err));
                    report.skipped += 1;
                    continue;
                }
            };

            if age_at(now, mtime) <= self.retention {
                report.kept += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    self.debug(&format!("removed {}", path.display()));
                    report.removed.push(path);
                }
                Err(err) => {
                    self.error(&format!("failed to remove {}: {}", path.display(), err));
                    report.failed.push(path);
                }
            }
        }

        self.info(&format!(
            "sweep done: {} removed, {} failed, {} kept, {} skipped",
            report.removed.len(),
            report.failed.len(),
            report.kept,
            report.skipped
        ));
        report
    }
}

impl ComponentLogger for RetentionSweeper {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn aged_file(dir: &Path, name: &str, now: SystemTime, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(now - Duration::from_secs(age_secs)).unwrap();
        path
    }

    fn sweeper(dir: &Path, retention_secs: u64) -> RetentionSweeper {
        RetentionSweeper::new(
            dir.to_path_buf(),
            Duration::from_secs(retention_secs),
            LogContext::new("Retention", "test"),
        )
    }

    #[test]
    fn deletes_only_files_past_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let young = aged_file(dir.path(), "young.txt", now, 1000);
        let old = aged_file(dir.path(), "old.txt", now, 1300);

        let report = sweeper(dir.path(), 1200).sweep(now, None);

        assert!(young.exists());
        assert!(!old.exists());
        assert_eq!(report.removed, vec![old]);
        assert_eq!(report.kept, 1);
    }

    #[test]
    fn file_exactly_at_threshold_stays() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let edge = aged_file(dir.path(), "edge.txt", now, 1200);

        sweeper(dir.path(), 1200).sweep(now, None);

        assert!(edge.exists());
    }

    #[test]
    fn never_deletes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("2020-01-01T00:00:00Z.txt");
        fs::create_dir(&sub).unwrap();
        let an_hour_later = SystemTime::now() + Duration::from_secs(3600);

        let report = sweeper(dir.path(), 1).sweep(an_hour_later, None);

        assert!(sub.is_dir());
        assert_eq!(report.skipped, 1);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn protected_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let active = aged_file(dir.path(), "active.txt", now, 5000);

        let report = sweeper(dir.path(), 10).sweep(now, Some(&active));

        assert!(active.exists());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn missing_directory_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let report = sweeper(&dir.path().join("gone"), 10).sweep(SystemTime::now(), None);

        assert_eq!(report, SweepReport::default());
    }
}
