use std::fs::{self, File};
use std::time::{Duration, SystemTime};

use tracecap::core::LogContext;
use tracecap::retention::RetentionSweeper;

#[test]
fn only_files_older_than_the_threshold_are_deleted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let now = SystemTime::now();

    let kept = dir.path().join("2026-10-17T11:43:20Z.txt");
    File::create(&kept)?.set_modified(now - Duration::from_secs(1000))?;
    let removed = dir.path().join("2026-10-17T11:38:20Z.txt");
    File::create(&removed)?.set_modified(now - Duration::from_secs(1300))?;

    let sweeper = RetentionSweeper::new(
        dir.path().to_path_buf(),
        Duration::from_secs(1200),
        LogContext::new("Retention", "test"),
    );
    let report = sweeper.sweep(now, None);

    assert!(kept.exists());
    assert!(!removed.exists());
    assert_eq!(report.removed, vec![removed]);
    assert!(report.failed.is_empty());
    Ok(())
}

#[test]
fn directories_and_symlinks_are_left_alone() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let target = tempfile::tempdir()?;
    let later = SystemTime::now() + Duration::from_secs(86_400);

    let subdir = dir.path().join("archive");
    fs::create_dir(&subdir)?;
    let old_target = target.path().join("elsewhere.txt");
    File::create(&old_target)?;
    let link = dir.path().join("link.txt");
    #[cfg(unix)]
    std::os::unix::fs::symlink(&old_target, &link)?;

    let sweeper = RetentionSweeper::new(
        dir.path().to_path_buf(),
        Duration::from_secs(60),
        LogContext::new("Retention", "test"),
    );
    let report = sweeper.sweep(later, None);

    assert!(subdir.is_dir());
    assert!(old_target.exists());
    #[cfg(unix)]
    assert!(fs::symlink_metadata(&link).is_ok());
    assert!(report.removed.is_empty());
    Ok(())
}

#[test]
fn every_expired_file_is_swept() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let later = SystemTime::now() + Duration::from_secs(86_400);
    for name in ["a.txt", "b.txt", "c.txt"] {
        File::create(dir.path().join(name))?;
    }

    let sweeper = RetentionSweeper::new(
        dir.path().to_path_buf(),
        Duration::from_secs(60),
        LogContext::new("Retention", "test"),
    );
    let report = sweeper.sweep(later, None);

    assert_eq!(report.removed.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}
