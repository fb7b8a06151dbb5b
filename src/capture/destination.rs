use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::core::{CaptureError, CaptureResult, rfc3339_secs};

pub const DESTINATION_EXTENSION: &str = "txt";

/// `<dir>/<RFC3339 timestamp>.txt`
pub fn destination_path(dir: &Path, ts: &DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}.{}", rfc3339_secs(ts), DESTINATION_EXTENSION))
}

/// Creates (or appends to) the destination file for `ts`, write-only.
pub fn open_destination(dir: &Path, ts: &DateTime<Utc>) -> CaptureResult<(PathBuf, File)> {
    let path = destination_path(dir, ts);

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let file = options
        .open(&path)
        .map_err(|source| CaptureError::DestinationOpen {
            path: path.clone(),
            source,
        })?;
    Ok((path, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn name_is_a_function_of_the_timestamp() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 17, 12, 10, 0).unwrap();
        let path = destination_path(Path::new("/var/log/tracecap"), &ts);

        assert_eq!(
            path,
            PathBuf::from("/var/log/tracecap/2026-10-17T12:10:00Z.txt")
        );
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();

        let (path, mut first) = open_destination(dir.path(), &ts).unwrap();
        first.write_all(b"one").unwrap();
        drop(first);

        let (again, mut second) = open_destination(dir.path(), &ts).unwrap();
        second.write_all(b"two").unwrap();

        assert_eq!(path, again);
        assert_eq!(std::fs::read(&path).unwrap(), b"onetwo");
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc::now();

        let err = open_destination(&dir.path().join("nope"), &ts).unwrap_err();
        assert!(matches!(err, CaptureError::DestinationOpen { .. }));
    }
}
