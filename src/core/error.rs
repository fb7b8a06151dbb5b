use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot open source {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot open destination {path}: {source}")]
    DestinationOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot spawn capture worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("capture worker for {path} did not acknowledge stop within {waited_ms}ms")]
    StopTimeout { path: PathBuf, waited_ms: u128 },
    #[error("capture worker for {path} exited without acknowledging stop")]
    AcknowledgementLost { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("cron expression '{expr}' has {found} fields, expected 6 (sec min hour dom mon dow)")]
    FieldCount { expr: String, found: usize },
    #[error("invalid cron expression '{expr}': {message}")]
    Parse { expr: String, message: String },
    #[error("cron expression '{expr}' never fires")]
    NeverFires { expr: String },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service '{name}' is already installed at {path}")]
    AlreadyInstalled { name: String, path: PathBuf },
    #[error("service '{name}' is not installed")]
    NotInstalled { name: String },
    #[error("systemctl {args} failed: {message}")]
    SystemCtl { args: String, message: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ServiceError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let err = CaptureError::DestinationOpen {
            path: PathBuf::from("/var/log/tracecap/x.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/var/log/tracecap/x.txt"));

        let err = ScheduleError::FieldCount {
            expr: "*/5 * * * *".into(),
            found: 5,
        };
        assert!(err.to_string().contains("has 5 fields"));
    }
}
