use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::Path;

use crate::core::{CaptureError, CaptureResult};

/// An open stream source. Owned by exactly one capture session at a time and
/// handed to the next session on rotation.
pub type SourceHandle = Box<dyn Read + Send>;

/// Opens `path` for reading. On unix the descriptor is non-blocking, so a
/// quiet pipe yields `WouldBlock` and the worker keeps seeing its stop token.
pub fn open_source(path: &Path) -> CaptureResult<SourceHandle> {
    let mut options = OpenOptions::new();
    options.read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NONBLOCK);
    }

    let file = options.open(path).map_err(|source| CaptureError::SourceOpen {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// Interrupted system call, retry right away.
    Retry,
    /// Nothing buffered on a non-blocking source; same as an idle end of data.
    Idle,
    /// Log, back off, keep reading.
    Transient,
    /// The source is gone; nothing left to capture.
    Permanent,
}

pub fn classify_read_error(err: &io::Error) -> ReadFailure {
    match err.kind() {
        io::ErrorKind::Interrupted => ReadFailure::Retry,
        io::ErrorKind::WouldBlock => ReadFailure::Idle,
        io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::Unsupported => ReadFailure::Permanent,
        _ => ReadFailure::Transient,
    }
}
