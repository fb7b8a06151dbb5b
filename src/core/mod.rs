pub mod error;
pub mod lock;
pub mod logging;
pub mod shutdown;
pub mod timestamp;

pub use error::{CaptureError, CaptureResult, ScheduleError, ServiceError};
pub use lock::MutexExt;
pub use logging::{ComponentLogger, LogContext};
pub use shutdown::{Shutdown, ShutdownReason};
pub use timestamp::{age_at, rfc3339_secs};
