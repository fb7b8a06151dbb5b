// src/lib.rs
pub mod capture;
pub mod config;
pub mod core;
pub mod retention;
pub mod rotation;
pub mod service;
pub mod testing;

// Re-export the most used types
pub use crate::capture::{CaptureSettings, CaptureWorker, EndOfDataPolicy, ExitReason};
pub use crate::config::Config;
pub use crate::core::{ComponentLogger, LogContext, Shutdown, ShutdownReason};
pub use crate::retention::RetentionSweeper;
pub use crate::rotation::{RotationOutcome, RotationSchedule, Rotator, RotatorSettings};
pub use crate::service::{RunningService, ServiceHost};
