// src/capture/mod.rs

pub mod destination;
pub mod source;
pub mod worker;

pub use destination::{destination_path, open_destination};
pub use source::{ReadFailure, SourceHandle, classify_read_error, open_source};
pub use worker::{
    CaptureSession, CaptureSettings, CaptureWorker, EndOfDataPolicy, ExitReason, FinishedSession,
    SessionSummary,
};
