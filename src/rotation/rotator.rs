// src/rotation/rotator.rs

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};

use crate::capture::{
    CaptureSession, CaptureSettings, CaptureWorker, ExitReason, FinishedSession, SessionSummary,
    SourceHandle, open_destination,
};
use crate::core::{
    CaptureError, CaptureResult, ComponentLogger, LogContext, Shutdown, ShutdownReason,
};
use crate::retention::{RetentionSweeper, SweepReport};

const ACK_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct RotatorSettings {
    pub output_dir: PathBuf,
    pub capture: CaptureSettings,
    /// Interval between warnings while a worker has not acknowledged its stop.
    pub stop_warn_after: Duration,
}

#[derive(Debug)]
pub enum RotationOutcome {
    Rotated {
        path: PathBuf,
        previous: SessionSummary,
        sweep: SweepReport,
    },
    /// New file could not be opened; capture resumed into `path`.
    Skipped {
        path: PathBuf,
        reason: String,
        sweep: SweepReport,
    },
    /// Shutdown arrived while waiting for the stop acknowledgement.
    Interrupted,
    /// No worker could be (re)started; the process is shutting down.
    Halted { reason: String },
    /// Nothing to rotate.
    Idle,
}

enum StopWait {
    Interrupted,
    Lost(String),
}

/// Owns the current capture worker and performs the stop → open → start →
/// sweep handoff.
pub struct Rotator {
    ctx: LogContext,
    settings: RotatorSettings,
    sweeper: RetentionSweeper,
    shutdown: Shutdown,
    current: Option<CaptureWorker>,
    rotations: u64,
    skipped: u64,
}

impl Rotator {
    /// Opens the first destination file for `now` and starts capturing.
    pub fn start(
        source: SourceHandle,
        now: DateTime<Utc>,
        settings: RotatorSettings,
        sweeper: RetentionSweeper,
        shutdown: Shutdown,
        ctx: LogContext,
    ) -> CaptureResult<Self> {
        let (path, destination) = open_destination(&settings.output_dir, &now)?;
        let mut rotator = Self {
            ctx,
            settings,
            sweeper,
            shutdown,
            current: None,
            rotations: 0,
            skipped: 0,
        };
        let worker = rotator.spawn(CaptureSession {
            source,
            destination,
            path,
        })?;
        rotator.current = Some(worker);
        Ok(rotator)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|w| w.path())
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn rotate(&mut self, now: DateTime<Utc>) -> RotationOutcome {
        let Some(mut worker) = self.current.take() else {
            self.warn("rotation requested without a capture worker");
            return RotationOutcome::Idle;
        };

        // 1. stop and wait for the acknowledgement
        let FinishedSession { session, summary } = match self.stop_worker(&mut worker) {
            Ok(finished) => finished,
            Err(StopWait::Interrupted) => {
                self.current = Some(worker);
                return RotationOutcome::Interrupted;
            }
            Err(StopWait::Lost(reason)) => return self.halt(reason),
        };

        if let ExitReason::SourceFailed(reason) = &summary.reason {
            return self.halt(reason.clone());
        }

        // 2. open the next file
        let (path, destination) = match open_destination(&self.settings.output_dir, &now) {
            Ok(opened) => opened,
            Err(err) => {
                self.error(&format!("rotation skipped, retrying next tick: {}", err));
                self.skipped += 1;
                let resumed = summary.path.clone();
                return match self.spawn(session) {
                    Ok(worker) => {
                        self.current = Some(worker);
                        // retention runs on every firing, skipped or not
                        let sweep = self.sweeper.sweep(SystemTime::now(), Some(&resumed));
                        RotationOutcome::Skipped {
                            path: resumed,
                            reason: err.to_string(),
                            sweep,
                        }
                    }
                    Err(spawn_err) => self.halt(spawn_err.to_string()),
                };
            }
        };

        // 3. same source, new file; the previous file closes here
        let CaptureSession {
            source,
            destination: previous,
            ..
        } = session;
        drop(previous);

        match self.spawn(CaptureSession {
            source,
            destination,
            path: path.clone(),
        }) {
            Ok(worker) => self.current = Some(worker),
            Err(err) => return self.halt(err.to_string()),
        }
        self.rotations += 1;
        self.info(&format!(
            "rotated {} ({} bytes) -> {}",
            summary.path.display(),
            summary.bytes_written,
            path.display()
        ));

        // 4. retention, with the live file protected
        let sweep = self.sweeper.sweep(SystemTime::now(), Some(&path));

        RotationOutcome::Rotated {
            path,
            previous: summary,
            sweep,
        }
    }

    /// Stops the current worker, waiting at most `grace` for it.
    pub fn finish(&mut self, grace: Duration) -> Option<SessionSummary> {
        let mut worker = self.current.take()?;
        worker.request_stop();
        match worker.await_stopped(grace) {
            Ok(finished) => Some(finished.summary),
            Err(err) => {
                self.warn(&format!("{}; leaving it to process teardown", err));
                None
            }
        }
    }

    fn spawn(&self, session: CaptureSession) -> CaptureResult<CaptureWorker> {
        CaptureWorker::spawn(
            session,
            self.settings.capture.clone(),
            self.shutdown.clone(),
            self.ctx.child("Capture", "session"),
        )
    }

    fn stop_worker(&self, worker: &mut CaptureWorker) -> Result<FinishedSession, StopWait> {
        worker.request_stop();

        let warn_every = self.settings.stop_warn_after;
        let poll = ACK_POLL.min(warn_every);
        let started = Instant::now();
        let mut next_warning = warn_every;

        loop {
            match worker.await_stopped(poll) {
                Ok(finished) => return Ok(finished),
                Err(CaptureError::StopTimeout { .. }) => {
                    if self.shutdown.is_requested() {
                        return Err(StopWait::Interrupted);
                    }
                    let waited = started.elapsed();
                    if waited >= next_warning {
                        self.warn(&format!(
                            "worker on {} has not acknowledged stop after {:?} (blocked in read?)",
                            worker.path().display(),
                            waited
                        ));
                        next_warning += warn_every;
                    }
                }
                Err(err) => return Err(StopWait::Lost(err.to_string())),
            }
        }
    }

    fn halt(&mut self, reason: String) -> RotationOutcome {
        self.error(&format!("capture halted: {}", reason));
        self.shutdown.request(ShutdownReason::Fatal(reason.clone()));
        RotationOutcome::Halted { reason }
    }
}

impl ComponentLogger for Rotator {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}
