// src/capture/worker.rs

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use serde::{Deserialize, Serialize};

use super::source::{ReadFailure, SourceHandle, classify_read_error};
use crate::core::{
    CaptureError, CaptureResult, ComponentLogger, LogContext, Shutdown, ShutdownReason,
};

/// What a worker does when the source reports no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfDataPolicy {
    /// End-of-data means exhausted: the session ends.
    Finite,
    /// The source may go quiet: back off and read again.
    Live,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub chunk_size: usize,
    pub end_of_data: EndOfDataPolicy,
    pub idle_backoff: Duration,
    pub error_backoff: Duration,
    /// 0 = unlimited
    pub max_consecutive_errors: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            end_of_data: EndOfDataPolicy::Live,
            idle_backoff: Duration::from_millis(50),
            error_backoff: Duration::from_millis(100),
            max_consecutive_errors: 0,
        }
    }
}

/// One open source handle paired with one open destination file.
pub struct CaptureSession {
    pub source: SourceHandle,
    pub destination: File,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Stopped,
    Exhausted,
    SourceFailed(String),
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub chunks_written: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub reason: ExitReason,
    pub started_at: Instant,
    pub stopped_at: Instant,
}

/// Handed back by a worker once it has stopped writing.
pub struct FinishedSession {
    pub session: CaptureSession,
    pub summary: SessionSummary,
}

/// A capture thread draining the source into one destination file.
///
/// Stopping is a handshake: [`request_stop`](Self::request_stop) delivers the
/// stop token, the worker finishes its in-flight chunk, and the finished
/// session (source handle included) comes back as the acknowledgement.
pub struct CaptureWorker {
    ctx: LogContext,
    path: PathBuf,
    stop_tx: Sender<()>,
    done_rx: Receiver<FinishedSession>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    pub fn spawn(
        session: CaptureSession,
        settings: CaptureSettings,
        shutdown: Shutdown,
        ctx: LogContext,
    ) -> CaptureResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<FinishedSession>(1);

        let path = session.path.clone();
        let label = file_label(&path);
        let ctx = ctx.with_instance(&label);
        let thread_ctx = ctx.clone();

        let handle = std::thread::Builder::new()
            .name(format!("capture-{}", label))
            .spawn(move || {
                let finished = run_session(session, &settings, &stop_rx, &shutdown, &thread_ctx);
                // Receiver gone means nobody waits for the acknowledgement.
                let _ = done_tx.send(finished);
            })
            .map_err(CaptureError::Spawn)?;

        Ok(Self {
            ctx,
            path,
            stop_tx,
            done_rx,
            handle: Some(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the capture loop has returned, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Delivers the stop token. Idempotent.
    pub fn request_stop(&self) {
        // Full: already requested. Disconnected: loop already returned.
        let _ = self.stop_tx.try_send(());
    }

    /// Waits up to `timeout` for the stop acknowledgement.
    pub fn await_stopped(&mut self, timeout: Duration) -> CaptureResult<FinishedSession> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(finished) => {
                self.join();
                Ok(finished)
            }
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::StopTimeout {
                path: self.path.clone(),
                waited_ms: timeout.as_millis(),
            }),
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                Err(CaptureError::AcknowledgementLost {
                    path: self.path.clone(),
                })
            }
        }
    }

    /// Requests a stop and blocks until the worker acknowledges it.
    pub fn stop(mut self) -> CaptureResult<FinishedSession> {
        self.request_stop();
        match self.done_rx.recv() {
            Ok(finished) => {
                self.join();
                Ok(finished)
            }
            Err(_) => {
                self.join();
                Err(CaptureError::AcknowledgementLost {
                    path: self.path.clone(),
                })
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.error("capture thread panicked");
            }
        }
    }
}

impl ComponentLogger for CaptureWorker {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Returns true if the stop token arrived (or its sender is gone).
fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    match stop_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

/// Stop-aware sleep. Returns true if stopped while waiting.
fn backoff(stop_rx: &Receiver<()>, duration: Duration) -> bool {
    match stop_rx.recv_timeout(duration) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => false,
    }
}

fn run_session(
    mut session: CaptureSession,
    settings: &CaptureSettings,
    stop_rx: &Receiver<()>,
    shutdown: &Shutdown,
    ctx: &LogContext,
) -> FinishedSession {
    let started_at = Instant::now();
    let mut buf = vec![0u8; settings.chunk_size.max(1)];

    let mut bytes_written = 0u64;
    let mut chunks_written = 0u64;
    let mut read_errors = 0u64;
    let mut write_errors = 0u64;
    let mut consecutive_errors = 0u32;

    ctx.info(&format!("capturing into {}", session.path.display()));

    let reason = loop {
        if stop_requested(stop_rx) {
            break ExitReason::Stopped;
        }

        match session.source.read(&mut buf) {
            Ok(0) => match settings.end_of_data {
                EndOfDataPolicy::Finite => {
                    ctx.info("source exhausted");
                    break ExitReason::Exhausted;
                }
                EndOfDataPolicy::Live => {
                    if backoff(stop_rx, settings.idle_backoff) {
                        break ExitReason::Stopped;
                    }
                }
            },
            Ok(n) => {
                consecutive_errors = 0;
                match session.destination.write_all(&buf[..n]) {
                    Ok(()) => {
                        bytes_written += n as u64;
                        chunks_written += 1;
                        ctx.trace(&format!("chunk {} ({} bytes)", chunks_written, n));
                    }
                    Err(e) => {
                        write_errors += 1;
                        ctx.warn(&format!("write of {} bytes failed: {}", n, e));
                    }
                }
            }
            Err(e) => {
                let mut failure = classify_read_error(&e);
                match failure {
                    ReadFailure::Retry => continue,
                    ReadFailure::Idle => {
                        if backoff(stop_rx, settings.idle_backoff) {
                            break ExitReason::Stopped;
                        }
                        continue;
                    }
                    ReadFailure::Transient | ReadFailure::Permanent => {}
                }

                read_errors += 1;
                consecutive_errors += 1;
                if failure == ReadFailure::Transient
                    && settings.max_consecutive_errors > 0
                    && consecutive_errors >= settings.max_consecutive_errors
                {
                    ctx.error(&format!(
                        "{} consecutive read errors, giving up on source",
                        consecutive_errors
                    ));
                    failure = ReadFailure::Permanent;
                }

                if failure == ReadFailure::Permanent {
                    let message = format!("source unusable: {}", e);
                    ctx.error(&message);
                    shutdown.request(ShutdownReason::Fatal(message.clone()));
                    break ExitReason::SourceFailed(message);
                }

                ctx.warn(&format!("read failed: {}", e));
                if backoff(stop_rx, settings.error_backoff) {
                    break ExitReason::Stopped;
                }
            }
        }
    };

    let stopped_at = Instant::now();
    ctx.info(&format!(
        "session ended ({:?}): {} bytes in {} chunks, {} read errors, {} write errors",
        reason, bytes_written, chunks_written, read_errors, write_errors
    ));

    let summary = SessionSummary {
        path: session.path.clone(),
        bytes_written,
        chunks_written,
        read_errors,
        write_errors,
        reason,
        started_at,
        stopped_at,
    };
    FinishedSession { session, summary }
}
