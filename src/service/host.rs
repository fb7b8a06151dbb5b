// src/service/host.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use chrono::Utc;

use crate::capture::open_source;
use crate::config::Config;
use crate::core::{
    ComponentLogger, LogContext, MutexExt, Shutdown, ShutdownReason,
};
use crate::retention::RetentionSweeper;
use crate::rotation::{RotationTrigger, Rotator, RotatorSettings};

const PATH_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Wires the source, the rotator and the trigger together and owns their
/// lifetime.
pub struct ServiceHost {
    config: Config,
    shutdown: Shutdown,
    ctx: LogContext,
}

impl ServiceHost {
    pub fn new(config: Config, shutdown: Shutdown, ctx: LogContext) -> Self {
        Self {
            config,
            shutdown,
            ctx,
        }
    }

    /// Startup; every error here is fatal for the process.
    pub fn start(self) -> anyhow::Result<RunningService> {
        let cfg = &self.config;
        let name = cfg.service_name.as_str();

        let schedule = cfg
            .rotation_schedule()
            .context("registering rotation schedule")?;

        fs::create_dir_all(&cfg.output.dir)
            .with_context(|| format!("creating output dir {}", cfg.output.dir.display()))?;

        let source = open_source(&cfg.source.path)?;
        self.info(&format!(
            "source {} opened ({:?} end-of-data, {} byte chunks)",
            cfg.source.path.display(),
            cfg.source.end_of_data,
            cfg.source.chunk_size
        ));

        let sweeper = RetentionSweeper::new(
            cfg.output.dir.clone(),
            schedule.retention(),
            self.ctx.child("Retention", name),
        );
        let settings = RotatorSettings {
            output_dir: cfg.output.dir.clone(),
            capture: cfg.capture_settings(),
            stop_warn_after: cfg.stop_warn_after(),
        };
        let rotator = Rotator::start(
            source,
            Utc::now(),
            settings,
            sweeper,
            self.shutdown.clone(),
            self.ctx.child("Rotation", name),
        )
        .context("starting first capture session")?;
        let rotator = Arc::new(Mutex::new(rotator));

        let trigger = RotationTrigger::spawn(
            schedule.clone(),
            rotator.clone(),
            self.shutdown.clone(),
            self.ctx.child("Trigger", schedule.expr()),
        )?;

        self.info(&format!(
            "running: output {}, schedule '{}', retention {:?}",
            cfg.output.dir.display(),
            schedule.expr(),
            schedule.retention()
        ));

        Ok(RunningService {
            grace: cfg.shutdown_grace(),
            ctx: self.ctx,
            rotator,
            trigger: Some(trigger),
            shutdown: self.shutdown,
        })
    }
}

impl ComponentLogger for ServiceHost {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}

pub struct RunningService {
    ctx: LogContext,
    rotator: Arc<Mutex<Rotator>>,
    trigger: Option<RotationTrigger>,
    shutdown: Shutdown,
    grace: Duration,
}

impl RunningService {
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// File the current worker writes to; `None` while a handoff holds the
    /// rotator or after capture halted.
    pub fn current_path(&self) -> Option<PathBuf> {
        let rotator = self
            .rotator
            .lock_within("service.current_path", PATH_LOOKUP_TIMEOUT)?;
        rotator.current_path().map(Path::to_path_buf)
    }

    pub fn rotations(&self) -> u64 {
        self.rotator
            .lock_within("service.rotations", PATH_LOOKUP_TIMEOUT)
            .map_or(0, |r| r.rotations())
    }

    /// Blocks until a signal or a fatal capture error, then shuts down.
    pub fn wait(self) -> anyhow::Result<ShutdownReason> {
        let reason = self.shutdown.wait();
        self.teardown(reason)
    }

    pub fn stop(self) -> anyhow::Result<ShutdownReason> {
        self.shutdown.request(ShutdownReason::Signal);
        self.wait()
    }

    fn teardown(mut self, reason: ShutdownReason) -> anyhow::Result<ShutdownReason> {
        self.info(&format!("shutting down ({:?})", reason));
        let deadline = Instant::now() + self.grace;

        // The trigger sees the shutdown within one poll, even mid-handoff.
        if let Some(trigger) = self.trigger.take() {
            trigger.join();
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.rotator.lock_within("service.teardown", remaining) {
            Some(mut rotator) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if let Some(summary) = rotator.finish(remaining.max(Duration::from_millis(1))) {
                    self.info(&format!(
                        "last session {}: {} bytes",
                        summary.path.display(),
                        summary.bytes_written
                    ));
                }
            }
            None => self.warn("rotator busy at shutdown, leaving capture to process teardown"),
        }

        match reason {
            ShutdownReason::Signal => {
                self.info("shutdown complete");
                Ok(reason)
            }
            ShutdownReason::Fatal(message) => Err(anyhow!("capture failed: {}", message)),
        }
    }
}

impl ComponentLogger for RunningService {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}
