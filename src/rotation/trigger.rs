// src/rotation/trigger.rs

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};

use super::rotator::{RotationOutcome, Rotator};
use super::schedule::RotationSchedule;
use crate::core::{ComponentLogger, LogContext, MutexExt, Shutdown};

/// Timer thread firing the rotator on every schedule tick until shutdown.
pub struct RotationTrigger {
    ctx: LogContext,
    handle: Option<JoinHandle<u64>>,
}

impl RotationTrigger {
    pub fn spawn(
        schedule: RotationSchedule,
        rotator: Arc<Mutex<Rotator>>,
        shutdown: Shutdown,
        ctx: LogContext,
    ) -> anyhow::Result<Self> {
        let thread_ctx = ctx.clone();
        let handle = std::thread::Builder::new()
            .name("rotation".into())
            .spawn(move || run_trigger(&schedule, &rotator, &shutdown, &thread_ctx))
            .context("spawning rotation trigger")?;

        ctx.info("rotation trigger started");
        Ok(Self {
            ctx,
            handle: Some(handle),
        })
    }

    /// Joins the trigger thread; returns the number of firings it handled.
    pub fn join(mut self) -> u64 {
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.join() {
            Ok(firings) => firings,
            Err(_) => {
                self.error("rotation trigger panicked");
                0
            }
        }
    }
}

impl ComponentLogger for RotationTrigger {
    fn log_context(&self) -> &LogContext {
        &self.ctx
    }
}

fn run_trigger(
    schedule: &RotationSchedule,
    rotator: &Mutex<Rotator>,
    shutdown: &Shutdown,
    ctx: &LogContext,
) -> u64 {
    let mut firings = 0u64;
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // never fire the same tick twice if the wall clock lags the wait
        let base = last_fired.map_or(now, |last| now.max(last));
        let Some(next) = schedule.next_after(&base) else {
            ctx.warn(&format!("schedule '{}' has no further firings", schedule.expr()));
            break;
        };

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        ctx.debug(&format!("next rotation at {} (in {:?})", next, wait));
        if shutdown.wait_timeout(wait).is_some() {
            break;
        }

        firings += 1;
        last_fired = Some(next);
        let outcome = rotator.lock_or_recover("rotation.trigger").rotate(next);
        match outcome {
            RotationOutcome::Rotated { .. } | RotationOutcome::Skipped { .. } => {}
            RotationOutcome::Idle => ctx.warn("firing found no capture worker"),
            RotationOutcome::Interrupted | RotationOutcome::Halted { .. } => break,
        }
    }

    ctx.info(&format!("rotation trigger stopped after {} firings", firings));
    firings
}
