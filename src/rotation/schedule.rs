use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::core::ScheduleError;

/// Recurrence rule plus retention window; one schedule drives both
/// rotation and the retention sweep.
#[derive(Debug, Clone)]
pub struct RotationSchedule {
    expr: String,
    schedule: Schedule,
    retention: Duration,
}

impl RotationSchedule {
    /// Parses a six-field cron expression (`sec min hour dom mon dow`).
    pub fn parse(expr: &str, retention: Duration) -> Result<Self, ScheduleError> {
        let found = expr.split_whitespace().count();
        if found != 6 {
            return Err(ScheduleError::FieldCount {
                expr: expr.to_string(),
                found,
            });
        }

        let schedule = Schedule::from_str(expr).map_err(|e| ScheduleError::Parse {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;

        if schedule.upcoming(Utc).next().is_none() {
            return Err(ScheduleError::NeverFires {
                expr: expr.to_string(),
            });
        }

        Ok(Self {
            expr: expr.to_string(),
            schedule,
            retention,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// First firing strictly after `ts`.
    pub fn next_after(&self, ts: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(ts).next()
    }

    /// Firings in `(start, end]`.
    pub fn firings_between(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Vec<DateTime<Utc>> {
        self.schedule
            .after(start)
            .take_while(|t| t <= end)
            .collect()
    }
}
