use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, SystemTime};

/// RFC 3339, second resolution, UTC (`2026-10-17T12:00:00Z`).
pub fn rfc3339_secs(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Age of `mtime` relative to `now`; zero for timestamps in the future.
pub fn age_at(now: SystemTime, mtime: SystemTime) -> Duration {
    now.duration_since(mtime).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_utc_seconds() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 5).unwrap();
        assert_eq!(rfc3339_secs(&ts), "2026-10-17T12:00:05Z");
    }

    #[test]
    fn future_mtime_has_zero_age() {
        let now = SystemTime::now();
        let future = now + Duration::from_secs(30);

        assert_eq!(age_at(now, future), Duration::ZERO);
        assert_eq!(
            age_at(now, now - Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }
}
