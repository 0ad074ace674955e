//! Wall-clock access and local calendar keys.
//!
//! Every timestamp in the core is epoch milliseconds obtained from a
//! [`Clock`]. Day and week keys are derived in local time so rollovers
//! follow the user's calendar rather than UTC.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Timelike};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now_ms.fetch_add(secs.saturating_mul(1000), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Convert epoch milliseconds to local time. `None` for out-of-range values.
pub fn local_datetime(ms: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(ms).single()
}

fn local_date(ms: i64) -> NaiveDate {
    local_datetime(ms)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

/// Local calendar day key, `YYYY-MM-DD`.
pub fn day_key(ms: i64) -> String {
    local_date(ms).format("%Y-%m-%d").to_string()
}

/// Key of the local day before the one containing `ms`.
pub fn previous_day_key(ms: i64) -> String {
    local_date(ms)
        .checked_sub_days(Days::new(1))
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// Key of the Monday starting the local week that contains `ms`.
pub fn week_start_key(ms: i64) -> String {
    let date = local_date(ms);
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back))
        .unwrap_or(date)
        .format("%Y-%m-%d")
        .to_string()
}

/// Local hour (0-23) and weekday (0 = Sunday .. 6 = Saturday).
pub fn local_hour_and_weekday(ms: i64) -> Option<(usize, usize)> {
    let dt = local_datetime(ms)?;
    Some((
        dt.hour() as usize,
        dt.weekday().num_days_from_sunday() as usize,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance_secs(5);
        clock.advance_ms(250);
        assert_eq!(clock.now_ms(), 6_250);
        clock.set_ms(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-10-18 is a Sunday, so its week began on Monday the 12th.
        assert_eq!(week_start_key(local_ms(2026, 10, 18, 12)), "2026-10-12");
        assert_eq!(week_start_key(local_ms(2026, 10, 12, 12)), "2026-10-12");
        assert_eq!(week_start_key(local_ms(2026, 10, 19, 12)), "2026-10-19");
    }

    #[test]
    fn day_keys_are_local() {
        let ms = local_ms(2026, 3, 1, 12);
        assert_eq!(day_key(ms), "2026-03-01");
        assert_eq!(previous_day_key(ms), "2026-02-28");
    }

    #[test]
    fn hour_and_weekday_are_local() {
        // 2026-10-18 is a Sunday.
        let (hour, weekday) = local_hour_and_weekday(local_ms(2026, 10, 18, 14)).unwrap();
        assert_eq!(hour, 14);
        assert_eq!(weekday, 0);
    }
}
