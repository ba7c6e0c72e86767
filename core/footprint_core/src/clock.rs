use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

const TZ_OFFSET_MINUTES_MIN: i32 = -14 * 60;
const TZ_OFFSET_MINUTES_MAX: i32 = 14 * 60;

/// Source of "now" in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start_ms)))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn datetime_from_ms(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok()
}

pub fn ms_to_rfc3339(ms: i64) -> String {
    datetime_from_ms(ms)
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}

pub fn normalize_tz_offset_minutes(v: Option<i32>) -> i32 {
    v.unwrap_or(0)
        .clamp(TZ_OFFSET_MINUTES_MIN, TZ_OFFSET_MINUTES_MAX)
}

pub fn tz_offset_from_minutes(minutes: i32) -> time::UtcOffset {
    time::UtcOffset::from_whole_seconds(minutes.saturating_mul(60))
        .unwrap_or(time::UtcOffset::UTC)
}

/// Start of the local calendar day containing `now_ms`, as epoch milliseconds.
pub fn local_day_start_ms(now_ms: i64, tz_offset: time::UtcOffset) -> i64 {
    let Some(now) = datetime_from_ms(now_ms) else {
        return now_ms - now_ms.rem_euclid(DAY_MS);
    };
    let local = now.to_offset(tz_offset);
    let start = local.date().midnight().assume_offset(tz_offset);
    (start.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Local weekday index (0 = Sunday) of `ms`.
pub fn local_weekday(ms: i64, tz_offset: time::UtcOffset) -> usize {
    datetime_from_ms(ms)
        .map(|t| t.to_offset(tz_offset).weekday().number_days_from_sunday() as usize)
        .unwrap_or(0)
}
