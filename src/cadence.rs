// src/cadence.rs
//! Inter-poll delay policies.
//!
//! The adaptive policy follows a fixed-offset local clock:
//! - quiet `[23:02, 10:00)`: sleep straight through to 10:00
//! - peak `[15:00, 23:02)`: 30s around the top of the hour (`:58`–`:01`), else 60s
//! - normal `[10:00, 15:00)`: 300s

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, TimeZone, Timelike, Utc};
use std::time::Duration;

pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

const PEAK_FAST_SECS: u64 = 30;
const PEAK_SECS: u64 = 60;
const NORMAL_SECS: u64 = 300;
const WAKE_HOUR: u32 = 10;

pub trait Cadence: Send + Sync {
    fn next_delay(&self, now: DateTime<Utc>) -> Duration;
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedCadence {
    interval: Duration,
}

impl FixedCadence {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs.max(1)))
    }
}

impl Default for FixedCadence {
    fn default() -> Self {
        Self::from_secs(DEFAULT_INTERVAL_SECS)
    }
}

impl Cadence for FixedCadence {
    fn next_delay(&self, _now: DateTime<Utc>) -> Duration {
        self.interval
    }

    fn describe(&self) -> String {
        format!("fixed {}s", self.interval.as_secs())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveCadence {
    offset: FixedOffset,
}

impl AdaptiveCadence {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// `None` when the offset is out of range (beyond ±24h).
    pub fn from_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for AdaptiveCadence {
    fn default() -> Self {
        Self::from_offset_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or(Self::new(Utc.fix()))
    }
}

impl Cadence for AdaptiveCadence {
    fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        let local = now.with_timezone(&self.offset);
        let delay = adaptive_delay(local);
        if let Some(wake) = quiet_until(local) {
            tracing::info!(wake_at = %wake.format("%Y-%m-%d %H:%M:%S %:z"), "quiet hours, pausing");
        }
        delay
    }

    fn describe(&self) -> String {
        format!("adaptive (UTC{})", self.offset)
    }
}

fn in_quiet_window(hour: u32, minute: u32) -> bool {
    (hour == 23 && minute >= 2) || hour < WAKE_HOUR
}

/// Local wake-up time if `local` falls in the quiet window.
pub fn quiet_until<Tz: TimeZone>(local: DateTime<Tz>) -> Option<DateTime<Tz>> {
    if !in_quiet_window(local.hour(), local.minute()) {
        return None;
    }
    let mut day = local.date_naive();
    if local.hour() >= 23 {
        day = day.succ_opt()?;
    }
    let wake = day.and_time(NaiveTime::from_hms_opt(WAKE_HOUR, 0, 0)?);
    local.timezone().from_local_datetime(&wake).single()
}

/// Delay for the adaptive policy given a local wall-clock time.
pub fn adaptive_delay<Tz: TimeZone>(local: DateTime<Tz>) -> Duration {
    let (hour, minute) = (local.hour(), local.minute());

    if in_quiet_window(hour, minute) {
        return quiet_until(local.clone())
            .and_then(|wake| (wake - local).to_std().ok())
            .unwrap_or(Duration::from_secs(NORMAL_SECS));
    }

    // 23:00 and 23:01 still belong to the peak window.
    if hour >= 15 {
        if minute >= 58 || minute <= 1 {
            return Duration::from_secs(PEAK_FAST_SECS);
        }
        return Duration::from_secs(PEAK_SECS);
    }

    Duration::from_secs(NORMAL_SECS)
}
