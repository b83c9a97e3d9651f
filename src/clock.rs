//! Reference clock for "today", "current month" and cache timestamps.
//!
//! The engine never calls `Local::now()` directly. Production code uses
//! [`SystemClock`], which reports the process's local calendar; tests and
//! deployments that must pin a business timezone use [`FixedOffsetClock`] or
//! [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone, Utc};

pub trait Clock: Send + Sync {
    /// Current instant, expressed in the clock's timezone.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Calendar date of [`Clock::now`] in the clock's timezone.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn epoch_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The executing process's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Wall-clock time viewed through an explicit UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetClock {
    offset: FixedOffset,
}

impl FixedOffsetClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build from an offset in minutes east of UTC (e.g. `-180` for UTC-3).
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes * 60).map(Self::new)
    }
}

impl Clock for FixedOffsetClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    epoch_ms: AtomicI64,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            epoch_ms: AtomicI64::new(start.timestamp_millis()),
            offset: *start.offset(),
        }
    }

    /// Midday on the given date at UTC.
    pub fn at_date(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc()
            .fixed_offset();
        Self::new(noon)
    }

    pub fn advance_ms(&self, ms: i64) {
        self.epoch_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, at: DateTime<FixedOffset>) {
        self.epoch_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let ms = self.epoch_ms.load(Ordering::SeqCst);
        self.offset
            .timestamp_millis_opt(ms)
            .single()
            .unwrap_or_else(|| Utc::now().with_timezone(&self.offset))
    }
}
