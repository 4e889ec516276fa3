use chrono::{DateTime, Datelike, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// RFC 3339 with millisecond precision, the wire and cache-key form for
/// creation timestamps.
pub fn to_iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_iso(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            AppError::new("TIME/INVALID_TIMESTAMP", "Invalid RFC 3339 timestamp")
                .with_context("value", value.to_string())
                .with_context("detail", err.to_string())
        })
}

/// Inclusive creation-timestamp window scoping dashboard queries.
///
/// Two ranges with different bounds are distinct cache scopes; results are
/// never merged across overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<Self> {
        if from > to {
            return Err(AppError::new(
                "TIME/RANGE_INVERTED",
                "Range start must not be after range end",
            )
            .with_context("from", to_iso(from))
            .with_context("to", to_iso(to)));
        }
        Ok(DateRange { from, to })
    }

    /// Start of day one month before `now` through the end of the current
    /// day, the dashboard default.
    pub fn last_month(now: DateTime<Utc>) -> Self {
        let from_day = month_back(now);
        let from = Utc
            .with_ymd_and_hms(from_day.year(), from_day.month(), from_day.day(), 0, 0, 0)
            .single()
            .unwrap_or(now - Duration::days(30));
        let to = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 23, 59, 59)
            .single()
            .unwrap_or(now);
        DateRange { from, to }
    }

    pub fn bounds_iso(&self) -> (String, String) {
        (to_iso(self.from), to_iso(self.to))
    }

    pub fn contains_iso(&self, created_at: &str) -> bool {
        match parse_iso(created_at) {
            Ok(ts) => ts >= self.from && ts <= self.to,
            Err(_) => false,
        }
    }
}

// Clamp day-of-month when the previous month is shorter.
fn month_back(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    };
    let mut day = now.day();
    loop {
        if let Some(dt) = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single() {
            return dt;
        }
        day -= 1;
        if day == 0 {
            return now - Duration::days(30);
        }
    }
}
