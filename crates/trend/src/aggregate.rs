//! Folder x month rollups

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::SizedMessage;

/// Month bucket for messages without a usable timestamp
pub const UNKNOWN_MONTH: &str = "Unknown";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Rollup key, ordered by folder path then month
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthlyKey {
    pub folder_path: String,
    /// `YYYY-MM` or [`UNKNOWN_MONTH`]
    pub month: String,
}

impl MonthlyKey {
    pub fn new(folder_path: impl Into<String>, month: impl Into<String>) -> Self {
        Self {
            folder_path: folder_path.into(),
            month: month.into(),
        }
    }
}

/// Additive totals for one folder and month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyAggregate {
    pub message_count: u64,
    pub body_size: u64,
    pub attachment_size: u64,
    pub total_size: u64,
}

impl MonthlyAggregate {
    pub fn add(&mut self, message: &SizedMessage) {
        self.message_count = self.message_count.saturating_add(1);
        self.body_size = self.body_size.saturating_add(message.body_size);
        self.attachment_size = self.attachment_size.saturating_add(message.attachment_size);
        self.total_size = self.total_size.saturating_add(message.total_size);
    }
}

/// Rollups iterated in `(folder_path, month)` order
pub type MonthlySummary = BTreeMap<MonthlyKey, MonthlyAggregate>;

/// Wall-clock time of a `receivedDateTime` value
///
/// Accepts RFC 3339, `T` or space separated timestamps with optional
/// fractional seconds and a trailing `Z`, and bare dates.
pub fn parse_received(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Month bucket of a `receivedDateTime` value
pub fn month_key(received: Option<&str>) -> String {
    let Some(raw) = received.map(str::trim).filter(|s| !s.is_empty()) else {
        return UNKNOWN_MONTH.to_string();
    };

    if let Some(parsed) = parse_received(raw) {
        return format!("{:04}-{:02}", parsed.year(), parsed.month());
    }

    // Partially readable, e.g. "2024-01-??"
    match raw.get(..7) {
        Some(prefix) if NaiveDate::parse_from_str(&format!("{}-01", prefix), "%Y-%m-%d").is_ok() => {
            prefix.to_string()
        }
        _ => UNKNOWN_MONTH.to_string(),
    }
}

/// Reduce per-folder messages into monthly rollups
pub fn summarize(data: &BTreeMap<String, Vec<SizedMessage>>) -> MonthlySummary {
    let mut summary = MonthlySummary::new();

    for (folder_path, messages) in data {
        for message in messages {
            let key = MonthlyKey::new(
                folder_path.as_str(),
                month_key(message.received_date_time.as_deref()),
            );
            summary.entry(key).or_default().add(message);
        }
    }

    summary
}
