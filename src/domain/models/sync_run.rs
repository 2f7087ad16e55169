use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RecordKind;
use crate::domain::format_duration;

/// How the run decides between an incremental and a full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementalPolicy {
    /// Incremental once a successful sync has been logged.
    #[default]
    Auto,
    Always,
    Never,
}

impl IncrementalPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(IncrementalPolicy::Auto),
            "true" | "incremental" | "always" => Some(IncrementalPolicy::Always),
            "false" | "full" | "never" => Some(IncrementalPolicy::Never),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncrementalPolicy::Auto => "auto",
            IncrementalPolicy::Always => "true",
            IncrementalPolicy::Never => "false",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

impl SyncMode {
    pub fn is_incremental(&self) -> bool {
        matches!(self, SyncMode::Incremental)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "FULL",
            SyncMode::Incremental => "INCREMENTAL",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checkpoint used when no successful sync has ever been logged.
pub fn initial_checkpoint() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Instant an incremental run reads changes from: the later of the last
/// successful sync and the start of the lookback window.
pub fn incremental_since(
    last_success: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: chrono::Duration,
) -> DateTime<Utc> {
    let last = last_success.unwrap_or_else(initial_checkpoint);
    let window_start = now
        .checked_sub_signed(lookback)
        .unwrap_or_else(initial_checkpoint);
    last.max(window_start)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Error => "ERROR",
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("SUCCESS") {
            SyncStatus::Success
        } else {
            SyncStatus::Error
        }
    }
}

/// Insert/update accounting for one kind of record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
    pub failed: u64,
}

/// One row of the sync audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub table_name: String,
    pub records_processed: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub execution_time_seconds: f64,
    pub metadata: Value,
    pub sync_timestamp: DateTime<Utc>,
}

impl SyncLogEntry {
    pub fn success(
        table_name: impl Into<String>,
        processed: u64,
        counts: UpsertCounts,
        started_at: DateTime<Utc>,
        metadata: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            table_name: table_name.into(),
            records_processed: processed,
            records_inserted: counts.inserted,
            records_updated: counts.updated,
            status: SyncStatus::Success,
            error_message: None,
            execution_time_seconds: elapsed_seconds(started_at, now),
            metadata,
            sync_timestamp: now,
        }
    }

    pub fn failure(
        table_name: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        metadata: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            table_name: table_name.into(),
            records_processed: 0,
            records_inserted: 0,
            records_updated: 0,
            status: SyncStatus::Error,
            error_message: Some(error.into()),
            execution_time_seconds: elapsed_seconds(started_at, now),
            metadata,
            sync_timestamp: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    pub kind: RecordKind,
    pub processed: u64,
    pub counts: UpsertCounts,
}

impl KindSummary {
    pub fn new(kind: RecordKind, processed: u64, counts: UpsertCounts) -> Self {
        Self {
            kind,
            processed,
            counts,
        }
    }
}

impl std::fmt::Display for KindSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} processed ({} new, {} updated",
            capitalize(self.kind.plural()),
            self.processed,
            self.counts.inserted,
            self.counts.updated
        )?;
        if self.counts.failed > 0 {
            write!(f, ", {} failed", self.counts.failed)?;
        }
        write!(f, ")")
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub mode: SyncMode,
    pub sessions: KindSummary,
    pub speakers: KindSummary,
    pub elapsed: Duration,
}

impl SyncSummary {
    pub fn total_failed(&self) -> u64 {
        self.sessions.counts.failed + self.speakers.counts.failed
    }

    pub fn elapsed_human(&self) -> String {
        format_duration(self.elapsed.as_secs_f64())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!(IncrementalPolicy::parse("AUTO"), Some(IncrementalPolicy::Auto));
        assert_eq!(IncrementalPolicy::parse("true"), Some(IncrementalPolicy::Always));
        assert_eq!(IncrementalPolicy::parse("full"), Some(IncrementalPolicy::Never));
        assert_eq!(IncrementalPolicy::parse("sometimes"), None);
    }

    #[test]
    fn test_incremental_since_takes_latest() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let lookback = chrono::Duration::hours(24);
        let window_start = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();

        let recent = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
        assert_eq!(incremental_since(Some(recent), now, lookback), recent);

        let stale = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(incremental_since(Some(stale), now, lookback), window_start);

        assert_eq!(incremental_since(None, now, lookback), window_start);
    }

    #[test]
    fn test_incremental_since_survives_huge_lookback() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let lookback = chrono::Duration::try_hours(10_000_000_000).unwrap();

        assert_eq!(incremental_since(None, now, lookback), initial_checkpoint());

        let last = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(incremental_since(Some(last), now, lookback), last);
    }

    #[test]
    fn test_kind_summary_display() {
        let summary = KindSummary::new(
            RecordKind::Session,
            12,
            UpsertCounts {
                inserted: 10,
                updated: 2,
                failed: 0,
            },
        );
        assert_eq!(
            summary.to_string(),
            "Sessions: 12 processed (10 new, 2 updated)"
        );
    }

    #[test]
    fn test_status_from_text() {
        assert_eq!(SyncStatus::from_str("SUCCESS"), SyncStatus::Success);
        assert_eq!(SyncStatus::from_str("ERROR"), SyncStatus::Error);
    }
}
