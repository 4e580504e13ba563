//! End-of-run snapshot per subject.
//!
//! For each uploaded subject the run reports its most recent day (views and
//! percent change) and the average daily views over the trailing week, the
//! same figures the dashboard reading `daily_stats` shows.

use tracing::info;

use crate::models::AnnotatedRecord;
use crate::pipeline::{RunSummary, SubjectOutcome};

/// Number of trailing days in the moving average.
pub const AVERAGE_WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSnapshot {
    pub subject: String,
    pub latest_date: String,
    pub latest_views: u64,
    pub latest_percent_change: Option<f64>,
    /// `None` until at least a full week of data exists.
    pub seven_day_average: Option<f64>,
}

impl SubjectSnapshot {
    /// Build a snapshot from chronologically ordered records.
    ///
    /// Returns `None` for an empty history.
    pub fn from_records(subject: &str, records: &[AnnotatedRecord]) -> Option<Self> {
        let latest = records.last()?;
        Some(Self {
            subject: subject.to_string(),
            latest_date: latest.date.clone(),
            latest_views: latest.views,
            latest_percent_change: latest.percent_change,
            seven_day_average: trailing_average(records, AVERAGE_WINDOW_DAYS),
        })
    }
}

/// Mean views over the last `days` records, if there are that many.
pub fn trailing_average(records: &[AnnotatedRecord], days: usize) -> Option<f64> {
    if days == 0 || records.len() < days {
        return None;
    }
    let window = &records[records.len() - days..];
    let total: u64 = window.iter().map(|r| r.views).sum();
    Some(total as f64 / days as f64)
}

/// `"12.50%"`, or `"n/a"` when there is no previous day to compare with.
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(change) => format!("{change:.2}%"),
        None => "n/a".to_string(),
    }
}

/// Log one line per subject describing how the run went for it.
pub fn log_summary(summary: &RunSummary) {
    for report in &summary.subjects {
        match (&report.outcome, &report.snapshot) {
            (SubjectOutcome::Uploaded { days, commits }, Some(snapshot)) => info!(
                subject = %report.subject,
                days,
                commits,
                latest_date = %snapshot.latest_date,
                latest_views = snapshot.latest_views,
                change = %format_change(snapshot.latest_percent_change),
                seven_day_average = ?snapshot.seven_day_average.map(|avg| avg.round() as u64),
                "Subject summary"
            ),
            (SubjectOutcome::Uploaded { days, commits }, None) => {
                info!(subject = %report.subject, days, commits, "Subject summary")
            }
            (SubjectOutcome::NoData, _) => {
                info!(subject = %report.subject, "Subject summary: no data")
            }
            (SubjectOutcome::FetchFailed { reason }, _) => {
                info!(subject = %report.subject, %reason, "Subject summary: fetch failed")
            }
        }
    }
}
