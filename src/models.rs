//! Data models for page-view history and its stored representation.
//!
//! This module defines the records that flow through the pipeline:
//! - [`DailyRecord`]: one day of views as returned by the page-view API
//! - [`PageviewsResponse`]: the API envelope around those records
//! - [`AnnotatedRecord`]: a daily record enriched with day-over-day change
//! - [`StoredDocument`]: the document written to the `daily_stats` collection
//!
//! Only [`StoredDocument`] outlives the process; everything else is dropped
//! once the subject it belongs to has been uploaded.

use serde::Deserialize;

/// One subject's view count for one day, as returned by the API.
///
/// The API also reports `project`, `granularity`, `access` and `agent` for
/// each item. Those are fixed by the request and are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DailyRecord {
    /// The page title, e.g. `Barack_Obama`.
    pub article: String,
    /// Ten-digit `YYYYMMDDHH` timestamp; the hour is always `00` for daily data.
    pub timestamp: String,
    /// User (non-bot) views across all access methods.
    pub views: u64,
}

/// Response envelope of the per-article page-view endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PageviewsResponse {
    /// Daily items. A response without this key is treated as having none.
    #[serde(default)]
    pub items: Vec<DailyRecord>,
}

/// A [`DailyRecord`] annotated with percent change versus the previous day.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRecord {
    pub article: String,
    /// Eight-digit `YYYYMMDD` date.
    pub date: String,
    pub views: u64,
    /// `None` on the first day and after any day with zero views.
    pub percent_change: Option<f64>,
}

impl AnnotatedRecord {
    /// Deterministic key for this record, e.g. `20240115_Barack_Obama`.
    ///
    /// Re-running the tracker for the same day overwrites the same document.
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.date, self.article)
    }
}

/// The persisted form of an [`AnnotatedRecord`].
///
/// The write timestamp is not part of this struct: the store assigns it at
/// commit time so that repeated runs record when the overwrite happened.
/// The store encodes the other fields itself; `id` becomes the document
/// name rather than a field.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub name: String,
    pub date: String,
    pub views: u64,
    pub percent_change: Option<f64>,
}

impl From<&AnnotatedRecord> for StoredDocument {
    fn from(record: &AnnotatedRecord) -> Self {
        Self {
            id: record.document_id(),
            name: record.article.clone(),
            date: record.date.clone(),
            views: record.views,
            percent_change: record.percent_change,
        }
    }
}
