//! Day-over-day percent change annotation.

use crate::models::{AnnotatedRecord, DailyRecord};

/// Annotate each day with its percent change versus the previous day.
///
/// The input is expected in chronological order but is sorted by timestamp
/// first regardless. The first day, and any day following a day with zero
/// views, has no percent change.
///
/// Output has the same length as the input, in chronological order.
pub fn annotate(history: &[DailyRecord]) -> Vec<AnnotatedRecord> {
    let mut sorted: Vec<&DailyRecord> = history.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut previous_views: Option<u64> = None;
    let mut annotated = Vec::with_capacity(sorted.len());

    for day in sorted {
        let percent_change = match previous_views {
            Some(prev) if prev != 0 => {
                Some((day.views as f64 - prev as f64) / prev as f64 * 100.0)
            }
            _ => None,
        };

        annotated.push(AnnotatedRecord {
            article: day.article.clone(),
            date: date_of(&day.timestamp).to_string(),
            views: day.views,
            percent_change,
        });

        previous_views = Some(day.views);
    }

    annotated
}

/// `"2024010100"` -> `"20240101"`.
fn date_of(timestamp: &str) -> &str {
    timestamp.get(..8).unwrap_or(timestamp)
}
