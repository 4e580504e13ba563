//! The per-subject fetch → annotate → upload loop.
//!
//! Subjects are processed one at a time, in configured order. A subject that
//! cannot be fetched, or that has no data, is logged and skipped. A failed
//! store commit ends the whole run: subjects already uploaded stay written and
//! the remaining ones are not attempted.

use tracing::{info, instrument, warn};

use crate::annotate::annotate;
use crate::config::DateWindow;
use crate::error::StoreError;
use crate::store::{BatchLimit, DocumentStore, upload};
use crate::summary::SubjectSnapshot;
use crate::wikimedia::HistorySource;

/// What happened to one subject during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectOutcome {
    Uploaded { days: usize, commits: usize },
    NoData,
    FetchFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectReport {
    pub subject: String,
    pub outcome: SubjectOutcome,
    /// Present only for uploaded subjects.
    pub snapshot: Option<SubjectSnapshot>,
}

/// Per-subject reports in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub subjects: Vec<SubjectReport>,
}

impl RunSummary {
    pub fn fetch_failures(&self) -> usize {
        self.count(|o| matches!(o, SubjectOutcome::FetchFailed { .. }))
    }

    pub fn without_data(&self) -> usize {
        self.count(|o| matches!(o, SubjectOutcome::NoData))
    }

    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, SubjectOutcome::Uploaded { .. }))
    }

    /// Total documents written across all subjects.
    pub fn documents_written(&self) -> usize {
        self.subjects
            .iter()
            .map(|r| match r.outcome {
                SubjectOutcome::Uploaded { days, .. } => days,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&SubjectOutcome) -> bool) -> usize {
        self.subjects.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Wires a history source to a document store for one date window.
#[derive(Debug)]
pub struct Pipeline<'a, F, S> {
    source: &'a F,
    store: &'a S,
    window: DateWindow,
    batch_limit: BatchLimit,
}

impl<'a, F, S> Pipeline<'a, F, S>
where
    F: HistorySource,
    S: DocumentStore,
{
    pub fn new(source: &'a F, store: &'a S, window: DateWindow, batch_limit: BatchLimit) -> Self {
        Self {
            source,
            store,
            window,
            batch_limit,
        }
    }

    /// Process every subject in order.
    ///
    /// # Errors
    ///
    /// Returns the first store error; no later subject is fetched.
    pub async fn run(&self, subjects: &[String]) -> Result<RunSummary, StoreError> {
        let mut summary = RunSummary::default();
        for subject in subjects {
            summary.subjects.push(self.run_subject(subject).await?);
        }
        Ok(summary)
    }

    #[instrument(level = "info", skip(self))]
    async fn run_subject(&self, subject: &str) -> Result<SubjectReport, StoreError> {
        info!("Fetching history");

        let history = match self.source.fetch_history(subject, &self.window).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Could not fetch history; skipping subject");
                return Ok(SubjectReport {
                    subject: subject.to_string(),
                    outcome: SubjectOutcome::FetchFailed {
                        reason: e.to_string(),
                    },
                    snapshot: None,
                });
            }
        };

        if history.is_empty() {
            warn!("No data found");
            return Ok(SubjectReport {
                subject: subject.to_string(),
                outcome: SubjectOutcome::NoData,
                snapshot: None,
            });
        }

        info!(
            days = history.len(),
            "Calculating percent changes and uploading"
        );
        let annotated = annotate(&history);
        let report = upload(self.store, &annotated, self.batch_limit).await?;

        Ok(SubjectReport {
            subject: subject.to_string(),
            outcome: SubjectOutcome::Uploaded {
                days: report.documents,
                commits: report.commits,
            },
            snapshot: SubjectSnapshot::from_records(subject, &annotated),
        })
    }
}
