//! Document store abstraction and the batched uploader.
//!
//! # Submodules
//!
//! - [`firestore`]: Firestore REST implementation of [`DocumentStore`]
//! - [`credentials`]: service-account key loading and access tokens
//!
//! # Batching
//!
//! Firestore rejects commits with more than [`FIRESTORE_MAX_WRITES`] writes.
//! [`upload`] splits records into commits of at most [`BatchLimit`] writes,
//! 400 by default, so N records cost `ceil(N / limit)` commits.
//!
//! A failed commit is returned immediately. Commits that already succeeded
//! stay written; the remaining records are not attempted.

pub mod credentials;
pub mod firestore;

use tracing::{info, instrument};

use crate::error::{ConfigError, StoreError};
use crate::models::{AnnotatedRecord, StoredDocument};

/// Hard per-commit write cap enforced by Firestore.
pub const FIRESTORE_MAX_WRITES: usize = 500;
pub const DEFAULT_BATCH_LIMIT: usize = 400;

/// Maximum writes per commit. Always within `1..=FIRESTORE_MAX_WRITES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimit(usize);

impl BatchLimit {
    pub fn new(limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 || limit > FIRESTORE_MAX_WRITES {
            return Err(ConfigError::BatchLimit(limit));
        }
        Ok(Self(limit))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BatchLimit {
    fn default() -> Self {
        Self(DEFAULT_BATCH_LIMIT)
    }
}

/// A store that can atomically write a group of documents.
pub trait DocumentStore {
    /// Write every document in `batch` as one atomic unit, overwriting any
    /// existing document with the same id and stamping each with the
    /// server's commit time.
    async fn commit(&self, batch: &[StoredDocument]) -> Result<(), StoreError>;
}

/// Outcome of a successful [`upload`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub documents: usize,
    pub commits: usize,
}

/// Write `records` to `store` in commits of at most `limit` documents.
///
/// Each record becomes the document `{date}_{article}`.
#[instrument(level = "info", skip_all, fields(records = records.len(), limit = limit.get()))]
pub async fn upload<S: DocumentStore>(
    store: &S,
    records: &[AnnotatedRecord],
    limit: BatchLimit,
) -> Result<UploadReport, StoreError> {
    let mut report = UploadReport::default();

    for chunk in records.chunks(limit.get()) {
        let batch: Vec<StoredDocument> = chunk.iter().map(StoredDocument::from).collect();
        store.commit(&batch).await?;

        report.commits += 1;
        report.documents += batch.len();
        info!(commit = report.commits, writes = batch.len(), "Committed batch");
    }

    Ok(report)
}
