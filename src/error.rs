//! Error types for each stage of the tracker.
//!
//! Fetch errors are recoverable: the driver logs them and moves on to the
//! next subject. Everything else is fatal and bubbles out of `main`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to retrieve one subject's history from the page-view API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure to commit a batch to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("commit rejected with status {status}: {body}")]
    Commit { status: u16, body: String },

    #[error("could not encode commit request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Failure to load the service-account key or exchange it for a token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not read credential file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("credential file is not a valid service-account key: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("could not sign token assertion: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),

    #[error("token exchange rejected with status {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned an unreadable body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Invalid runtime configuration, detected before any subject is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'{0}' is not a YYYYMMDD date")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    EmptyWindow { start: String, end: String },

    #[error("batch limit {0} is outside 1..={max}", max = crate::store::FIRESTORE_MAX_WRITES)]
    BatchLimit(usize),

    #[error("invalid API base URL: {0}")]
    ApiBase(#[from] url::ParseError),

    #[error("no subjects configured")]
    NoSubjects,

    #[error("a project id is required when FIRESTORE_EMULATOR_HOST is set")]
    MissingProject,
}
