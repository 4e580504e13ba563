//! Command-line interface definitions for the page-view tracker.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also be supplied through an environment variable, and all
//! of them have defaults, so a scheduler can invoke the binary bare.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::BoolishValueParser;

use crate::config::{DEFAULT_CONTACT, DEFAULT_START_DATE, DEFAULT_SUBJECTS};
use crate::store::firestore::DEFAULT_COLLECTION;
use crate::store::DEFAULT_BATCH_LIMIT;
use crate::wikimedia::{DEFAULT_API_BASE, DEFAULT_EDITION};

/// Command-line arguments for the page-view tracker.
///
/// # Examples
///
/// ```sh
/// # Run with defaults (service-account key in ./serviceAccountKey.json)
/// pageview_tracker
///
/// # Track two pages since March against the local emulator
/// FIRESTORE_EMULATOR_HOST=localhost:8080 pageview_tracker \
///     --project-id demo-tracker --subjects Barack_Obama,Elon_Musk --start-date 20240301
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Contact address sent in the User-Agent header to the Wikimedia API
    #[arg(long, env = "WIKIMEDIA_CONTACT", default_value = DEFAULT_CONTACT)]
    pub contact: String,

    /// Path to the Firestore service-account key
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS", default_value = "serviceAccountKey.json")]
    pub credentials: PathBuf,

    /// Firestore project id (defaults to the one in the service-account key)
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Host:port of a Firestore emulator; skips the credential file entirely
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// Comma-separated page titles to track
    #[arg(long, env = "TRACKER_SUBJECTS", value_delimiter = ',', default_values = DEFAULT_SUBJECTS)]
    pub subjects: Vec<String>,

    /// First day to fetch, as YYYYMMDD (the last day is always today)
    #[arg(long, env = "TRACKER_START_DATE", default_value = DEFAULT_START_DATE)]
    pub start_date: String,

    /// Maximum writes per Firestore commit (1..=500)
    #[arg(long, env = "TRACKER_BATCH_LIMIT", default_value_t = DEFAULT_BATCH_LIMIT)]
    pub batch_limit: usize,

    /// Firestore collection receiving one document per subject and day
    #[arg(long, env = "TRACKER_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Base URL of the Wikimedia REST API
    #[arg(long, env = "WIKIMEDIA_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Wiki project whose page views are counted
    #[arg(long, env = "WIKIMEDIA_EDITION", default_value = DEFAULT_EDITION)]
    pub edition: String,

    /// Exit with a failure status if any subject could not be fetched
    /// (the env var accepts `1`/`0`, `yes`/`no`, `on`/`off`, `true`/`false`)
    #[arg(long, env = "TRACKER_FAIL_ON_FETCH_ERROR", value_parser = BoolishValueParser::new())]
    pub fail_on_fetch_error: bool,
}
