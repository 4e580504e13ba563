//! # Page-View Tracker
//!
//! A scheduled ETL job that pulls daily Wikipedia page views for a fixed set
//! of public figures, annotates each day with its percent change versus the
//! day before, and stores the result in Firestore.
//!
//! ## Usage
//!
//! ```sh
//! WIKIMEDIA_CONTACT=ops@example.org \
//! GOOGLE_APPLICATION_CREDENTIALS=./serviceAccountKey.json \
//!     pageview_tracker
//! ```
//!
//! ## Architecture
//!
//! Each subject goes through the same three stages, one subject at a time:
//! 1. **Fetching**: download the full daily history since the start date
//! 2. **Annotating**: sort by day and compute day-over-day percent change
//! 3. **Uploading**: write one document per day to `daily_stats`, in
//!    commits of at most 400 writes
//!
//! The job always refetches the whole window. Document ids are
//! `{YYYYMMDD}_{subject}`, so a rerun overwrites rather than duplicates.

use std::error::Error;
use std::time::Instant;

use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod annotate;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod store;
mod summary;
#[cfg(test)]
mod test_support;
mod utils;
mod wikimedia;

use cli::Cli;
use config::{StoreTarget, TrackerConfig};
use pipeline::Pipeline;
use store::credentials::ServiceAccountKey;
use store::firestore::FirestoreStore;
use utils::local_today;
use wikimedia::PageviewClient;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("pageview_tracker starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = TrackerConfig::from_cli(&args, local_today())?;
    if config.uses_placeholder_contact() {
        warn!(
            contact = %config.contact,
            "Set WIKIMEDIA_CONTACT to a real email or URL for Wikimedia API politeness"
        );
    }
    info!(
        subjects = ?config.subjects,
        start = %config.window.start_compact(),
        end = %config.window.end_compact(),
        batch_limit = config.batch_limit.get(),
        collection = %config.collection,
        "Configuration loaded"
    );

    // ---- Document store ----
    let store = match &config.store {
        StoreTarget::ServiceAccount {
            key_path,
            project_override,
        } => {
            let key = ServiceAccountKey::from_file(key_path)?;
            FirestoreStore::connect(key, project_override.clone(), &config.collection).await?
        }
        StoreTarget::Emulator { host, project_id } => {
            FirestoreStore::emulator(host, project_id, &config.collection)?
        }
    };

    // ---- Fetch, annotate, upload ----
    let source = PageviewClient::new(&config.api_base, &config.edition, &config.contact)?;
    let pipeline = Pipeline::new(&source, &store, config.window, config.batch_limit);

    let report = match pipeline.run(&config.subjects).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Upload failed; aborting run");
            return Err(e.into());
        }
    };
    summary::log_summary(&report);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        uploaded = report.uploaded(),
        no_data = report.without_data(),
        fetch_failures = report.fetch_failures(),
        documents = report.documents_written(),
        "Done! Check your Firebase console"
    );

    if config.fail_on_fetch_error && report.fetch_failures() > 0 {
        error!(
            fetch_failures = report.fetch_failures(),
            "Exiting with failure because some subjects could not be fetched"
        );
        return Err(format!("{} subject(s) could not be fetched", report.fetch_failures()).into());
    }

    Ok(())
}
