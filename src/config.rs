//! Validated runtime configuration.
//!
//! [`TrackerConfig`] is built once from the parsed [`Cli`] and today's date.
//! Everything that can be wrong with the configuration is rejected here,
//! before the first request goes out.

use std::path::PathBuf;

use chrono::NaiveDate;
use itertools::Itertools;
use url::Url;

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::store::BatchLimit;
use crate::utils::{format_compact_date, parse_compact_date};

/// Placeholder contact shipped as the default. Wikimedia asks for a real one.
pub const DEFAULT_CONTACT: &str = "caglayantalha@gmail.com";
pub const DEFAULT_START_DATE: &str = "20240101";
pub const DEFAULT_SUBJECTS: [&str; 4] = ["Barack_Obama", "Elon_Musk", "Donald_Trump", "Kamala_Harris"];

/// Inclusive range of days to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyWindow`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::EmptyWindow {
                start: format_compact_date(start),
                end: format_compact_date(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Start day as `YYYYMMDD`.
    pub fn start_compact(&self) -> String {
        format_compact_date(self.start)
    }

    /// End day as `YYYYMMDD`.
    pub fn end_compact(&self) -> String {
        format_compact_date(self.end)
    }
}

/// Where documents are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Production Firestore, authenticated with a service-account key.
    ServiceAccount {
        key_path: PathBuf,
        project_override: Option<String>,
    },
    /// A local Firestore emulator.
    Emulator { host: String, project_id: String },
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Page titles in processing order, without duplicates.
    pub subjects: Vec<String>,
    pub window: DateWindow,
    pub batch_limit: BatchLimit,
    pub contact: String,
    pub api_base: Url,
    pub edition: String,
    pub collection: String,
    pub store: StoreTarget,
    pub fail_on_fetch_error: bool,
}

impl TrackerConfig {
    /// Validate the parsed arguments. `today` becomes the end of the window.
    pub fn from_cli(cli: &Cli, today: NaiveDate) -> Result<Self, ConfigError> {
        let subjects: Vec<String> = cli
            .subjects
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unique()
            .map(str::to_string)
            .collect();
        if subjects.is_empty() {
            return Err(ConfigError::NoSubjects);
        }

        let start = parse_compact_date(cli.start_date.trim())?;
        let window = DateWindow::new(start, today)?;
        let batch_limit = BatchLimit::new(cli.batch_limit)?;
        let api_base = Url::parse(&cli.api_base)?;

        let store = match &cli.emulator_host {
            Some(host) if !host.trim().is_empty() => StoreTarget::Emulator {
                host: host.trim().to_string(),
                project_id: cli.project_id.clone().ok_or(ConfigError::MissingProject)?,
            },
            _ => StoreTarget::ServiceAccount {
                key_path: cli.credentials.clone(),
                project_override: cli.project_id.clone(),
            },
        };

        Ok(Self {
            subjects,
            window,
            batch_limit,
            contact: cli.contact.clone(),
            api_base,
            edition: cli.edition.clone(),
            collection: cli.collection.clone(),
            store,
            fail_on_fetch_error: cli.fail_on_fetch_error,
        })
    }

    /// Whether the contact address was left at the shipped placeholder.
    pub fn uses_placeholder_contact(&self) -> bool {
        self.contact == DEFAULT_CONTACT
    }
}
