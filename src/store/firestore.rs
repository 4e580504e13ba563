//! Firestore REST implementation of [`DocumentStore`].
//!
//! Each batch becomes one `documents:commit` call, which Firestore applies
//! atomically. Every document is written with a full `update` (replacing any
//! previous version under the same id) plus a field transform that sets
//! `timestamp` to the server's commit time.
//!
//! # Document Layout
//!
//! ```text
//! projects/{project}/databases/(default)/documents/daily_stats/20240115_Barack_Obama
//! {
//!     name:           "Barack_Obama",
//!     date:           "20240115",
//!     views:          41234,
//!     percent_change: 12.5 | null,
//!     timestamp:      <server time>
//! }
//! ```

use reqwest::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use super::DocumentStore;
use super::credentials::{EMULATOR_TOKEN, ServiceAccountKey, TokenProvider};
use crate::error::StoreError;
use crate::models::StoredDocument;
use crate::utils::truncate_for_log;

pub const DEFAULT_COLLECTION: &str = "daily_stats";
pub const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";
/// Field holding the server-assigned write time.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Handle to one Firestore collection.
#[derive(Debug)]
pub struct FirestoreStore {
    http: Client,
    base_url: String,
    /// `projects/{project}/databases/(default)`
    database: String,
    collection: String,
    tokens: TokenProvider,
}

impl FirestoreStore {
    pub fn new(
        http: Client,
        base_url: &str,
        project_id: &str,
        collection: &str,
        tokens: TokenProvider,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: format!("projects/{project_id}/databases/(default)"),
            collection: collection.to_string(),
            tokens,
        }
    }

    /// Connect to production Firestore with a service-account key.
    ///
    /// The first access token is fetched here, so bad credentials fail the
    /// run before any subject is processed.
    #[instrument(level = "info", skip(key), fields(client_email = %key.client_email))]
    pub async fn connect(
        key: ServiceAccountKey,
        project_override: Option<String>,
        collection: &str,
    ) -> Result<Self, StoreError> {
        let http = Client::builder().build()?;
        let project_id = project_override.unwrap_or_else(|| key.project_id.clone());
        let tokens = TokenProvider::service_account(key, http.clone());
        tokens.token().await?;

        info!(%project_id, %collection, "Connected to Firestore");
        Ok(Self::new(http, FIRESTORE_API, &project_id, collection, tokens))
    }

    /// Connect to a Firestore emulator at `host` (e.g. `localhost:8080`).
    pub fn emulator(host: &str, project_id: &str, collection: &str) -> Result<Self, StoreError> {
        let http = Client::builder().build()?;
        info!(%host, %project_id, %collection, "Using Firestore emulator");
        Ok(Self::new(
            http,
            &format!("http://{host}/v1"),
            project_id,
            collection,
            TokenProvider::fixed(EMULATOR_TOKEN),
        ))
    }

    /// Full resource name of the document with id `id`.
    pub fn document_name(&self, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database, self.collection, id)
    }

    /// Request body for committing `batch`.
    pub fn commit_body(&self, batch: &[StoredDocument]) -> Value {
        let writes: Vec<Value> = batch
            .iter()
            .map(|doc| {
                json!({
                    "update": {
                        "name": self.document_name(&doc.id),
                        "fields": encode_fields(doc),
                    },
                    "updateTransforms": [
                        { "fieldPath": TIMESTAMP_FIELD, "setToServerValue": "REQUEST_TIME" }
                    ],
                })
            })
            .collect();

        json!({ "writes": writes })
    }
}

/// Firestore typed-value encoding of a document's client-supplied fields.
fn encode_fields(doc: &StoredDocument) -> Value {
    let percent_change = match doc.percent_change {
        Some(change) => json!({ "doubleValue": change }),
        None => json!({ "nullValue": null }),
    };

    json!({
        "name": { "stringValue": doc.name },
        "date": { "stringValue": doc.date },
        "views": { "integerValue": doc.views.to_string() },
        "percent_change": percent_change,
    })
}

/// Body of a rejected commit, or a note saying why it could not be read.
async fn rejection_body(response: Response) -> String {
    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status, error = %e, "Could not read Firestore rejection body");
            format!("<unreadable body: {e}>")
        }
    }
}

impl DocumentStore for FirestoreStore {
    #[instrument(level = "info", skip_all, fields(writes = batch.len(), collection = %self.collection))]
    async fn commit(&self, batch: &[StoredDocument]) -> Result<(), StoreError> {
        let token = self.tokens.token().await?;
        let url = format!("{}/{}/documents:commit", self.base_url, self.database);
        let body = serde_json::to_string(&self.commit_body(batch))?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = rejection_body(response).await;
            error!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 300),
                "Firestore commit rejected"
            );
            return Err(StoreError::Commit {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Firestore commit accepted");
        Ok(())
    }
}
