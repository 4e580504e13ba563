//! Service-account credentials and OAuth2 access tokens for Firestore.
//!
//! A service-account key is exchanged for a bearer token with the JWT-bearer
//! grant: an RS256-signed assertion naming the account, the Datastore scope
//! and the token endpoint is posted to `token_uri`. The token is cached and
//! reused until shortly before it expires.
//!
//! When talking to the Firestore emulator no key is needed; the emulator
//! accepts the fixed token `owner`.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::error::CredentialError;
use crate::utils::truncate_for_log;

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
pub const EMULATOR_TOKEN: &str = "owner";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a downloaded service-account JSON key that matter here.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Load a key from a JSON file on disk.
    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let key = Self::from_json(&raw)?;
        info!(project_id = %key.project_id, client_email = %key.client_email, "Loaded service-account key");
        Ok(key)
    }

    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        serde_json::from_str(raw).map_err(CredentialError::Parse)
    }

    /// Signed JWT assertion valid for one hour from `issued_at`.
    pub fn assertion(&self, issued_at: DateTime<Utc>) -> Result<String, CredentialError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

enum TokenSource {
    ServiceAccount { key: ServiceAccountKey, http: Client },
    Fixed(String),
}

/// Hands out bearer tokens, refreshing them as they near expiry.
pub struct TokenProvider {
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.source {
            TokenSource::ServiceAccount { key, .. } => key.client_email.as_str(),
            TokenSource::Fixed(_) => "fixed",
        };
        f.debug_struct("TokenProvider").field("source", &kind).finish()
    }
}

impl TokenProvider {
    pub fn service_account(key: ServiceAccountKey, http: Client) -> Self {
        Self {
            source: TokenSource::ServiceAccount { key, http },
            cached: Mutex::new(None),
        }
    }

    /// A provider that always returns `token`, e.g. [`EMULATOR_TOKEN`].
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Fixed(token.into()),
            cached: Mutex::new(None),
        }
    }

    /// A bearer token valid for at least another minute.
    pub async fn token(&self) -> Result<String, CredentialError> {
        let (key, http) = match &self.source {
            TokenSource::Fixed(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount { key, http } => (key, http),
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let fresh = exchange(key, http, now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

#[instrument(level = "info", skip_all, fields(client_email = %key.client_email))]
async fn exchange(
    key: &ServiceAccountKey,
    http: &Client,
    now: DateTime<Utc>,
) -> Result<CachedToken, CredentialError> {
    let assertion = key.assertion(now)?;
    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(CredentialError::TokenExchange {
            status: status.as_u16(),
            body: truncate_for_log(&body, 300),
        });
    }

    let token: TokenResponse = serde_json::from_str(&body).map_err(CredentialError::Decode)?;
    info!(expires_in = token.expires_in, "Obtained Firestore access token");
    Ok(CachedToken {
        value: token.access_token,
        expires_at: now + Duration::seconds(token.expires_in),
    })
}
