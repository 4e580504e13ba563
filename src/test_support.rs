//! Shared test doubles: a canned HTTP responder, an in-memory document
//! store, a scripted history source, and an isolated process environment
//! for CLI parsing.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock};

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::cli::Cli;
use crate::config::DateWindow;
use crate::error::{FetchError, StoreError};
use crate::models::{DailyRecord, StoredDocument};
use crate::store::DocumentStore;
use crate::wikimedia::HistorySource;

/// Every environment variable [`Cli`] falls back to.
pub const TRACKER_ENV_VARS: [&str; 11] = [
    "WIKIMEDIA_CONTACT",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "GOOGLE_CLOUD_PROJECT",
    "FIRESTORE_EMULATOR_HOST",
    "TRACKER_SUBJECTS",
    "TRACKER_START_DATE",
    "TRACKER_BATCH_LIMIT",
    "TRACKER_COLLECTION",
    "WIKIMEDIA_API_BASE",
    "WIKIMEDIA_EDITION",
    "TRACKER_FAIL_ON_FETCH_ERROR",
];

fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Puts the tracker variables back the way they were, even if the test panics.
struct EnvRestore {
    previous: Vec<(&'static str, Option<OsString>)>,
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

/// Run `f` with every tracker variable unset except those in `vars`.
///
/// Holds a process-wide lock for the duration, so tests touching the
/// environment never overlap.
pub fn with_tracker_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let _lock = env_lock();
    let _restore = EnvRestore {
        previous: TRACKER_ENV_VARS
            .iter()
            .map(|&key| (key, std::env::var_os(key)))
            .collect(),
    };

    for key in TRACKER_ENV_VARS {
        unsafe { std::env::remove_var(key) };
    }
    for (key, value) in vars {
        assert!(
            TRACKER_ENV_VARS.iter().any(|known| known == key),
            "{key} is not a tracker variable"
        );
        unsafe { std::env::set_var(key, value) };
    }

    f()
}

/// Parse `args` with none of the caller's tracker variables leaking in.
pub fn parse_cli<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    with_tracker_env(&[], || Cli::parse_from(args))
}

/// Serve one canned response per incoming connection, in order.
///
/// Returns the base URL to point a client at and a handle resolving to the
/// raw requests received.
pub async fn serve(responses: Vec<(&'static str, String)>) -> (String, JoinHandle<Vec<String>>) {
    let raw = responses
        .into_iter()
        .map(|(status_line, body)| {
            format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
        })
        .collect();
    serve_raw(raw).await
}

/// Like [`serve`], but writes each response verbatim, framing included.
pub async fn serve_raw(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
        requests
    });

    (format!("http://{addr}"), handle)
}

/// A URL on localhost where nothing is listening.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// Document store keeping the latest version of each document in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, StoredDocument>>,
    commits: Mutex<Vec<usize>>,
    fail_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that accepts `n` commits and rejects every one after that.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Size of every successful commit, in order.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().unwrap().clone()
    }

    pub fn documents(&self) -> BTreeMap<String, StoredDocument> {
        self.documents.lock().unwrap().clone()
    }
}

impl DocumentStore for MemoryStore {
    async fn commit(&self, batch: &[StoredDocument]) -> Result<(), StoreError> {
        let mut commits = self.commits.lock().unwrap();
        if self.fail_after.is_some_and(|n| commits.len() >= n) {
            return Err(StoreError::Commit {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        let mut documents = self.documents.lock().unwrap();
        for doc in batch {
            documents.insert(doc.id.clone(), doc.clone());
        }
        commits.push(batch.len());
        Ok(())
    }
}

/// Canned behavior of [`ScriptedSource`] for one subject.
#[derive(Debug, Clone)]
pub enum Scripted {
    Records(Vec<DailyRecord>),
    Status(u16),
}

/// History source answering from a fixed script and recording call order.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = (&'static str, Scripted)>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|(subject, answer)| (subject.to_string(), answer))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HistorySource for ScriptedSource {
    async fn fetch_history(
        &self,
        subject: &str,
        _window: &DateWindow,
    ) -> Result<Vec<DailyRecord>, FetchError> {
        self.calls.lock().unwrap().push(subject.to_string());
        match self.script.get(subject) {
            Some(Scripted::Records(records)) => Ok(records.clone()),
            Some(Scripted::Status(status)) => Err(FetchError::Status {
                status: *status,
                body: String::new(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// One daily record per entry of `views` for `article`, starting 2024-01-01.
pub fn daily_series(article: &str, views: &[u64]) -> Vec<DailyRecord> {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    views
        .iter()
        .enumerate()
        .map(|(i, &v)| DailyRecord {
            article: article.to_string(),
            timestamp: format!(
                "{}00",
                crate::utils::format_compact_date(start + chrono::Days::new(i as u64))
            ),
            views: v,
        })
        .collect()
}
