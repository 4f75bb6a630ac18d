//! Warden remote collection façade.
//!
//! This crate defines the traits and types the console core depends on to talk
//! to collection endpoints. Implementations are remote (HTTP) or in-memory (tests).

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use warden_core::{QueryParams, Record, RecordId};

pub mod config;
pub mod http;

pub use config::ConsoleConfig;
pub use http::HttpApi;

/// Errors surfaced by collection accessors. Every variant carries a message an
/// admin can read as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ConsoleError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("remote ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error("internal: {0}")]
    Internal(String),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// One page of a collection as returned by the remote endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    pub items: Vec<Record>,
    pub total: Option<u64>,
}

/// Result of a single mutation. `delivered` carries the secondary outcome of
/// actions with a side effect (e.g. the user notification of a review).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub record: Option<Record>,
    pub delivered: Option<bool>,
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self { Self::default() }

    pub fn with_delivery(delivered: bool) -> Self {
        Self { delivered: Some(delivered), ..Self::default() }
    }

    /// True only when the action reported its side effect as not delivered.
    pub fn secondary_failed(&self) -> bool { self.delivered == Some(false) }
}

/// Remote collection accessor.
#[async_trait::async_trait]
pub trait CollectionApi: Send + Sync {
    /// Fetch one filtered page of `collection`.
    async fn fetch(&self, collection: &str, query: &QueryParams) -> ConsoleResult<FetchResponse>;

    /// Fetch a single record (detail view).
    async fn get(&self, collection: &str, id: RecordId) -> ConsoleResult<Record>;

    /// Apply `operation` to one record.
    async fn mutate(
        &self,
        collection: &str,
        id: RecordId,
        operation: &str,
        payload: Value,
    ) -> ConsoleResult<ActionResult>;
}

/// Re-fetch of a screen's collection. The only path by which cached rows change.
#[async_trait::async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> ConsoleResult<()>;
}

// ----------------- Mock implementation -----------------

/// A mutation seen by [`MockApi`], kept for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationCall {
    pub collection: String,
    pub id: RecordId,
    pub operation: String,
    pub payload: Value,
}

#[derive(Default)]
struct MockState {
    collections: HashMap<String, Vec<Record>>,
    failing: HashSet<RecordId>,
    undelivered: HashSet<RecordId>,
    fail_fetches: usize,
    fetches: Vec<(String, QueryParams)>,
    mutations: Vec<MutationCall>,
}

/// Simple in-memory collection accessor for tests. Filters are matched as
/// exact string equality on the record field of the same name.
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
}

impl MockApi {
    pub fn new() -> Self { Self::default() }

    pub fn with_records(self, collection: &str, records: Vec<Record>) -> Self {
        self.lock().collections.insert(collection.to_string(), records);
        self
    }

    /// Mutations of `id` are rejected with a remote error.
    pub fn fail_on(self, id: RecordId) -> Self {
        self.lock().failing.insert(id);
        self
    }

    /// Mutations of `id` succeed but report their side effect as not delivered.
    pub fn undelivered(self, id: RecordId) -> Self {
        self.lock().undelivered.insert(id);
        self
    }

    /// The next `n` fetches fail.
    pub fn fail_next_fetches(&self, n: usize) {
        self.lock().fail_fetches = n;
    }

    pub fn fetch_count(&self) -> usize { self.lock().fetches.len() }

    pub fn last_query(&self) -> Option<QueryParams> {
        self.lock().fetches.last().map(|(_, q)| q.clone())
    }

    pub fn mutations(&self) -> Vec<MutationCall> { self.lock().mutations.clone() }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.lock().collections.get(collection).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_mock_operation(rec: &mut Record, operation: &str, payload: &Value) {
    match operation {
        "publish" => {
            let on = payload.get("is_published").and_then(Value::as_bool).unwrap_or(true);
            rec.fields.insert("is_published".into(), Value::Bool(on));
        }
        "approve" => { rec.fields.insert("status".into(), json!("approved")); }
        "reject" => {
            rec.fields.insert("status".into(), json!("rejected"));
            if let Some(reason) = payload.get("reason") { rec.fields.insert("reason".into(), reason.clone()); }
        }
        "review" => { rec.fields.insert("status".into(), json!("reviewed")); }
        "read" => { rec.fields.insert("read".into(), Value::Bool(true)); }
        _ => {}
    }
}

#[async_trait::async_trait]
impl CollectionApi for MockApi {
    async fn fetch(&self, collection: &str, query: &QueryParams) -> ConsoleResult<FetchResponse> {
        let mut st = self.lock();
        st.fetches.push((collection.to_string(), query.clone()));
        if st.fail_fetches > 0 {
            st.fail_fetches -= 1;
            return Err(ConsoleError::Transport("mock fetch failure".into()));
        }
        let all = st.collections.get(collection).cloned().unwrap_or_default();
        let matching: Vec<Record> = all
            .into_iter()
            .filter(|r| {
                query
                    .iter()
                    .filter(|(k, _)| *k != "limit" && *k != "offset")
                    .all(|(k, v)| r.field_text(k).as_deref() == Some(v))
            })
            .collect();
        let total = matching.len() as u64;
        let offset = query.get("offset").and_then(|s| s.parse::<usize>().ok()).unwrap_or(0);
        let limit = query.limit().map(|l| l as usize).unwrap_or(usize::MAX);
        let items = matching.into_iter().skip(offset).take(limit).collect();
        Ok(FetchResponse { items, total: Some(total) })
    }

    async fn get(&self, collection: &str, id: RecordId) -> ConsoleResult<Record> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned())
            .ok_or_else(|| ConsoleError::NotFound(format!("{} #{}", collection, id)))
    }

    async fn mutate(
        &self,
        collection: &str,
        id: RecordId,
        operation: &str,
        payload: Value,
    ) -> ConsoleResult<ActionResult> {
        let mut st = self.lock();
        st.mutations.push(MutationCall {
            collection: collection.to_string(),
            id,
            operation: operation.to_string(),
            payload: payload.clone(),
        });
        if st.failing.contains(&id) {
            return Err(ConsoleError::Remote { status: 500, message: format!("{} #{} failed", operation, id) });
        }
        let delivered = if operation == "review" { Some(!st.undelivered.contains(&id)) } else { None };
        let delivered = delivered.or_else(|| st.undelivered.contains(&id).then_some(false));
        let rows = st
            .collections
            .get_mut(collection)
            .ok_or_else(|| ConsoleError::NotFound(format!("collection {}", collection)))?;
        let pos = rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ConsoleError::NotFound(format!("{} #{}", collection, id)))?;
        if operation == "delete" {
            rows.remove(pos);
            return Ok(ActionResult { delivered, ..ActionResult::default() });
        }
        apply_mock_operation(&mut rows[pos], operation, &payload);
        Ok(ActionResult { record: Some(rows[pos].clone()), delivered, message: None })
    }
}
