//! JSON-over-HTTP collection accessor.
//!
//! Endpoint shapes:
//! - `GET  {base}/{collection}?k=v&limit=n` → `{items|data: [...], total?}` or a bare array
//! - `GET  {base}/{collection}/{id}` → record, or `{item|data: record}`
//! - `POST {base}/{collection}/{id}/{operation}` with a JSON payload → result object

use std::time::Instant;

use metrics::{counter, histogram};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use warden_core::{QueryParams, Record, RecordId};

use crate::{ActionResult, CollectionApi, ConsoleConfig, ConsoleError, ConsoleResult, FetchResponse};

pub struct HttpApi {
    client: Client,
    base: String,
}

impl HttpApi {
    pub fn new(config: &ConsoleConfig) -> ConsoleResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = config.api_token.as_deref() {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|_| ConsoleError::Validation("api token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| ConsoleError::Internal(format!("building http client: {}", e)))?;
        Ok(Self { client, base: config.api_base.trim_end_matches('/').to_string() })
    }

    pub fn base(&self) -> &str { &self.base }

    fn url(&self, parts: &[&str]) -> String {
        let mut url = self.base.clone();
        for p in parts {
            url.push('/');
            url.push_str(p.trim_matches('/'));
        }
        url
    }

    async fn read_json(resp: reqwest::Response) -> ConsoleResult<Value> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| ConsoleError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(remote_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ConsoleError::Internal(format!("decoding response: {}", e)))
    }
}

/// Map a non-success response onto a readable error, preferring the server's
/// own `error` / `message` text.
pub fn remote_error(status: StatusCode, body: &str) -> ConsoleError {
    let from_body = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["error", "message", "detail"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    let message = from_body
        .or_else(|| {
            let t = body.trim();
            (!t.is_empty() && t.len() <= 200).then(|| t.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    match status {
        StatusCode::NOT_FOUND => ConsoleError::NotFound(message),
        StatusCode::CONFLICT => ConsoleError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ConsoleError::Validation(message),
        _ => ConsoleError::Remote { status: status.as_u16(), message },
    }
}

/// Decode a collection page. Rows without a usable id are skipped.
pub fn parse_fetch_body(body: Value) -> FetchResponse {
    let (rows, total) = match body {
        Value::Array(rows) => (rows, None),
        Value::Object(mut obj) => {
            let total = obj.get("total").and_then(Value::as_u64);
            let rows = ["items", "data", "results"]
                .iter()
                .find_map(|k| match obj.remove(*k) {
                    Some(Value::Array(rows)) => Some(rows),
                    _ => None,
                })
                .unwrap_or_default();
            (rows, total)
        }
        _ => (Vec::new(), None),
    };
    let raw_len = rows.len();
    let items: Vec<Record> = rows.into_iter().filter_map(Record::from_value).collect();
    if items.len() < raw_len {
        debug!(dropped = raw_len - items.len(), "fetch: rows without a valid id skipped");
    }
    FetchResponse { items, total }
}

/// Decode a single record, unwrapping `{item: ..}` / `{data: ..}` envelopes.
pub fn parse_record_body(body: Value) -> Option<Record> {
    match body {
        Value::Object(mut obj) if !obj.contains_key("id") => {
            ["item", "data", "record"].iter().find_map(|k| obj.remove(*k)).and_then(Record::from_value)
        }
        other => Record::from_value(other),
    }
}

/// Decode a mutation result. `notification_delivered` / `notified` /
/// `delivered` booleans are read as the secondary outcome.
pub fn parse_action_body(body: Value) -> ActionResult {
    let Value::Object(obj) = &body else { return ActionResult::ok(); };
    let delivered = ["notification_delivered", "notified", "delivered"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_bool));
    let message = obj.get("message").and_then(Value::as_str).map(str::to_string);
    let record = parse_record_body(body.clone());
    ActionResult { record, delivered, message }
}

#[async_trait::async_trait]
impl CollectionApi for HttpApi {
    async fn fetch(&self, collection: &str, query: &QueryParams) -> ConsoleResult<FetchResponse> {
        let t0 = Instant::now();
        let url = self.url(&[collection]);
        info!(collection = %collection, query = %query, "api: fetch start");
        let resp = self
            .client
            .get(&url)
            .query(&query.pairs())
            .send()
            .await
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;
        let body = Self::read_json(resp).await.map_err(|e| {
            warn!(collection = %collection, error = %e, "api: fetch failed");
            counter!("api_fetch_errors_total", 1u64);
            e
        })?;
        let page = parse_fetch_body(body);
        histogram!("api_fetch_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(collection = %collection, items = page.items.len(), total = ?page.total, took_ms = %t0.elapsed().as_millis(), "api: fetch ok");
        Ok(page)
    }

    async fn get(&self, collection: &str, id: RecordId) -> ConsoleResult<Record> {
        let t0 = Instant::now();
        let id_s = id.to_string();
        let resp = self
            .client
            .get(self.url(&[collection, &id_s]))
            .send()
            .await
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;
        let body = Self::read_json(resp).await?;
        let rec = parse_record_body(body)
            .ok_or_else(|| ConsoleError::Internal(format!("{} #{}: response carried no record", collection, id)))?;
        info!(collection = %collection, id, took_ms = %t0.elapsed().as_millis(), "api: get ok");
        Ok(rec)
    }

    async fn mutate(
        &self,
        collection: &str,
        id: RecordId,
        operation: &str,
        payload: Value,
    ) -> ConsoleResult<ActionResult> {
        let t0 = Instant::now();
        let id_s = id.to_string();
        debug!(collection = %collection, id, operation = %operation, "api: mutate start");
        let resp = self
            .client
            .post(self.url(&[collection, &id_s, operation]))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ConsoleError::Transport(e.to_string()))?;
        let res = Self::read_json(resp).await.map(parse_action_body);
        counter!("api_mutations_total", 1u64);
        match &res {
            Ok(r) => debug!(collection = %collection, id, operation = %operation, delivered = ?r.delivered, took_ms = %t0.elapsed().as_millis(), "api: mutate ok"),
            Err(e) => warn!(collection = %collection, id, operation = %operation, error = %e, "api: mutate failed"),
        }
        res
    }
}
