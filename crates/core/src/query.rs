//! Canonical collection queries built from named filter inputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Page size used when a screen does not configure one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

pub const LIMIT_KEY: &str = "limit";
pub const OFFSET_KEY: &str = "offset";

/// Canonical key/value query. Keys are kept sorted so two queries built from
/// the same inputs compare equal regardless of input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool { self.0.contains_key(key) }

    pub fn limit(&self) -> Option<u32> {
        self.get(LIMIT_KEY).and_then(|s| s.parse().ok())
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pairs in the shape HTTP clients take for query strings.
    pub fn pairs(&self) -> Vec<(&str, &str)> { self.iter().collect() }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 { f.write_str("&")?; }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Turns raw filter inputs into a [`QueryParams`]. Blank inputs mean the
/// filter is absent; nothing here can fail.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    page_size: u32,
    offset: u64,
    filters: Vec<(String, String)>,
}

impl Default for QueryBuilder {
    fn default() -> Self { Self::new(DEFAULT_PAGE_SIZE) }
}

impl QueryBuilder {
    /// A zero page size falls back to [`DEFAULT_PAGE_SIZE`].
    pub fn new(page_size: u32) -> Self {
        let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
        Self { page_size, offset: 0, filters: Vec::new() }
    }

    /// Build from a name → raw input mapping in one go.
    pub fn from_inputs<I, K, V>(inputs: I, page_size: u32) -> QueryParams
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        inputs
            .into_iter()
            .fold(Self::new(page_size), |b, (k, v)| b.filter(k.as_ref(), v.as_ref()))
            .build()
    }

    pub fn filter(mut self, name: &str, raw: &str) -> Self {
        self.filters.push((name.to_string(), raw.to_string()));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn page_size(&self) -> u32 { self.page_size }

    pub fn build(&self) -> QueryParams {
        let mut out = BTreeMap::new();
        for (name, raw) in &self.filters {
            let key = name.trim();
            let value = raw.trim();
            if key.is_empty() || value.is_empty() { continue; }
            // later inputs for the same field win, like re-reading a form
            out.insert(key.to_string(), value.to_string());
        }
        out.insert(LIMIT_KEY.to_string(), self.page_size.to_string());
        if self.offset > 0 {
            out.insert(OFFSET_KEY.to_string(), self.offset.to_string());
        }
        QueryParams(out)
    }
}
