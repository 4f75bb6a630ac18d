//! Environment-driven runtime configuration.

use std::time::Duration;

use serde::Serialize;
use warden_core::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080/api/admin";
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_POLL_MS: u64 = 5_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub api_base: String,
    #[serde(skip)]
    pub api_token: Option<String>,
    pub page_size: u32,
    pub debounce_ms: u64,
    pub poll_ms: u64,
    pub http_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_ms: DEFAULT_POLL_MS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ConsoleConfig {
    /// Read `WARDEN_*` variables; unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let num = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok()).filter(|v| *v > 0);
        Self {
            api_base: get("WARDEN_API_BASE")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.api_base),
            api_token: get("WARDEN_API_TOKEN").filter(|s| !s.trim().is_empty()),
            page_size: num("WARDEN_PAGE_SIZE").and_then(|v| u32::try_from(v).ok()).unwrap_or(d.page_size),
            debounce_ms: num("WARDEN_DEBOUNCE_MS").unwrap_or(d.debounce_ms),
            poll_ms: num("WARDEN_POLL_MS").unwrap_or(d.poll_ms),
            http_timeout_secs: num("WARDEN_HTTP_TIMEOUT_SECS").unwrap_or(d.http_timeout_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration { Duration::from_secs(self.http_timeout_secs) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_and_falls_back() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WARDEN_API_BASE", "https://admin.example.com/api/"),
            ("WARDEN_PAGE_SIZE", "100"),
            ("WARDEN_POLL_MS", "zero"),
            ("WARDEN_DEBOUNCE_MS", "0"),
        ]);
        let cfg = ConsoleConfig::from_lookup(|k| env.get(k).map(|s| s.to_string()));
        assert_eq!(cfg.api_base, "https://admin.example.com/api");
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.poll_ms, DEFAULT_POLL_MS);
        assert_eq!(cfg.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(cfg.api_token.is_none());
    }
}
