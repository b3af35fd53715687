//! changedetection.io API requests
//!
//! Builds the request snapshots the wrapped client issues and interprets the
//! responses it gets back. Any status other than 200 yields an empty object.

use serde_json::{json, Map, Value};

use crate::headers::Headers;
use crate::snapshot::{RequestSnapshot, ResponseSnapshot};
use crate::urlsplit::is_absolute_http;
use crate::{CassetteError, Result};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Search endpoint path
pub const SEARCH_PATH: &str = "/api/v1/search";

/// Watch endpoint path prefix
pub const WATCH_PATH: &str = "/api/v1/watch";

/// Parameters of a watch search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Search text
    pub query: String,
    /// Match partial titles/URLs
    pub partial: bool,
    /// Restrict to a tag
    pub tag: Option<String>,
}

impl SearchQuery {
    /// Exact search for `query` across all tags
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            partial: false,
            tag: None,
        }
    }

    /// Enable partial matching
    #[must_use]
    pub fn partial(self, partial: bool) -> Self {
        Self { partial, ..self }
    }

    /// Restrict to a tag
    #[must_use]
    pub fn tag(self, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..self
        }
    }

    fn params(&self) -> Vec<(&str, String)> {
        let mut params = vec![
            ("q", self.query.clone()),
            ("partial", self.partial.to_string()),
        ];
        if let Some(tag) = &self.tag {
            params.push(("tag", tag.clone()));
        }
        params
    }
}

/// Request builder for one changedetection.io instance
#[derive(Debug, Clone)]
pub struct ChangeDetectionApi {
    base_url: String,
    api_key: String,
}

impl ChangeDetectionApi {
    /// Client for `base_url` authenticating with `api_key`
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not an absolute `http`/`https` URL
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        if !is_absolute_http(base_url) {
            return Err(CassetteError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an absolute http:// or https:// URL".to_string(),
            });
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/v1/search`
    #[must_use]
    pub fn search(&self, query: &SearchQuery) -> RequestSnapshot {
        self.get(SEARCH_PATH, &query.params())
    }

    /// `GET /api/v1/watch/{uuid}`
    #[must_use]
    pub fn watch(&self, uuid: &str) -> RequestSnapshot {
        let path = format!("{WATCH_PATH}/{}", urlencoding::encode(uuid));
        self.get(&path, &[])
    }

    /// `GET /api/v1/watch/{uuid}/history/{timestamp}`
    #[must_use]
    pub fn watch_history(&self, uuid: &str, timestamp: &str) -> RequestSnapshot {
        let path = format!(
            "{WATCH_PATH}/{}/history/{}",
            urlencoding::encode(uuid),
            urlencoding::encode(timestamp)
        );
        self.get(&path, &[])
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> RequestSnapshot {
        let headers: Headers = [(API_KEY_HEADER, self.api_key.as_str())]
            .into_iter()
            .collect();
        RequestSnapshot::new("GET", build_url(&self.base_url, path, query)).with_headers(headers)
    }
}

/// Join base, path and an encoded query string
fn build_url(base: &str, path: &str, query: &[(&str, String)]) -> String {
    let mut url = format!("{base}{path}");

    if !query.is_empty() {
        url.push('?');
        for (i, (key, value)) in query.iter().enumerate() {
            if i > 0 {
                url.push('&');
            }
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
    }

    url
}

/// Parse a search or watch response
///
/// # Errors
///
/// Returns error if a 200 response body is not valid JSON
pub fn json_or_empty(response: &ResponseSnapshot) -> Result<Value> {
    if response.status != 200 {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(&response.body)?)
}

/// Interpret a watch history response as `{timestamp, content}`
#[must_use]
pub fn history_or_empty(response: &ResponseSnapshot, timestamp: &str) -> Value {
    if response.status != 200 {
        return Value::Object(Map::new());
    }
    json!({
        "timestamp": timestamp,
        "content": String::from_utf8_lossy(&response.body),
    })
}
