//! Header redaction for recorded interactions

use tracing::debug;

use crate::headers::Headers;
use crate::snapshot::{RequestSnapshot, ResponseSnapshot};

/// Headers whose values never reach a cassette
pub const SENSITIVE_HEADERS: [&str; 6] = [
    "x-api-key",
    "CF-RAY",
    "Nel",
    "Report-To",
    "Server",
    "cf-cache-status",
];

/// Value written in place of a sensitive header's values
pub const FILTERED: &str = "FILTERED";

/// Replaces the values of sensitive headers with a placeholder
///
/// The header itself is kept, with its original name and position, so the
/// recording still shows that it was present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRedactor {
    names: Vec<String>,
    placeholder: String,
}

impl HeaderRedactor {
    /// Redactor over the default sensitive set
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: SENSITIVE_HEADERS.iter().map(|s| (*s).to_string()).collect(),
            placeholder: FILTERED.to_string(),
        }
    }

    /// Add names to the sensitive set
    #[must_use]
    pub fn with_extra_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.is_sensitive(&name) {
                self.names.push(name);
            }
        }
        self
    }

    /// Use a different placeholder value
    #[must_use]
    pub fn with_placeholder(self, placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            ..self
        }
    }

    /// Sensitive header names, defaults first
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether `name` is in the sensitive set (case-insensitive)
    #[must_use]
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Redact a header mapping
    #[must_use]
    pub fn redact_headers(&self, headers: &Headers) -> Headers {
        headers.map_values(|name, values| {
            if self.is_sensitive(name) {
                debug!("Filtering header '{}'", name);
                vec![self.placeholder.clone()]
            } else {
                values.to_vec()
            }
        })
    }

    /// Redact a response's headers
    ///
    /// An absent response, or one without headers, is returned as is.
    #[must_use]
    pub fn redact_response(&self, response: Option<ResponseSnapshot>) -> Option<ResponseSnapshot> {
        let response = response?;
        match &response.headers {
            Some(headers) if !headers.is_empty() => {
                let headers = self.redact_headers(headers);
                Some(ResponseSnapshot {
                    headers: Some(headers),
                    ..response
                })
            }
            _ => Some(response),
        }
    }

    /// Redact a request's headers
    #[must_use]
    pub fn redact_request(&self, request: RequestSnapshot) -> RequestSnapshot {
        if request.headers.is_empty() {
            return request;
        }
        let headers = self.redact_headers(&request.headers);
        request.with_headers(headers)
    }
}

impl Default for HeaderRedactor {
    fn default() -> Self {
        Self::new()
    }
}
