//! Request and response snapshots handed to the hooks

use serde::{Deserialize, Serialize};

use crate::headers::Headers;

/// Derived host field exposed by some request types
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HostField {
    /// The request type has no host field
    #[default]
    Absent,
    /// Host is derived from the URL and cannot be assigned
    ReadOnly(String),
    /// Host can be assigned independently of the URL
    Settable(String),
}

impl HostField {
    /// Current value, if the field exists
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::ReadOnly(host) | Self::Settable(host) => Some(host),
        }
    }
}

/// Snapshot of an outgoing request before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// HTTP method
    pub method: String,
    /// Absolute URL; may be empty or relative for unusual clients
    pub url: String,
    /// Derived host field
    #[serde(default)]
    pub host: HostField,
    /// Request headers
    #[serde(default)]
    pub headers: Headers,
    /// Request body
    #[serde(default)]
    pub body: Vec<u8>,
}

impl RequestSnapshot {
    /// Create a body-less request with no headers
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            host: HostField::Absent,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Replace the header mapping
    #[must_use]
    pub fn with_headers(self, headers: Headers) -> Self {
        Self { headers, ..self }
    }

    /// Replace the host field
    #[must_use]
    pub fn with_host_field(self, host: HostField) -> Self {
        Self { host, ..self }
    }

    /// Replace the URL
    #[must_use]
    pub fn with_url(self, url: String) -> Self {
        Self { url, ..self }
    }

    /// Whether this request's host field can be assigned
    #[must_use]
    pub fn host_is_settable(&self) -> bool {
        matches!(self.host, HostField::Settable(_))
    }

    /// Assign the host field if it is settable; otherwise return unchanged
    #[must_use]
    pub fn with_host(self, host: &str) -> Self {
        if self.host_is_settable() {
            self.with_host_field(HostField::Settable(host.to_string()))
        } else {
            self
        }
    }
}

/// Snapshot of a received response before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    /// HTTP status code
    pub status: u16,
    /// Response headers; `None` when the engine captured none
    #[serde(default)]
    pub headers: Option<Headers>,
    /// Response body
    #[serde(default)]
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    /// Create a response with headers and an empty body
    #[must_use]
    pub fn new(status: u16, headers: Headers) -> Self {
        Self {
            status,
            headers: Some(headers),
            body: Vec::new(),
        }
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(self, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..self
        }
    }
}

/// A recorded request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Request as sent
    pub request: RequestSnapshot,
    /// Response, absent when none was received
    pub response: Option<ResponseSnapshot>,
}
