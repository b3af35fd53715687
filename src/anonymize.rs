//! Host anonymization for recorded requests
//!
//! Requests to the configured host get their netloc replaced with a random
//! `<token>.redacted.local` name before they are persisted. Requests to any
//! other host are left alone so their recordings stay useful for diagnosis.
//! Replay never looks at the host (see [`crate::matching`]), so the token does
//! not need to be stable.

use rand::RngCore;
use tracing::debug;

use crate::snapshot::RequestSnapshot;
use crate::urlsplit::UrlParts;

/// Domain appended to every anonymized host
pub const REDACTED_DOMAIN: &str = "redacted.local";

/// Number of random bytes in a host token (two hex characters each)
pub const TOKEN_BYTES: usize = 6;

/// Name of the header rewritten alongside the URL
const HOST_HEADER: &str = "Host";

/// Generate a fresh host token: `TOKEN_BYTES` random bytes, lowercase hex
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Rewrites requests aimed at the reference netloc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAnonymizer {
    reference_netloc: Option<String>,
    redacted_domain: String,
}

impl HostAnonymizer {
    /// Anonymizer scoped to `reference_netloc`; `None` disables it
    #[must_use]
    pub fn new(reference_netloc: Option<String>) -> Self {
        Self {
            reference_netloc,
            redacted_domain: REDACTED_DOMAIN.to_string(),
        }
    }

    /// Use a different domain for anonymized hosts
    #[must_use]
    pub fn with_redacted_domain(self, domain: impl Into<String>) -> Self {
        Self {
            redacted_domain: domain.into(),
            ..self
        }
    }

    /// The netloc this anonymizer rewrites
    #[must_use]
    pub fn reference_netloc(&self) -> Option<&str> {
        self.reference_netloc.as_deref()
    }

    /// Whether anonymization is active for this session
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.reference_netloc.is_some()
    }

    /// Whether `url` points at the reference netloc
    #[must_use]
    pub fn targets(&self, url: &str) -> bool {
        match (&self.reference_netloc, UrlParts::split(url)) {
            (Some(reference), Some(parts)) => parts.netloc == reference,
            _ => false,
        }
    }

    /// Anonymize a request
    ///
    /// Returns the request unchanged when the URL is not absolute, when no
    /// reference netloc is configured, or when the URL points elsewhere.
    #[must_use]
    pub fn anonymize(&self, request: RequestSnapshot) -> RequestSnapshot {
        self.anonymize_with_token(request, &random_token())
    }

    /// Anonymize a request using a caller-supplied token
    #[must_use]
    pub fn anonymize_with_token(&self, request: RequestSnapshot, token: &str) -> RequestSnapshot {
        let Some(reference) = self.reference_netloc.as_deref() else {
            return request;
        };
        let Some(parts) = UrlParts::split(&request.url) else {
            return request;
        };
        if parts.netloc != reference {
            return request;
        }

        let netloc = format!("{token}.{}", self.redacted_domain);
        let url = parts.with_netloc(&netloc).to_string();

        debug!("Anonymized request host: {} {}", request.method, url);

        let request = request.with_url(url).with_host(&netloc);
        let headers = request
            .headers
            .clone()
            .with_replaced(HOST_HEADER, vec![netloc]);
        request.with_headers(headers)
    }
}
