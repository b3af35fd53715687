//! Replay matching policy
//!
//! A live request is paired with a recorded interaction by comparing a small
//! set of request fields. Host and port are left out of the default key
//! because recordings carry an anonymized host that never equals the live one.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::snapshot::{Interaction, RequestSnapshot};
use crate::urlsplit::UrlParts;

/// Request field that can take part in matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    /// HTTP method
    Method,
    /// URL scheme
    Scheme,
    /// Host name
    Host,
    /// Port
    Port,
    /// URL path
    Path,
    /// Decoded, sorted query parameters
    Query,
}

impl MatchField {
    /// Lowercase field name as used in engine configuration
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Scheme => "scheme",
            Self::Host => "host",
            Self::Port => "port",
            Self::Path => "path",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Fields used when no policy is configured
pub const DEFAULT_MATCH_ON: [MatchField; 4] = [
    MatchField::Method,
    MatchField::Scheme,
    MatchField::Path,
    MatchField::Query,
];

/// Request fields extracted for matching
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    /// Method, uppercase
    pub method: String,
    /// Scheme, lowercase
    pub scheme: String,
    /// Host without port
    pub host: String,
    /// Port as written in the URL, empty when implicit
    pub port: String,
    /// Path, `/` when empty
    pub path: String,
    /// Query parameters in canonical form, see [`normalize_query`]
    pub query: String,
}

impl MatchKey {
    /// Extract the key from a request
    ///
    /// URLs that cannot be split yield empty URL components, so such requests
    /// only match each other by method.
    #[must_use]
    pub fn from_request(request: &RequestSnapshot) -> Self {
        let method = request.method.trim().to_uppercase();
        let Some(parts) = UrlParts::split(&request.url) else {
            return Self {
                method,
                scheme: String::new(),
                host: String::new(),
                port: String::new(),
                path: String::new(),
                query: String::new(),
            };
        };

        let (host, port) = split_netloc(parts.netloc);
        Self {
            method,
            scheme: parts.scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port: port.to_string(),
            path: normalize_path(parts.path),
            query: normalize_query(parts.query.unwrap_or_default()),
        }
    }

    /// Value of a single field
    #[must_use]
    pub fn field(&self, field: MatchField) -> &str {
        match field {
            MatchField::Method => &self.method,
            MatchField::Scheme => &self.scheme,
            MatchField::Host => &self.host,
            MatchField::Port => &self.port,
            MatchField::Path => &self.path,
            MatchField::Query => &self.query,
        }
    }
}

/// Split `[userinfo@]host[:port]` into host and port
fn split_netloc(netloc: &str) -> (&str, &str) {
    let hostport = netloc.rsplit_once('@').map_or(netloc, |(_, hp)| hp);

    // Bracketed IPv6 literal: the port follows the closing bracket
    if hostport.starts_with('[') {
        return match hostport.split_once(']') {
            Some((host, rest)) => (
                &hostport[..=host.len()],
                rest.strip_prefix(':').unwrap_or_default(),
            ),
            None => (hostport, ""),
        };
    }

    hostport.rsplit_once(':').unwrap_or((hostport, ""))
}

/// Normalize a URL path
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Canonical form of a query string
///
/// Pairs are form-decoded (`+` and `%20` both become a space), pairs with a
/// blank value are dropped, and the rest are sorted and re-encoded. Parameter
/// order and encoding differences therefore never prevent a match.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.sort();

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// How the engine treats a cassette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    /// Replay an existing cassette; record only when none exists yet
    #[default]
    Once,
    /// Never make live calls
    None,
    /// Always make live calls and record them
    All,
}

impl RecordMode {
    /// Lowercase mode name as used in engine configuration
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::None => "none",
            Self::All => "all",
        }
    }

    /// Decide what to do for a test
    ///
    /// `cassette_existed` is whether the cassette held interactions when it
    /// was loaded for the test. It is fixed for the whole test: interactions
    /// recorded during a `Once` run do not switch that run to replay.
    #[must_use]
    pub fn decide(self, cassette_existed: bool) -> ReplayDecision {
        match self {
            Self::Once if cassette_existed => ReplayDecision::Replay,
            Self::Once | Self::All => ReplayDecision::RecordLive,
            Self::None => ReplayDecision::Replay,
        }
    }
}

/// Outcome of [`RecordMode::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDecision {
    /// Serve from recorded interactions only
    Replay,
    /// Perform the live call and persist it
    RecordLive,
}

/// Which request fields identify a recorded interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPolicy {
    fields: Vec<MatchField>,
}

impl MatchPolicy {
    /// Policy over the given fields, in order
    #[must_use]
    pub fn new(fields: impl Into<Vec<MatchField>>) -> Self {
        Self {
            fields: fields.into(),
        }
    }

    /// Fields compared by this policy
    #[must_use]
    pub fn fields(&self) -> &[MatchField] {
        &self.fields
    }

    /// SHA-256 over the selected fields
    ///
    /// Each field is written as its name, then a length-prefixed value, so
    /// distinct field sets never collide.
    #[must_use]
    pub fn fingerprint(&self, request: &RequestSnapshot) -> [u8; 32] {
        let key = MatchKey::from_request(request);
        let mut hasher = Sha256::new();

        for &field in &self.fields {
            let name = field.as_str();
            hasher.update(name.as_bytes());
            let value = key.field(field);
            hasher.update((value.len() as u32).to_le_bytes());
            hasher.update(value.as_bytes());
        }

        hasher.finalize().into()
    }

    /// Whether two requests identify the same recorded interaction
    #[must_use]
    pub fn matches(&self, live: &RequestSnapshot, recorded: &RequestSnapshot) -> bool {
        let live_key = MatchKey::from_request(live);
        let recorded_key = MatchKey::from_request(recorded);
        self.fields
            .iter()
            .all(|&field| live_key.field(field) == recorded_key.field(field))
    }

    /// Index of the first recorded interaction matching `live`
    pub fn find_match<'a, I>(&self, live: &RequestSnapshot, recorded: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a Interaction>,
    {
        let target = self.fingerprint(live);
        let found = recorded
            .into_iter()
            .position(|interaction| self.fingerprint(&interaction.request) == target);

        debug!(
            "Match lookup: {} {} (key: {}) -> {:?}",
            live.method,
            live.url,
            hex::encode(&target[..8]),
            found
        );

        found
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_ON)
    }
}
