//! Session configuration for the record/replay engine
//!
//! A [`SessionConfig`] is resolved once per test session. It fixes the
//! reference netloc and produces an [`EngineConfig`] carrying the hooks the
//! engine calls for every interaction.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::anonymize::{HostAnonymizer, REDACTED_DOMAIN};
use crate::matching::{MatchField, MatchPolicy, RecordMode};
use crate::redact::{HeaderRedactor, FILTERED};
use crate::snapshot::{Interaction, RequestSnapshot, ResponseSnapshot};
use crate::{CassetteError, Result};

/// Environment variable holding the base URL of the wrapped API
pub const BASE_URL_ENV: &str = "CHANGEDETECTION_BASE_URL";

/// Tunable settings, usually loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment variable read for the base URL
    pub base_url_env: String,
    /// Header names filtered in addition to the built-in set
    pub extra_filter_headers: Vec<String>,
    /// Value written in place of filtered headers
    pub placeholder: String,
    /// Domain used for anonymized hosts
    pub redacted_domain: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url_env: BASE_URL_ENV.to_string(),
            extra_filter_headers: Vec::new(),
            placeholder: FILTERED.to_string(),
            redacted_domain: REDACTED_DOMAIN.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CassetteError::ConfigError(format!("Failed to read settings file: {e}"))
        })?;

        let settings: Self = toml::from_str(&content)
            .map_err(|e| CassetteError::ConfigError(format!("Failed to parse settings: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    ///
    /// # Errors
    ///
    /// Returns error if any field is empty or the redacted domain is not a
    /// bare domain name
    pub fn validate(&self) -> Result<()> {
        if self.base_url_env.trim().is_empty() {
            return Err(CassetteError::ConfigError(
                "base_url_env cannot be empty".to_string(),
            ));
        }

        for (i, name) in self.extra_filter_headers.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(CassetteError::ConfigError(format!(
                    "extra_filter_headers[{i}] cannot be empty"
                )));
            }
        }

        if self.placeholder.is_empty() {
            return Err(CassetteError::ConfigError(
                "placeholder cannot be empty".to_string(),
            ));
        }

        if self.redacted_domain.is_empty()
            || self
                .redacted_domain
                .contains(['/', '?', '#', '@', ':', ' '])
        {
            return Err(CassetteError::ConfigError(format!(
                "redacted_domain must be a bare domain name, got '{}'",
                self.redacted_domain
            )));
        }

        Ok(())
    }
}

/// Derive the reference netloc from a base URL
///
/// Returns `None` for an absent, empty, unparsable, or host-less URL. The
/// netloc is taken verbatim from the URL so it compares equal to the netloc of
/// requests built from the same base.
#[must_use]
pub fn resolve_reference_netloc(base_url: Option<&str>) -> Option<String> {
    let base_url = base_url.map(str::trim).filter(|s| !s.is_empty())?;

    match url::Url::parse(base_url) {
        Ok(parsed) if parsed.has_host() => {}
        Ok(_) => {
            warn!("Base URL has no host, anonymization disabled: {}", base_url);
            return None;
        }
        Err(e) => {
            warn!("Unparsable base URL, anonymization disabled: {}", e);
            return None;
        }
    }

    let (_, rest) = base_url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let netloc = &rest[..end];
    (!netloc.is_empty()).then(|| netloc.to_string())
}

/// Per-session sanitization state, immutable once resolved
#[derive(Debug, Clone)]
pub struct SessionConfig {
    settings: Settings,
    redactor: HeaderRedactor,
    anonymizer: HostAnonymizer,
    policy: MatchPolicy,
}

impl SessionConfig {
    /// Resolve a session from an explicit base URL
    #[must_use]
    pub fn resolve(base_url: Option<&str>, settings: Settings) -> Self {
        let reference_netloc = resolve_reference_netloc(base_url);

        match &reference_netloc {
            Some(netloc) => info!("Cassette session: anonymizing host {}", netloc),
            None => info!("Cassette session: no reference host, anonymization disabled"),
        }

        let redactor = HeaderRedactor::new()
            .with_extra_headers(settings.extra_filter_headers.iter().cloned())
            .with_placeholder(settings.placeholder.clone());
        let anonymizer = HostAnonymizer::new(reference_netloc)
            .with_redacted_domain(settings.redacted_domain.clone());

        Self {
            settings,
            redactor,
            anonymizer,
            policy: MatchPolicy::default(),
        }
    }

    /// Resolve a session from the environment variable named in `settings`
    #[must_use]
    pub fn from_env(settings: Settings) -> Self {
        let base_url = std::env::var(&settings.base_url_env).ok();
        Self::resolve(base_url.as_deref(), settings)
    }

    /// Settings this session was built from
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reference netloc, if anonymization is enabled
    #[must_use]
    pub fn reference_netloc(&self) -> Option<&str> {
        self.anonymizer.reference_netloc()
    }

    /// Header redactor for this session
    #[must_use]
    pub fn redactor(&self) -> &HeaderRedactor {
        &self.redactor
    }

    /// Host anonymizer for this session
    #[must_use]
    pub fn anonymizer(&self) -> &HostAnonymizer {
        &self.anonymizer
    }

    /// Match policy for this session
    #[must_use]
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Assemble the configuration handed to the record/replay engine
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let response_redactor = self.redactor.clone();
        let anonymizer = self.anonymizer.clone();

        EngineConfig {
            record_mode: RecordMode::Once,
            filter_headers: self.redactor.names().to_vec(),
            request_filter: self.redactor.clone(),
            before_record_response: Arc::new(move |response: Option<ResponseSnapshot>| {
                response_redactor.redact_response(response)
            }),
            before_record_request: Arc::new(move |request: RequestSnapshot| {
                anonymizer.anonymize(request)
            }),
            match_on: self.policy.fields().to_vec(),
        }
    }
}

/// Hook applied to each request before it is persisted
pub type RequestHook = Arc<dyn Fn(RequestSnapshot) -> RequestSnapshot + Send + Sync>;

/// Hook applied to each response before it is persisted
pub type ResponseHook =
    Arc<dyn Fn(Option<ResponseSnapshot>) -> Option<ResponseSnapshot> + Send + Sync>;

/// Configuration consumed by the record/replay engine
#[derive(Clone)]
pub struct EngineConfig {
    /// Record mode
    pub record_mode: RecordMode,
    /// Header names whose request values the engine filters
    pub filter_headers: Vec<String>,
    /// Filter over `filter_headers`, applied by [`EngineConfig::sanitize`]
    pub request_filter: HeaderRedactor,
    /// Response hook: header redaction
    pub before_record_response: ResponseHook,
    /// Request hook: host anonymization only
    pub before_record_request: RequestHook,
    /// Fields identifying a recorded interaction
    pub match_on: Vec<MatchField>,
}

impl EngineConfig {
    /// Policy over [`EngineConfig::match_on`]
    #[must_use]
    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::new(self.match_on.clone())
    }

    /// Run an interaction through every stage an engine applies before
    /// persisting it
    ///
    /// Request: `filter_headers` filtering, then the request hook.
    /// Response: the response hook.
    #[must_use]
    pub fn sanitize(&self, interaction: Interaction) -> Interaction {
        let request = self.request_filter.redact_request(interaction.request);
        Interaction {
            request: (self.before_record_request)(request),
            response: (self.before_record_response)(interaction.response),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("record_mode", &self.record_mode)
            .field("filter_headers", &self.filter_headers)
            .field("match_on", &self.match_on)
            .finish_non_exhaustive()
    }
}
