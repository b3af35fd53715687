//! Plain-HTTP client for live calls
//!
//! Executes a [`RequestSnapshot`] and captures the reply as a
//! [`ResponseSnapshot`]. Used when the engine decides a cassette must be
//! recorded, and by the `fetch` CLI command.

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::headers::Headers;
use crate::snapshot::{Interaction, RequestSnapshot, ResponseSnapshot};
use crate::{CassetteError, Result};

/// Default limit on captured response bodies
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024; // 16 MB

/// Default per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for live calls
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            timeout: REQUEST_TIMEOUT,
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }

    /// Use a different request timeout
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Use a different response size limit
    #[must_use]
    pub fn with_max_response_size(self, max_response_size: usize) -> Self {
        Self {
            max_response_size,
            ..self
        }
    }

    /// Execute a request
    ///
    /// # Errors
    ///
    /// Returns error if the URL is not plain `http://`, the method or headers
    /// are invalid, the call fails or times out, or the body exceeds the limit
    pub async fn execute(&self, request: &RequestSnapshot) -> Result<ResponseSnapshot> {
        let uri = parse_http_uri(&request.url)?;

        debug!("Executing {} {}", request.method, uri);

        let method = request.method.parse::<Method>().map_err(|e| {
            CassetteError::Http(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut request_builder = Request::builder().method(method).uri(uri);
        for (name, value) in request.headers.to_pairs() {
            request_builder = request_builder.header(name, value);
        }

        let http_request = request_builder
            .body(Full::new(Bytes::copy_from_slice(&request.body)))
            .map_err(|e| CassetteError::Http(format!("Failed to build request: {e}")))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(http_request))
            .await
            .map_err(|_| {
                CassetteError::Http(format!("Request timed out after {:?}", self.timeout))
            })?
            .map_err(|e| {
                warn!("Request failed: {e}");
                CassetteError::Http(format!("Request failed: {e}"))
            })?;

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| CassetteError::Http(format!("Failed to read response body: {e}")))?
            .to_bytes();

        if body.len() > self.max_response_size {
            return Err(CassetteError::DataTooLarge {
                size: body.len(),
                limit: self.max_response_size,
            });
        }

        Ok(ResponseSnapshot::new(status, headers).with_body(body.to_vec()))
    }

    /// Execute a request and pass the interaction through the engine hooks
    ///
    /// The live call uses the original request; only the returned interaction
    /// is sanitized.
    ///
    /// # Errors
    ///
    /// Returns error if the live call fails
    pub async fn record(
        &self,
        config: &EngineConfig,
        request: RequestSnapshot,
    ) -> Result<Interaction> {
        let response = self.execute(&request).await?;
        Ok(config.sanitize(Interaction {
            request,
            response: Some(response),
        }))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a URL the plain-HTTP connector can reach
fn parse_http_uri(url: &str) -> Result<Uri> {
    if !url.starts_with("http://") {
        return Err(CassetteError::InvalidUrl {
            url: url.to_string(),
            reason: "only plain http:// URLs can be fetched".to_string(),
        });
    }

    url.parse::<Uri>().map_err(|e| CassetteError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
