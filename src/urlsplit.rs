//! Raw URL splitting
//!
//! Recorded URLs are rewritten without normalization so that path and query
//! bytes reach the cassette exactly as the client sent them. Only the base URL
//! from the environment goes through the `url` crate, for validation.

use std::fmt;

/// Components of an absolute `http`/`https` URL, borrowed from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlParts<'a> {
    /// Scheme without `://`
    pub scheme: &'a str,
    /// `host[:port]`, including userinfo if present
    pub netloc: &'a str,
    /// Path, possibly empty
    pub path: &'a str,
    /// Query without the leading `?`
    pub query: Option<&'a str>,
    /// Fragment without the leading `#`
    pub fragment: Option<&'a str>,
}

/// Whether `url` is an absolute `http://` or `https://` URL
#[must_use]
pub fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl<'a> UrlParts<'a> {
    /// Split an absolute `http`/`https` URL
    ///
    /// Returns `None` for anything else.
    #[must_use]
    pub fn split(url: &'a str) -> Option<Self> {
        if !is_absolute_http(url) {
            return None;
        }

        let (scheme, rest) = url.split_once("://")?;

        let netloc_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (netloc, rest) = rest.split_at(netloc_end);

        let (rest, fragment) = match rest.split_once('#') {
            Some((before, fragment)) => (before, Some(fragment)),
            None => (rest, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        Some(Self {
            scheme,
            netloc,
            path,
            query,
            fragment,
        })
    }

    /// Same components with a different netloc
    #[must_use]
    pub fn with_netloc(self, netloc: &'a str) -> Self {
        Self { netloc, ..self }
    }
}

impl fmt::Display for UrlParts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.netloc, self.path)?;
        if let Some(query) = self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}
