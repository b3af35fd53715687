//! cassette-guard - sanitization and matching hooks for recorded HTTP cassettes
//!
//! Recorded interactions pass through two hooks before they are persisted:
//! response headers are redacted and requests to the configured API host get
//! an anonymized hostname. Replay pairs live requests with recordings on
//! method, scheme, path and query, so the anonymized host never matters.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod anonymize;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod matching;
pub mod redact;
pub mod snapshot;
pub mod urlsplit;

pub use config::{EngineConfig, SessionConfig, Settings};
pub use error::{CassetteError, Result};
pub use headers::Headers;
pub use snapshot::{HostField, Interaction, RequestSnapshot, ResponseSnapshot};
