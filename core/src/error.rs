//! Error types for the Scoutnet client.
//!
//! # Design
//! `ApiError` covers everything that can go wrong around a request: missing
//! credentials, unexpected status codes, undecodable payloads and snapshot
//! file I/O. Field-level problems inside otherwise well-formed member data
//! are not errors here; they are reported as
//! [`ValidationError`](crate::validate::ValidationError) values alongside the
//! records that did validate.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// The two Scoutnet APIs, each authenticated with its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    Memberlist,
    Customlists,
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKind::Memberlist => write!(f, "memberlist"),
            ApiKind::Customlists => write!(f, "customlists"),
        }
    }
}

/// Errors returned by `ScoutnetClient`, `Snapshot` and `ClientConfig`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server rejected the API id / key pair (401 or 403).
    #[error("authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Any other non-200 status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body was not the JSON shape the API documents.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A request was built for an API whose key was never configured.
    #[error("no API key configured for {0}")]
    MissingApiKey(ApiKind),

    /// A custom list summary carried no member link to fetch.
    #[error("mailing list {0} has no link")]
    MissingListLink(u64),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
