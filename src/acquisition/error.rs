//! Error taxonomy for the acquisition pipeline.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal outcome of a request made through the rate-limit aware client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("'{path}' was not found")]
    NotFound { path: String },

    #[error("request to '{path}' was rejected as unauthorized; check that the GitHub token is valid")]
    Unauthorized { path: String },

    #[error("API rate limit exceeded; {}", describe_reset(.reset_at.as_ref()))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("request to '{path}' failed after {attempts} attempts; check your network connection and try again")]
    Transient {
        path: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to '{path}' failed with HTTP {status}")]
    Http { path: String, status: StatusCode },

    #[error("request to '{path}' could not be sent")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode the response from '{path}'")]
    Decode {
        path: String,
        #[source]
        source: Box<dyn core::error::Error + Send + Sync>,
    },
}

fn describe_reset(reset_at: Option<&DateTime<Utc>>) -> String {
    reset_at.map_or_else(
        || "the reset time was not reported".to_string(),
        |at| format!("the quota resets at {}", at.to_rfc3339()),
    )
}

impl ApiError {
    /// Whether the failure came from the network or the server rather than the request itself
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// A failure of a single pipeline stage.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("could not parse repository reference '{input}'; expected 'owner/repo', 'github.com/owner/repo' or 'https://github.com/owner/repo'")]
    Parse { input: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("could not clone '{url}': {reason}")]
    Clone { url: String, reason: String },

    #[error("local git support is not available on this system")]
    VcsUnavailable,

    #[error("'git {command}' failed: {reason}")]
    Vcs { command: String, reason: String },

    #[error("could not access '{}'", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("background task did not complete")]
    Task(#[from] tokio::task::JoinError),
}

/// Coarse classification of an [`AcquisitionError`], used when logging stage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    #[strum(to_string = "ParseError")]
    Parse,
    #[strum(to_string = "RateLimitError")]
    RateLimit,
    #[strum(to_string = "TransientAPIError")]
    TransientApi,
    #[strum(to_string = "APIError")]
    Api,
    #[strum(to_string = "CloneError")]
    Clone,
    #[strum(to_string = "VCSError")]
    Vcs,
    #[strum(to_string = "FileAccessError")]
    FileAccess,
}

impl AcquisitionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Api(ApiError::RateLimited { .. }) => ErrorKind::RateLimit,
            Self::Api(e) if e.is_transient() => ErrorKind::TransientApi,
            Self::Api(_) => ErrorKind::Api,
            Self::Clone { .. } => ErrorKind::Clone,
            Self::VcsUnavailable | Self::Vcs { .. } | Self::Task(_) => ErrorKind::Vcs,
            Self::FileAccess { .. } => ErrorKind::FileAccess,
        }
    }

    /// The rate-limit reset time, if this error reports an exhausted quota
    #[must_use]
    pub const fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Api(ApiError::RateLimited { reset_at }) => *reset_at,
            _ => None,
        }
    }
}
