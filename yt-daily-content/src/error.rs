//! The error kinds a run can fail with.
//!
//! Everything is propagated as an [`eyre::Report`], but the root cause is always one of the
//! types below so that callers (and tests) can tell an authentication problem from an API
//! failure or from data the platform returned in an unexpected shape:
//!
//! ```rust,ignore
//! if let Some(auth) = report.downcast_ref::<AuthError>() { /* ... */ }
//! ```

use http::StatusCode;
use std::path::PathBuf;

/// The stored credential is missing, malformed, or no longer accepted by Google.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no OAuth credentials found in {}; redo the OAuth setup steps from the README", .0.display())]
    MissingCredentials(PathBuf),

    #[error("credential file {} is malformed; redo the OAuth setup steps from the README", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not read credential file {}; redo the OAuth setup steps from the README", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("browser authorization did not complete: {0}; redo the OAuth setup steps from the README")]
    Consent(String),

    #[error("stored credential has no refresh token and its access token expired; redo the OAuth setup steps from the README")]
    NoRefreshToken,

    #[error("access was revoked or the refresh token expired; redo the OAuth setup steps from the README")]
    Revoked,

    #[error("token refresh was rejected: {0}; redo the OAuth setup steps from the README")]
    Refresh(String),

    /// The Data API refused an access token we still considered valid, e.g. because access was
    /// revoked before the token expired.
    #[error("YouTube API {endpoint} rejected the access token; redo the OAuth setup steps from the README")]
    Rejected { endpoint: String },
}

/// A request to the YouTube Data API did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Quota exhaustion or rate limiting. Google reports these as `403` with a reason such as
    /// `quotaExceeded`, or as a plain `429`.
    #[error("YouTube API {endpoint} hit a quota or rate limit ({reason}, status {status})")]
    RateLimited {
        endpoint: String,
        status: StatusCode,
        reason: String,
    },

    #[error("YouTube API {endpoint} request failed with status {status}: {message}")]
    Status {
        endpoint: String,
        status: StatusCode,
        message: String,
    },

    /// Connection failures and request timeouts.
    #[error("YouTube API {endpoint} request could not be completed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("YouTube API {endpoint} returned a body that does not match its schema")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("subscribed channel {0} has no uploads playlist (deleted or terminated?)")]
    MissingUploads(String),
}

impl ApiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// The platform returned a value we could not interpret.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized video duration {value:?}")]
    Duration {
        value: String,
        #[source]
        source: Option<jiff::Error>,
    },

    #[error("unrecognized timestamp {value:?}")]
    Timestamp {
        value: String,
        #[source]
        source: jiff::Error,
    },
}
