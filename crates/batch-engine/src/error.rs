//! Remote error taxonomy
//!
//! Every collaborator call returns a [`RemoteError`]. The [`ErrorKind`] decides
//! what the engine does with it: retry, skip, or surface.

use serde::{Deserialize, Serialize};

/// Classification of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Quota or rate limit exceeded
    Quota,

    /// Momentary unavailability (5xx, backend error)
    Unavailable,

    /// The item already exists
    Duplicate,

    /// The target does not exist
    NotFound,

    /// Malformed request, auth failure or anything unclassified
    Fatal,
}

impl ErrorKind {
    /// Whether this kind is expected to resolve on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Quota | Self::Unavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quota => write!(f, "quota"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::NotFound => write!(f, "not_found"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Error returned by a remote resource call
///
/// # Example
///
/// ```
/// use batch_engine::{ErrorKind, RemoteError};
///
/// let err = RemoteError::from_status(409, "Member already exists.");
/// assert_eq!(err.kind, ErrorKind::Duplicate);
///
/// let err = RemoteError::from_status(403, "Quota exceeded for quota metric 'Queries'");
/// assert_eq!(err.kind, ErrorKind::Quota);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} remote error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct RemoteError {
    /// Failure classification
    pub kind: ErrorKind,

    /// HTTP status, when the transport reported one
    pub status: Option<u16>,

    /// Message as reported by the remote API
    pub message: String,
}

impl RemoteError {
    /// Create an error with an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Quota, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// Classify a failed HTTP response
    ///
    /// The message is consulted before the status because the directory API
    /// reports quota exhaustion as 403 and duplicates as 409 or 400.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify(status, &message);
        Self {
            kind,
            status: Some(status),
            message,
        }
    }

    /// Attach the HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<anyhow::Error> for RemoteError {
    fn from(err: anyhow::Error) -> Self {
        Self::fatal(err.to_string())
    }
}

fn classify(status: u16, message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();

    if status == 429 || lower.contains("quota") || lower.contains("rate limit") {
        ErrorKind::Quota
    } else if lower.contains("duplicate")
        || lower.contains("already exists")
        || lower.contains("already has")
        || status == 409 {
        ErrorKind::Duplicate
    } else if matches!(status, 500 | 502 | 503 | 504) || lower.contains("backend error") {
        ErrorKind::Unavailable
    } else if status == 404 || lower.contains("not found") || lower.contains("notfound") {
        ErrorKind::NotFound
    } else {
        ErrorKind::Fatal
    }
}
