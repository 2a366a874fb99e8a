//! Fragment resolution failures.

use std::fmt;

/// Why a fragment could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    /// Target URL could not be parsed.
    InvalidUrl,
    /// DNS, connect, reset or timeout.
    Transport,
    /// Backend answered with a non-200 status.
    Status,
    /// Rejected by an open circuit without a network attempt.
    CircuitOpen,
    /// The cache layer failed to read.
    Cache,
}

/// A failed fragment resolution, as handed to the error handler.
///
/// Only the message and optional status code are public: a circuit-open
/// rejection looks exactly like a transport failure apart from its message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FragmentError {
    message: String,
    status_code: Option<u16>,
    kind: FailureKind,
}

impl FragmentError {
    fn service(url: &str, cause: impl fmt::Display, status_code: Option<u16>, kind: FailureKind) -> Self {
        Self {
            message: format!("Service {} FAILED due to {}", url, cause),
            status_code,
            kind,
        }
    }

    pub fn invalid_url(url: &str) -> Self {
        Self::service(url, format_args!("Invalid URL {}", url), None, FailureKind::InvalidUrl)
    }

    pub fn transport(url: &str, cause: impl fmt::Display) -> Self {
        Self::service(url, cause, None, FailureKind::Transport)
    }

    pub fn status(url: &str, status_code: u16) -> Self {
        Self::service(
            url,
            format_args!("status code {}", status_code),
            Some(status_code),
            FailureKind::Status,
        )
    }

    pub fn circuit_open(url: &str) -> Self {
        Self::service(url, "circuit breaker open", None, FailureKind::CircuitOpen)
    }

    pub fn cache(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            status_code: None,
            kind: FailureKind::Cache,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Whether this failure says something about the backend as a whole.
    ///
    /// Client-class statuses are about one fragment, not the backend.
    pub(crate) fn counts_against_backend(&self) -> bool {
        match self.kind {
            FailureKind::Transport => true,
            FailureKind::Status => !matches!(self.status_code, Some(400..=499)),
            FailureKind::InvalidUrl | FailureKind::CircuitOpen | FailureKind::Cache => false,
        }
    }
}
