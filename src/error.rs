use std::time::Duration;

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Every failure the retry engine, the driving loop and the job poller can
/// produce.
///
/// A single type is shared by all three so the driver only needs
/// [`RetryError::is_retryable`] to decide whether to keep going. HTTP-level
/// diagnostics are raised into it with [`RetryError::from_diagnostics`] and
/// lowered back with [`Diagnostics::from_error`].
#[derive(Debug, Clone, Error)]
pub enum RetryError {
    #[error("invalid retry configuration: {0}")]
    InvalidConfig(String),

    #[error("non-retryable HTTP status {status} for {operation}")]
    NonRetryableStatus { status: u16, operation: String },

    #[error("{operation} succeeded but diagnostics has errors: {diagnostics}")]
    DiagnosticsOnSuccess {
        operation: String,
        diagnostics: Diagnostics,
    },

    #[error("{operation} is still in state 'retrying'")]
    StillRetrying { operation: String },

    #[error("error fetching job status: {diagnostics}")]
    JobStatusFetch { diagnostics: Diagnostics },

    #[error("{subject} hasn't yet reached a final state")]
    NotFinal { subject: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error(
        "timeout after {timeout:?} while waiting for {operation}{}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        operation: String,
        timeout: Duration,
        last_error: Option<Box<RetryError>>,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("context deadline exceeded while running {operation}")]
    DeadlineExceeded { operation: String },
}

fn last_error_suffix(last: &Option<Box<RetryError>>) -> String {
    match last {
        Some(err) => format!(" (last error: {err})"),
        None => String::new(),
    }
}

impl RetryError {
    /// Whether the driving loop should wait and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RetryError::StillRetrying { .. }
                | RetryError::JobStatusFetch { .. }
                | RetryError::NotFinal { .. }
        )
    }

    /// True when the error means the time budget or the caller's deadline ran
    /// out, as opposed to the remote side rejecting the request.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RetryError::Timeout { .. } | RetryError::DeadlineExceeded { .. }
        )
    }

    /// Raise diagnostics returned by a job status fetch into the engine's
    /// error type. Always retryable.
    pub fn from_diagnostics(diagnostics: Diagnostics) -> Self {
        RetryError::JobStatusFetch { diagnostics }
    }
}

/// Errors raised while building or using the AAP HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid AAP host URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
