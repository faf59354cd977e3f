//! Deadline and cancellation carrier threaded through every retry sequence.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::RetryError;

/// Why a [`Context`] stopped being active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Cancelled,
    DeadlineExceeded,
}

impl ContextError {
    /// Attach the name of the operation that was interrupted.
    pub fn into_retry_error(self, operation: &str) -> RetryError {
        match self {
            ContextError::Cancelled => RetryError::Cancelled {
                operation: operation.to_string(),
            },
            ContextError::DeadlineExceeded => RetryError::DeadlineExceeded {
                operation: operation.to_string(),
            },
        }
    }
}

/// An optional deadline plus a cancellation token.
///
/// Cloning is cheap and clones share the same token, so cancelling any clone
/// cancels them all. Children created with [`Context::with_timeout`] are
/// cancelled along with their parent but not the other way around.
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context with no deadline that is only stopped by an explicit cancel.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Child context whose deadline is `timeout` from now, or the parent's
    /// deadline if that comes first. A timeout too large to represent adds
    /// no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.child(Instant::now().checked_add(timeout))
    }

    /// Child context with the earlier of `deadline` and the parent's deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.child(Some(deadline))
    }

    fn child(&self, deadline: Option<Instant>) -> Self {
        let deadline = match (self.deadline, deadline) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            deadline,
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `None` while the context is active.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.err().is_none()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => ContextError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}
