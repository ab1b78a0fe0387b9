use crate::domain::device_store::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Request-scoped cancellation and deadline handed to every store call
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Context cancelled together with its parent, keeping the parent's deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `operation` until it finishes, the context is cancelled, or the
    /// deadline passes. In the latter two cases the future is dropped.
    pub async fn run<T, F>(&self, operation: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if self.token.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        match self.deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return Err(StoreError::DeadlineExceeded);
                }
                tokio::select! {
                    _ = self.token.cancelled() => Err(StoreError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(StoreError::DeadlineExceeded),
                    result = operation => result,
                }
            }
            None => {
                tokio::select! {
                    _ = self.token.cancelled() => Err(StoreError::Cancelled),
                    result = operation => result,
                }
            }
        }
    }
}
