//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Store operation failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl QueueError {
    /// Wrap a store-side error.
    pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(e))
    }
}
