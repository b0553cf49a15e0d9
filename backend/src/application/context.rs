/// Request-scoped cancellation and deadline handling
use crate::application::repositories::collection::{CollectionError, CollectionResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carried by every repository and collection call.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels
/// all in-flight operations started with it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// No deadline, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        RequestContext {
            deadline: Some(Instant::now() + timeout),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// A context cancelled together with this one but able to carry its own deadline
    pub fn child(&self) -> Self {
        RequestContext {
            deadline: self.deadline,
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail fast when the context is already cancelled or past its deadline
    pub fn check(&self) -> CollectionResult<()> {
        if self.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(CollectionError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `operation` to completion unless the context is cancelled or its
    /// deadline passes first.
    pub async fn run<T, F>(&self, operation: F) -> CollectionResult<T>
    where
        F: Future<Output = CollectionResult<T>>,
    {
        self.check()?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, operation).await {
                    Ok(result) => result,
                    Err(_) => Err(CollectionError::DeadlineExceeded),
                },
                None => operation.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(CollectionError::Cancelled),
            result = bounded => result,
        }
    }
}
