use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CapabilityError, HandlerError};

/// Caller-supplied cancellation signal for one dispatch.
///
/// Handlers route every external call through [`DispatchContext::run`], so a
/// cancelled or expired dispatch is reported as such instead of as success.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }
}

impl DispatchContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the dispatch is already cancelled or past its deadline.
    pub fn check(&self, operation: &'static str) -> Result<(), HandlerError> {
        if self.cancel.is_cancelled() {
            return Err(HandlerError::Cancelled { operation });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(HandlerError::DeadlineExceeded { operation });
        }
        Ok(())
    }

    /// Run one external call, racing it against cancellation and the deadline.
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, HandlerError>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        self.check(operation)?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HandlerError::Cancelled { operation }),
            _ = deadline => Err(HandlerError::DeadlineExceeded { operation }),
            result = call => result.map_err(|source| HandlerError::External { operation, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = DispatchContext::new();
        let value = ctx.run("op", async { Ok::<_, CapabilityError>(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .run("op", async {
                Err::<(), _>(CapabilityError::Rejected("constraint".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::External { operation: "op", .. }));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_call() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = DispatchContext::with_cancellation(token);

        let mut called = false;
        let err = ctx
            .run("op", async {
                called = true;
                Ok::<_, CapabilityError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Cancelled { operation: "op" }));
        assert!(!called);
    }

    #[tokio::test]
    async fn test_cancel_mid_flight() {
        let token = CancellationToken::new();
        let ctx = DispatchContext::with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let err = ctx
            .run("op", std::future::pending::<Result<(), CapabilityError>>())
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = DispatchContext::new().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run("op", std::future::pending::<Result<(), CapabilityError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::DeadlineExceeded { operation: "op" }));
    }
}
