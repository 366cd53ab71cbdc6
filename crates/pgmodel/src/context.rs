//! Cancellation and deadlines for query execution.

use crate::error::{OrmError, OrmResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execution context attached to a builder with `with_context`.
///
/// The default context never cancels and has no deadline. Pool checkout,
/// statement compilation and execution all run under the context, so a cancel
/// or an expired deadline aborts whichever of them is in flight.
///
/// # Example
///
/// ```ignore
/// let token = CancellationToken::new();
/// let ctx = ExecContext::new()
///     .with_cancel(token.clone())
///     .with_timeout(Duration::from_secs(5));
///
/// let rows = orm.table("users").with_context(ctx).get().await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// A context that is never canceled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for [`ExecContext::new`].
    pub fn background() -> Self {
        Self::default()
    }

    /// Abort execution when `token` is canceled.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Abort execution at `deadline`. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Abort execution once `timeout` has elapsed from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Returns the error the context is currently in, if any.
    pub fn err(&self) -> Option<OrmError> {
        if self.is_canceled() {
            return Some(OrmError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(OrmError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `future` to completion unless the context is canceled or its
    /// deadline passes first. The future is dropped in that case.
    pub async fn run<T, F>(&self, future: F) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let canceled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = canceled => Err(OrmError::Canceled),
            _ = expired => Err(OrmError::DeadlineExceeded),
            result = future => result,
        }
    }
}
