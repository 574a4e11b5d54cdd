//! Caller-supplied deadlines and cancellation
//!
//! Futures in Rust are cancelled by dropping them, so a caller that owns the
//! future needs nothing from us. [`CallContext`] covers the other case: a
//! deadline or a [`CancellationToken`] that should end a driver call started
//! somewhere deeper in the stack.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{RepoError, Result};

/// Timeout and cancellation supplied by the caller of one operation
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancellation: None,
        }
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            timeout: None,
            cancellation: Some(token),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Effective bounds of one repository call
#[derive(Debug, Clone, Default)]
pub struct Scope {
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl Scope {
    /// Combine a repository-wide timeout with the caller's context. The
    /// shorter of the two timeouts wins.
    pub fn new(query_timeout: Option<Duration>, ctx: CallContext) -> Self {
        let timeout = match (query_timeout, ctx.timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            timeout,
            cancellation: ctx.cancellation,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Run `fut` within this scope.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        guard(self.timeout, self.cancellation.as_ref(), fut).await
    }
}

/// Run `fut`, failing with `RepoError::Timeout` once `timeout` elapses or
/// `RepoError::Cancelled` once `cancellation` fires. The future is dropped
/// in both cases.
pub async fn guard<F, T>(
    timeout: Option<Duration>,
    cancellation: Option<&CancellationToken>,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(RepoError::Timeout(format!(
                    "operation exceeded {}ms",
                    limit.as_millis()
                ))),
            },
            None => fut.await,
        }
    };

    match cancellation {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(RepoError::Cancelled("operation cancelled by caller".to_string())),
                result = bounded => result,
            }
        }
        None => bounded.await,
    }
}
