//! Transactions with bounded retry on transient errors
//!
//! [`run_transaction`] starts a session on a registered client and runs a
//! closure inside a transaction. If the attempt fails with an error the
//! driver labels `TransientTransactionError`, the whole attempt (closure
//! included) runs again, up to `max_retry` times. Any other error aborts the
//! transaction and is returned as is.
//!
//! Each attempt gets its own timeout. A timeout or a cancelled token aborts
//! the open transaction and ends the call without retrying.
//!
//! # Example
//!
//! ```ignore
//! use futures::FutureExt;
//! use mongorepo::transaction::{run_transaction, TransactionConfig};
//!
//! let mut ctx = (&orders, &stock);
//! run_transaction(&TransactionConfig::new(), &mut ctx, |session, (orders, stock)| {
//!     async move {
//!         orders.create_in_session(&mut new_order(), session).await?;
//!         stock
//!             .update_one_in_session(doc! { "sku": "A1" }, doc! { "$inc": { "qty": -1 } }, session)
//!             .await?;
//!         Ok(())
//!     }
//!     .boxed()
//! })
//! .await?;
//! ```
//!
//! The closure takes the session and a caller context by mutable reference.
//! Borrowed state (repositories, inputs) goes in the context, the same way
//! the driver's own `and_run` works.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use mongodb::{
    options::{SessionOptions, TransactionOptions},
    Client, ClientSession,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::clients::{require_client, DEFAULT_ALIAS};
use crate::context::guard;
use crate::{RepoError, Result};

/// Attempts made when `max_retry` is zero
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Per-attempt timeout unless configured otherwise
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// How [`run_transaction`] finds its client and bounds its attempts
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    client_alias: String,
    timeout: Option<Duration>,
    max_retry: u32,
    session_options: Option<SessionOptions>,
    transaction_options: Option<TransactionOptions>,
    cancellation: Option<CancellationToken>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            client_alias: DEFAULT_ALIAS.to_string(),
            timeout: Some(DEFAULT_TRANSACTION_TIMEOUT),
            max_retry: DEFAULT_MAX_RETRY,
            session_options: None,
            transaction_options: None,
            cancellation: None,
        }
    }
}

impl TransactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the client registered under `alias`
    pub fn client_alias(mut self, alias: impl Into<String>) -> Self {
        self.client_alias = alias.into();
        self
    }

    /// Time limit for each attempt
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Let attempts run without a time limit
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Maximum number of attempts; 0 means [`DEFAULT_MAX_RETRY`]
    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn session_options(mut self, options: SessionOptions) -> Self {
        self.session_options = Some(options);
        self
    }

    pub fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.transaction_options = Some(options);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn alias(&self) -> &str {
        &self.client_alias
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn effective_max_retry(&self) -> u32 {
        if self.max_retry == 0 {
            DEFAULT_MAX_RETRY
        } else {
            self.max_retry
        }
    }
}

/// The session operations the retry loop needs
#[async_trait]
pub trait TransactionSession: Send {
    async fn start_transaction(&mut self, options: Option<TransactionOptions>) -> Result<()>;

    async fn commit_transaction(&mut self) -> Result<()>;

    async fn abort_transaction(&mut self) -> Result<()>;
}

#[async_trait]
impl TransactionSession for ClientSession {
    async fn start_transaction(&mut self, options: Option<TransactionOptions>) -> Result<()> {
        ClientSession::start_transaction(self)
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        ClientSession::commit_transaction(self).await?;
        Ok(())
    }

    async fn abort_transaction(&mut self) -> Result<()> {
        ClientSession::abort_transaction(self).await?;
        Ok(())
    }
}

/// Run `f` in a transaction on the client named by `config`.
pub async fn run_transaction<C, F>(config: &TransactionConfig, context: &mut C, f: F) -> Result<()>
where
    C: Send,
    F: for<'s> FnMut(&'s mut ClientSession, &'s mut C) -> BoxFuture<'s, Result<()>>,
{
    run_transaction_with_result(config, context, f).await
}

/// Like [`run_transaction`], returning what the committed attempt produced.
pub async fn run_transaction_with_result<C, F, T>(
    config: &TransactionConfig,
    context: &mut C,
    f: F,
) -> Result<T>
where
    C: Send,
    F: for<'s> FnMut(&'s mut ClientSession, &'s mut C) -> BoxFuture<'s, Result<T>>,
{
    let client = require_client(&config.client_alias)?;
    run_transaction_on(&client, config, context, f).await
}

/// Run `f` in a transaction on `client`, ignoring `config`'s alias.
#[instrument(skip_all, fields(alias = %config.client_alias))]
pub async fn run_transaction_on<C, F, T>(
    client: &Client,
    config: &TransactionConfig,
    context: &mut C,
    f: F,
) -> Result<T>
where
    C: Send,
    F: for<'s> FnMut(&'s mut ClientSession, &'s mut C) -> BoxFuture<'s, Result<T>>,
{
    let mut session = client
        .start_session()
        .with_options(config.session_options.clone())
        .await?;
    // The session ends when dropped.
    execute_transaction(&mut session, config, context, f).await
}

/// The retry loop, over any [`TransactionSession`].
pub async fn execute_transaction<S, C, F, T>(
    session: &mut S,
    config: &TransactionConfig,
    context: &mut C,
    mut f: F,
) -> Result<T>
where
    S: TransactionSession,
    C: Send,
    F: for<'s> FnMut(&'s mut S, &'s mut C) -> BoxFuture<'s, Result<T>>,
{
    let max_retry = config.effective_max_retry();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = guard(
            config.timeout,
            config.cancellation.as_ref(),
            run_attempt(
                &mut *session,
                config.transaction_options.clone(),
                &mut *context,
                &mut f,
            ),
        )
        .await;

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Transaction committed after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if err.is_interrupted() {
            // The attempt was dropped mid-flight and may have left a transaction open.
            // The abort gets its own deadline; the attempt's has already elapsed.
            if let Err(abort_err) = guard(config.timeout, None, session.abort_transaction()).await {
                debug!(error = %abort_err, "Abort after interrupted attempt failed");
            }
            return Err(err);
        }

        if !err.is_transient_transaction_error() {
            return Err(err);
        }

        if attempt >= max_retry {
            return Err(RepoError::TransactionFailed {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        warn!(
            attempt,
            max_retry,
            error = %err,
            "Transaction attempt failed with transient error, retrying"
        );
    }
}

async fn run_attempt<S, C, F, T>(
    session: &mut S,
    options: Option<TransactionOptions>,
    context: &mut C,
    f: &mut F,
) -> Result<T>
where
    S: TransactionSession,
    C: Send,
    F: for<'s> FnMut(&'s mut S, &'s mut C) -> BoxFuture<'s, Result<T>>,
{
    session.start_transaction(options).await?;

    // Calling `f` inside the block lets `catch_unwind` see a panic raised
    // before the closure returns its future.
    let body = AssertUnwindSafe(async { f(&mut *session, &mut *context).await })
        .catch_unwind()
        .await;
    let outcome = match body {
        Ok(result) => result,
        Err(panic) => Err(RepoError::Internal(format!(
            "panic in transaction function: {}",
            panic_message(panic.as_ref())
        ))),
    };

    match outcome {
        Ok(value) => {
            session.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                debug!(error = %abort_err, "Abort failed");
            }
            Err(err)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
