//! Lazily consumed result of a find call

use futures::TryStreamExt;
use mongodb::Cursor;
use serde::de::DeserializeOwned;

use crate::context::Scope;
use crate::{RepoError, Result};

/// A cursor, or the error the driver returned when opening it.
///
/// Opening errors are kept rather than returned so that callers can chain
/// `find_list_result_by_filter(..).await.all().await` and see the failure at
/// the point they consume the result. Each consuming call runs under the
/// repository's timeout and the caller's cancellation token.
#[derive(Debug)]
pub struct FindResult<T> {
    cursor: Result<Cursor<T>>,
    scope: Scope,
}

impl<T> FindResult<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    pub(crate) fn new(cursor: Result<Cursor<T>>, scope: Scope) -> Self {
        Self { cursor, scope }
    }

    /// Next document, or `Ok(None)` once the cursor is exhausted.
    pub async fn one(&mut self) -> Result<Option<T>> {
        match &mut self.cursor {
            Ok(cursor) => {
                self.scope
                    .run(async { Ok(cursor.try_next().await?) })
                    .await
            }
            Err(err) => Err(err.clone()),
        }
    }

    /// Drain the remaining documents.
    pub async fn all(self) -> Result<Vec<T>> {
        let cursor = self.cursor?;
        self.scope
            .run(async { Ok(cursor.try_collect().await?) })
            .await
    }

    /// The underlying driver cursor, for streaming without the scope.
    pub fn into_cursor(self) -> Result<Cursor<T>> {
        self.cursor
    }

    /// Error from opening the cursor, if any
    pub fn error(&self) -> Option<&RepoError> {
        self.cursor.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.cursor.is_ok()
    }
}
