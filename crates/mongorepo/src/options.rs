//! Option builders for repository calls
//!
//! Each alias pairs the driver's own options struct with a [`CallContext`],
//! so one value carries both "how to query" and "how long / until when".
//!
//! ```ignore
//! use mongorepo::options::FindOptions;
//!
//! let opts = FindOptions::new()
//!     .page(3, 20)
//!     .sort_by("createdAt", false)
//!     .fields(["name", "email"])
//!     .timeout(Duration::from_secs(2));
//! ```

use std::time::Duration;

use bson::{Bson, Document};
use mongodb::options as driver;
use tokio_util::sync::CancellationToken;

use crate::context::CallContext;

/// Driver options plus the caller's context
#[derive(Debug, Clone, Default)]
pub struct OperationOptions<O> {
    driver: O,
    context: CallContext,
}

pub type FindOptions = OperationOptions<driver::FindOptions>;
pub type FindOneOptions = OperationOptions<driver::FindOneOptions>;
pub type CountOptions = OperationOptions<driver::CountOptions>;
pub type EstimatedCountOptions = OperationOptions<driver::EstimatedDocumentCountOptions>;
pub type DistinctOptions = OperationOptions<driver::DistinctOptions>;
pub type UpdateOptions = OperationOptions<driver::UpdateOptions>;
pub type FindOneAndUpdateOptions = OperationOptions<driver::FindOneAndUpdateOptions>;
pub type ReplaceOptions = OperationOptions<driver::ReplaceOptions>;
pub type InsertOneOptions = OperationOptions<driver::InsertOneOptions>;
pub type InsertManyOptions = OperationOptions<driver::InsertManyOptions>;
pub type DeleteOptions = OperationOptions<driver::DeleteOptions>;
pub type AggregateOptions = OperationOptions<driver::AggregateOptions>;
pub type CreateIndexOptions = OperationOptions<driver::CreateIndexOptions>;
pub type BulkWriteOptions = OperationOptions<BulkSettings>;

/// Settings for [`Repository::bulk_write`](crate::Repository::bulk_write)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSettings {
    /// Stop at the first failing operation (default: true)
    pub ordered: Option<bool>,
}

impl<O: Default> OperationOptions<O> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O> OperationOptions<O> {
    /// Start from a driver options value built elsewhere.
    pub fn from_driver(driver: O) -> Self {
        Self {
            driver,
            context: CallContext::default(),
        }
    }

    /// Replace the whole call context.
    pub fn context(mut self, ctx: CallContext) -> Self {
        self.context = ctx;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.context.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.context.cancellation = Some(token);
        self
    }

    pub fn driver(&self) -> &O {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut O {
        &mut self.driver
    }

    pub fn call_context(&self) -> &CallContext {
        &self.context
    }

    pub fn into_parts(self) -> (O, CallContext) {
        (self.driver, self.context)
    }
}

impl<O> From<O> for OperationOptions<O> {
    fn from(driver: O) -> Self {
        Self::from_driver(driver)
    }
}

/// `{field: 1, ...}`, or `None` when no field was named.
fn projection<I, S>(fields: I) -> Option<Document>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut projection = Document::new();
    for field in fields {
        projection.insert(field.as_ref(), 1);
    }
    if projection.is_empty() {
        None
    } else {
        Some(projection)
    }
}

/// Appends `field: ±1` to the sort document, creating it if needed.
fn append_sort(sort: &mut Option<Document>, field: &str, ascending: bool) {
    let direction = Bson::Int32(if ascending { 1 } else { -1 });
    sort.get_or_insert_with(Document::new).insert(field, direction);
}

impl FindOptions {
    pub fn skip(mut self, skip: u64) -> Self {
        self.driver.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.driver.limit = Some(limit);
        self
    }

    /// Replace the sort. An empty document leaves the current sort alone.
    pub fn sort(mut self, sort: Document) -> Self {
        if !sort.is_empty() {
            self.driver.sort = Some(sort);
        }
        self
    }

    /// One-based paging: `limit = page_size`, `skip = page_size * (page_index - 1)`.
    /// A `page_index` below 1 is read as 1.
    pub fn page(mut self, page_index: u64, page_size: u64) -> Self {
        let page_index = page_index.max(1);
        self.driver.limit = Some(i64::try_from(page_size).unwrap_or(i64::MAX));
        self.driver.skip = Some(page_size.saturating_mul(page_index - 1));
        self
    }

    /// Only return the named fields. An empty list is ignored.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(projection) = projection(fields) {
            self.driver.projection = Some(projection);
        }
        self
    }

    /// Append one sort key after any existing ones.
    pub fn sort_by(mut self, field: &str, ascending: bool) -> Self {
        append_sort(&mut self.driver.sort, field, ascending);
        self
    }

    pub fn has_sort(&self) -> bool {
        self.driver.sort.is_some()
    }
}

impl FindOneOptions {
    pub fn skip(mut self, skip: u64) -> Self {
        self.driver.skip = Some(skip);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(projection) = projection(fields) {
            self.driver.projection = Some(projection);
        }
        self
    }

    pub fn sort_by(mut self, field: &str, ascending: bool) -> Self {
        append_sort(&mut self.driver.sort, field, ascending);
        self
    }
}

impl CountOptions {
    pub fn limit(mut self, limit: u64) -> Self {
        self.driver.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.driver.skip = Some(skip);
        self
    }
}

impl UpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.driver.upsert = Some(upsert);
        self
    }
}

impl ReplaceOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.driver.upsert = Some(upsert);
        self
    }
}

impl FindOneAndUpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.driver.upsert = Some(upsert);
        self
    }

    /// Return the document as it looks after the update.
    pub fn return_document_after(mut self) -> Self {
        self.driver.return_document = Some(driver::ReturnDocument::After);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(projection) = projection(fields) {
            self.driver.projection = Some(projection);
        }
        self
    }
}

impl InsertManyOptions {
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.driver.ordered = Some(ordered);
        self
    }
}

impl AggregateOptions {
    pub fn allow_disk_use(mut self, allow: bool) -> Self {
        self.driver.allow_disk_use = Some(allow);
        self
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.driver.batch_size = Some(size);
        self
    }
}

impl BulkWriteOptions {
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.driver.ordered = Some(ordered);
        self
    }

    pub fn is_ordered(&self) -> bool {
        self.driver.ordered.unwrap_or(true)
    }
}
