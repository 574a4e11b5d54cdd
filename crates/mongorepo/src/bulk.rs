//! Mixed write batches against one repository
//!
//! Operations run one after another in the order given. In ordered mode the
//! first failure ends the batch and is returned; unordered mode records each
//! failure with its index and carries on.

use std::collections::HashMap;

use bson::{Bson, Document};
use mongodb::options::{ReplaceOptions, UpdateOptions};
use tracing::{debug, instrument, warn};

use crate::entity::Entity;
use crate::options::BulkWriteOptions;
use crate::repository::{split, Repository};
use crate::{RepoError, Result};

/// One write in a bulk batch
#[derive(Debug, Clone)]
pub enum BulkOperation<T> {
    InsertOne(T),
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    ReplaceOne {
        filter: Document,
        replacement: T,
        upsert: bool,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl<T> BulkOperation<T> {
    pub fn insert_one(entity: T) -> Self {
        BulkOperation::InsertOne(entity)
    }

    pub fn update_one(filter: Document, update: Document) -> Self {
        BulkOperation::UpdateOne {
            filter,
            update,
            upsert: false,
        }
    }

    pub fn update_many(filter: Document, update: Document) -> Self {
        BulkOperation::UpdateMany {
            filter,
            update,
            upsert: false,
        }
    }

    pub fn replace_one(filter: Document, replacement: T) -> Self {
        BulkOperation::ReplaceOne {
            filter,
            replacement,
            upsert: false,
        }
    }

    pub fn delete_one(filter: Document) -> Self {
        BulkOperation::DeleteOne { filter }
    }

    pub fn delete_many(filter: Document) -> Self {
        BulkOperation::DeleteMany { filter }
    }

    /// Turn on upsert. No effect on inserts and deletes.
    pub fn upsert(mut self) -> Self {
        match &mut self {
            BulkOperation::UpdateOne { upsert, .. }
            | BulkOperation::UpdateMany { upsert, .. }
            | BulkOperation::ReplaceOne { upsert, .. } => *upsert = true,
            _ => {}
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BulkOperation::InsertOne(_) => "insert_one",
            BulkOperation::UpdateOne { .. } => "update_one",
            BulkOperation::UpdateMany { .. } => "update_many",
            BulkOperation::ReplaceOne { .. } => "replace_one",
            BulkOperation::DeleteOne { .. } => "delete_one",
            BulkOperation::DeleteMany { .. } => "delete_many",
        }
    }
}

/// Totals of a bulk batch
#[derive(Debug, Clone, Default)]
pub struct BulkWriteSummary {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,
    /// Upserted `_id` by operation index
    pub upserted_ids: HashMap<usize, Bson>,
    /// Failed operations by index (unordered mode only)
    pub failures: Vec<(usize, RepoError)>,
}

impl BulkWriteSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record_upsert(&mut self, index: usize, id: Option<Bson>) {
        if let Some(id) = id {
            self.upserted_count += 1;
            self.upserted_ids.insert(index, id);
        }
    }
}

impl<T: Entity> Repository<T> {
    /// Run `operations` in order.
    ///
    /// Ordered mode (the default) returns the first error. Unordered mode
    /// returns `Ok` with the failures listed in the summary.
    #[instrument(skip_all, fields(collection = self.name(), operations = operations.len()))]
    pub async fn bulk_write(
        &self,
        operations: Vec<BulkOperation<T>>,
        opts: impl Into<Option<BulkWriteOptions>>,
    ) -> Result<BulkWriteSummary> {
        let (settings, ctx) = split(opts);
        let ordered = settings.ordered.unwrap_or(true);

        let summary = self
            .scope(ctx)
            .run(async {
                let mut summary = BulkWriteSummary::default();
                for (index, operation) in operations.into_iter().enumerate() {
                    let kind = operation.kind();
                    let outcome = self.apply(index, operation, &mut summary).await;
                    if let Err(err) = outcome {
                        if ordered {
                            return Err(err);
                        }
                        warn!(index, operation = kind, error = %err, "Bulk operation failed");
                        summary.failures.push((index, err));
                    }
                }
                Ok(summary)
            })
            .await?;

        debug!(
            inserted = summary.inserted_count,
            matched = summary.matched_count,
            modified = summary.modified_count,
            deleted = summary.deleted_count,
            upserted = summary.upserted_count,
            failed = summary.failures.len(),
            "Bulk write finished"
        );
        Ok(summary)
    }

    async fn apply(
        &self,
        index: usize,
        operation: BulkOperation<T>,
        summary: &mut BulkWriteSummary,
    ) -> Result<()> {
        let collection = self.collection();
        match operation {
            BulkOperation::InsertOne(mut entity) => {
                entity.before_create();
                collection.insert_one(&entity).await?;
                summary.inserted_count += 1;
            }
            BulkOperation::UpdateOne {
                filter,
                update,
                upsert,
            } => {
                let mut options = UpdateOptions::default();
                options.upsert = Some(upsert);
                let result = collection
                    .update_one(filter, update)
                    .with_options(options)
                    .await?;
                summary.matched_count += result.matched_count;
                summary.modified_count += result.modified_count;
                summary.record_upsert(index, result.upserted_id);
            }
            BulkOperation::UpdateMany {
                filter,
                update,
                upsert,
            } => {
                let mut options = UpdateOptions::default();
                options.upsert = Some(upsert);
                let result = collection
                    .update_many(filter, update)
                    .with_options(options)
                    .await?;
                summary.matched_count += result.matched_count;
                summary.modified_count += result.modified_count;
                summary.record_upsert(index, result.upserted_id);
            }
            BulkOperation::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => {
                let mut options = ReplaceOptions::default();
                options.upsert = Some(upsert);
                let result = collection
                    .replace_one(filter, &replacement)
                    .with_options(options)
                    .await?;
                summary.matched_count += result.matched_count;
                summary.modified_count += result.modified_count;
                summary.record_upsert(index, result.upserted_id);
            }
            BulkOperation::DeleteOne { filter } => {
                let result = collection.delete_one(filter).await?;
                summary.deleted_count += result.deleted_count;
            }
            BulkOperation::DeleteMany { filter } => {
                let result = collection.delete_many(filter).await?;
                summary.deleted_count += result.deleted_count;
            }
        }
        Ok(())
    }
}
