//! Generic repository over one collection
//!
//! [`Repository`] wraps a typed driver collection. Every call is bounded by
//! the repository's query timeout and by whatever timeout or cancellation
//! token the caller put in the options.
//!
//! # Example
//!
//! ```ignore
//! use mongorepo::{options::FindOptions, Repository};
//!
//! let users: Repository<User> = Repository::from_alias("default", "app", "users")?;
//!
//! let mut user = User::new("ada@example.com");
//! let id = users.create(&mut user, None).await?;
//!
//! let page = users
//!     .find_list_by_filter(doc! { "active": true }, FindOptions::new().page(1, 20))
//!     .await?;
//! ```

use bson::{doc, oid::ObjectId, Bson, Document};
use futures::TryStreamExt;
use mongodb::{
    options as driver,
    results::{DeleteResult, UpdateResult},
    ClientSession, Collection, Database,
};
use mongorepo_builder::{id_in, UpdateBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::clients::require_client;
use crate::config::RepositoryConfig;
use crate::context::{CallContext, Scope};
use crate::entity::Entity;
use crate::find_result::FindResult;
use crate::options::{
    AggregateOptions, CountOptions, DeleteOptions, DistinctOptions, EstimatedCountOptions,
    FindOneAndUpdateOptions, FindOneOptions, FindOptions, InsertManyOptions, InsertOneOptions,
    OperationOptions, ReplaceOptions, UpdateOptions,
};
use crate::{RepoError, Result};

/// Split optional call options into driver options and call context.
pub(crate) fn split<O: Default>(opts: impl Into<Option<OperationOptions<O>>>) -> (O, CallContext) {
    opts.into().unwrap_or_default().into_parts()
}

fn object_id_of(id: Bson) -> Result<ObjectId> {
    match id {
        Bson::ObjectId(id) => Ok(id),
        other => Err(RepoError::InvalidType(format!(
            "inserted id {} is not an ObjectId",
            other
        ))),
    }
}

/// Repository of `T` documents in one collection
pub struct Repository<T: Entity> {
    collection: Collection<T>,
    config: RepositoryConfig,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Entity> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("namespace", &self.collection.namespace())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(collection: Collection<T>) -> Self {
        Self::with_config(collection, RepositoryConfig::default())
    }

    pub fn with_config(collection: Collection<T>, config: RepositoryConfig) -> Self {
        Self { collection, config }
    }

    pub fn from_database(database: &Database, name: &str) -> Self {
        Self::new(database.collection(name))
    }

    /// Repository on the client registered under `alias`.
    pub fn from_alias(alias: &str, database: &str, name: &str) -> Result<Self> {
        let client = require_client(alias)?;
        Ok(Self::from_database(&client.database(database), name))
    }

    /// Replace the configuration.
    pub fn configure(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Collection name
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub(crate) fn scope(&self, ctx: CallContext) -> Scope {
        Scope::new(self.config.query_timeout, ctx)
    }

    /// Find options with the default sort filled in when none was given.
    pub(crate) fn find_parts(
        &self,
        opts: impl Into<Option<FindOptions>>,
    ) -> (driver::FindOptions, CallContext) {
        let (mut find, ctx) = split(opts);
        if find.sort.is_none() {
            find.sort = self.config.default_sort.clone();
        }
        (find, ctx)
    }

    // ---- create ----

    /// Insert one entity and return its ObjectId.
    ///
    /// `before_create` runs first, so a new entity gets its id client-side.
    pub async fn create(
        &self,
        entity: &mut T,
        opts: impl Into<Option<InsertOneOptions>>,
    ) -> Result<ObjectId> {
        entity.before_create();
        let (insert, ctx) = split(opts);
        let entity = &*entity;
        let result = self
            .scope(ctx)
            .run(async { Ok(self.collection.insert_one(entity).with_options(insert).await?) })
            .await?;
        let id = object_id_of(result.inserted_id)?;
        debug!(collection = self.name(), %id, "Inserted document");
        Ok(id)
    }

    /// Insert many entities and return their ObjectIds in input order.
    #[instrument(skip(self, entities, opts), fields(collection = self.name(), count = entities.len()))]
    pub async fn create_many(
        &self,
        entities: &mut [T],
        opts: impl Into<Option<InsertManyOptions>>,
    ) -> Result<Vec<ObjectId>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        for entity in entities.iter_mut() {
            entity.before_create();
        }
        let (insert, ctx) = split(opts);
        let entities = &*entities;
        let result = self
            .scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .insert_many(entities.iter())
                    .with_options(insert)
                    .await?)
            })
            .await?;

        let mut inserted = result.inserted_ids;
        let mut ids = Vec::with_capacity(entities.len());
        for index in 0..entities.len() {
            let id = inserted.remove(&index).ok_or_else(|| {
                RepoError::Internal(format!("driver returned no id for document {}", index))
            })?;
            ids.push(object_id_of(id)?);
        }
        debug!(inserted = ids.len(), "Inserted documents");
        Ok(ids)
    }

    // ---- count / find ----

    pub async fn count_by_filter(
        &self,
        filter: Document,
        opts: impl Into<Option<CountOptions>>,
    ) -> Result<u64> {
        let (count, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .count_documents(filter)
                    .with_options(count)
                    .await?)
            })
            .await
    }

    /// Estimated count from collection metadata.
    pub async fn count_all(&self, opts: impl Into<Option<EstimatedCountOptions>>) -> Result<u64> {
        let (count, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .estimated_document_count()
                    .with_options(count)
                    .await?)
            })
            .await
    }

    pub async fn find_all(&self, opts: impl Into<Option<FindOptions>>) -> Result<Vec<T>> {
        self.find_list_by_filter(doc! {}, opts).await
    }

    pub async fn find_list_by_filter(
        &self,
        filter: Document,
        opts: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<T>> {
        let (find, ctx) = self.find_parts(opts);
        self.scope(ctx)
            .run(async {
                let cursor = self.collection.find(filter).with_options(find).await?;
                Ok(cursor.try_collect().await?)
            })
            .await
    }

    /// Open a cursor and hand it back unconsumed.
    ///
    /// An error opening the cursor is stored in the result, not returned.
    pub async fn find_list_result_by_filter(
        &self,
        filter: Document,
        opts: impl Into<Option<FindOptions>>,
    ) -> FindResult<T> {
        let (find, ctx) = self.find_parts(opts);
        let scope = self.scope(ctx);
        let cursor = scope
            .run(async { Ok(self.collection.find(filter).with_options(find).await?) })
            .await;
        FindResult::new(cursor, scope)
    }

    pub async fn find_list_by_object_ids(
        &self,
        ids: &[ObjectId],
        opts: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<T>> {
        self.find_list_by_filter(id_in(ids.iter().copied()), opts)
            .await
    }

    pub async fn find_one(
        &self,
        filter: Document,
        opts: impl Into<Option<FindOneOptions>>,
    ) -> Result<Option<T>> {
        let (find, ctx) = split(opts);
        self.scope(ctx)
            .run(async { Ok(self.collection.find_one(filter).with_options(find).await?) })
            .await
    }

    pub async fn find_one_by_object_id(
        &self,
        id: ObjectId,
        opts: impl Into<Option<FindOneOptions>>,
    ) -> Result<Option<T>> {
        self.find_one(doc! { "_id": id }, opts).await
    }

    /// Like [`find_one_by_object_id`](Self::find_one_by_object_id), but a
    /// missing document is `RepoError::NotFound`.
    pub async fn get_by_object_id(&self, id: ObjectId) -> Result<T> {
        self.find_one_by_object_id(id, None).await?.ok_or_else(|| {
            RepoError::NotFound(format!("no document with _id {} in {}", id, self.name()))
        })
    }

    pub async fn distinct(
        &self,
        field: &str,
        filter: Document,
        opts: impl Into<Option<DistinctOptions>>,
    ) -> Result<Vec<Bson>> {
        let (distinct, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .distinct(field, filter)
                    .with_options(distinct)
                    .await?)
            })
            .await
    }

    // ---- update ----

    /// `$set` every field of `entity` on the document with the same `_id`.
    ///
    /// `before_update` runs first. Upsert is off unless the options turn it
    /// on. Returns the document as the options ask for (before the update
    /// by default), or `None` when nothing matched.
    pub async fn find_one_and_update(
        &self,
        entity: &mut T,
        opts: impl Into<Option<FindOneAndUpdateOptions>>,
    ) -> Result<Option<T>> {
        let id = entity.object_id().ok_or_else(|| {
            RepoError::Validation(format!(
                "cannot update a {} document without an _id",
                self.name()
            ))
        })?;
        entity.before_update();
        let mut fields = entity.to_bson()?;
        fields.remove("_id");
        let update = UpdateBuilder::set_document(fields).build();
        self.find_one_and_update_by_id(id, update, opts).await
    }

    pub async fn find_one_and_update_by_id(
        &self,
        id: ObjectId,
        update: Document,
        opts: impl Into<Option<FindOneAndUpdateOptions>>,
    ) -> Result<Option<T>> {
        let (mut find_update, ctx) = split(opts);
        find_update.upsert.get_or_insert(false);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .find_one_and_update(doc! { "_id": id }, update)
                    .with_options(find_update)
                    .await?)
            })
            .await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        opts: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult> {
        let (update_opts, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .update_one(filter, update)
                    .with_options(update_opts)
                    .await?)
            })
            .await
    }

    #[instrument(skip_all, fields(collection = self.name()))]
    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        opts: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult> {
        let (update_opts, ctx) = split(opts);
        let result = self
            .scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .update_many(filter, update)
                    .with_options(update_opts)
                    .await?)
            })
            .await?;
        debug!(
            matched = result.matched_count,
            modified = result.modified_count,
            "Updated documents"
        );
        Ok(result)
    }

    // ---- replace ----

    pub async fn replace(
        &self,
        filter: Document,
        replacement: &T,
        opts: impl Into<Option<ReplaceOptions>>,
    ) -> Result<UpdateResult> {
        let (replace, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .replace_one(filter, replacement)
                    .with_options(replace)
                    .await?)
            })
            .await
    }

    pub async fn replace_by_id(
        &self,
        id: ObjectId,
        replacement: &T,
        opts: impl Into<Option<ReplaceOptions>>,
    ) -> Result<UpdateResult> {
        self.replace(doc! { "_id": id }, replacement, opts).await
    }

    // ---- delete ----

    pub async fn delete_one(
        &self,
        id: ObjectId,
        opts: impl Into<Option<DeleteOptions>>,
    ) -> Result<DeleteResult> {
        self.delete_one_by_filter(doc! { "_id": id }, opts).await
    }

    pub async fn delete_one_by_filter(
        &self,
        filter: Document,
        opts: impl Into<Option<DeleteOptions>>,
    ) -> Result<DeleteResult> {
        let (delete, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .delete_one(filter)
                    .with_options(delete)
                    .await?)
            })
            .await
    }

    /// Delete every matching document. An empty filter deletes them all.
    #[instrument(skip_all, fields(collection = self.name()))]
    pub async fn delete_many(
        &self,
        filter: Document,
        opts: impl Into<Option<DeleteOptions>>,
    ) -> Result<DeleteResult> {
        let (delete, ctx) = split(opts);
        let result = self
            .scope(ctx)
            .run(async {
                Ok(self
                    .collection
                    .delete_many(filter)
                    .with_options(delete)
                    .await?)
            })
            .await?;
        debug!(deleted = result.deleted_count, "Deleted documents");
        Ok(result)
    }

    // ---- aggregate ----

    /// Run a pipeline and decode every output document as `U`.
    pub async fn aggregate<U>(
        &self,
        pipeline: Vec<Document>,
        opts: impl Into<Option<AggregateOptions>>,
    ) -> Result<Vec<U>>
    where
        U: DeserializeOwned + Unpin + Send + Sync,
    {
        let (aggregate, ctx) = split(opts);
        self.scope(ctx)
            .run(async {
                let cursor = self
                    .collection
                    .aggregate(pipeline)
                    .with_options(aggregate)
                    .with_type::<U>()
                    .await?;
                Ok(cursor.try_collect().await?)
            })
            .await
    }

    // ---- session-bound ----
    //
    // For use inside `run_transaction`; the repository query timeout still
    // applies to each call.

    pub async fn create_in_session(
        &self,
        entity: &mut T,
        session: &mut ClientSession,
    ) -> Result<ObjectId> {
        entity.before_create();
        let entity = &*entity;
        let result = self
            .scope(CallContext::default())
            .run(async {
                Ok(self
                    .collection
                    .insert_one(entity)
                    .session(&mut *session)
                    .await?)
            })
            .await?;
        object_id_of(result.inserted_id)
    }

    pub async fn find_one_in_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Option<T>> {
        self.scope(CallContext::default())
            .run(async {
                Ok(self
                    .collection
                    .find_one(filter)
                    .session(&mut *session)
                    .await?)
            })
            .await
    }

    pub async fn update_one_in_session(
        &self,
        filter: Document,
        update: Document,
        session: &mut ClientSession,
    ) -> Result<UpdateResult> {
        self.scope(CallContext::default())
            .run(async {
                Ok(self
                    .collection
                    .update_one(filter, update)
                    .session(&mut *session)
                    .await?)
            })
            .await
    }

    pub async fn replace_in_session(
        &self,
        filter: Document,
        replacement: &T,
        session: &mut ClientSession,
    ) -> Result<UpdateResult> {
        self.scope(CallContext::default())
            .run(async {
                Ok(self
                    .collection
                    .replace_one(filter, replacement)
                    .session(&mut *session)
                    .await?)
            })
            .await
    }

    pub async fn delete_one_by_filter_in_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<DeleteResult> {
        self.scope(CallContext::default())
            .run(async {
                Ok(self
                    .collection
                    .delete_one(filter)
                    .session(&mut *session)
                    .await?)
            })
            .await
    }
}
