//! Index helpers on [`Repository`]

use std::time::Duration;

use bson::{Bson, Document};
use futures::TryStreamExt;
use mongodb::{
    error::ErrorKind,
    options::IndexOptions as DriverIndexOptions,
    IndexModel,
};
use tracing::{debug, info, warn};

use crate::context::CallContext;
use crate::entity::Entity;
use crate::options::CreateIndexOptions;
use crate::repository::{split, Repository};
use crate::{RepoError, Result};

/// Server error code for a collection that does not exist
const NAMESPACE_NOT_FOUND: i32 = 26;

fn is_namespace_not_found(err: &RepoError) -> bool {
    match err {
        RepoError::MongoDB(err) => matches!(
            err.kind.as_ref(),
            ErrorKind::Command(command) if command.code == NAMESPACE_NOT_FOUND
        ),
        _ => false,
    }
}

/// Builder for an [`IndexModel`]
///
/// ```ignore
/// let model = IndexSpec::new()
///     .asc("tenantId")
///     .desc("createdAt")
///     .name("tenant_created")
///     .unique(true)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexSpec {
    keys: Document,
    options: DriverIndexOptions,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, field: &str) -> Self {
        self.keys.insert(field, 1);
        self
    }

    pub fn desc(mut self, field: &str) -> Self {
        self.keys.insert(field, -1);
        self
    }

    /// Full-text key
    pub fn text(mut self, field: &str) -> Self {
        self.keys.insert(field, "text");
        self
    }

    /// Any other key type (`"2dsphere"`, `"hashed"`, ...)
    pub fn key(mut self, field: &str, kind: impl Into<Bson>) -> Self {
        self.keys.insert(field, kind.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.options.unique = Some(unique);
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.options.sparse = Some(sparse);
        self
    }

    /// TTL: documents expire this long after the indexed date.
    pub fn expire_after(mut self, ttl: Duration) -> Self {
        self.options.expire_after = Some(ttl);
        self
    }

    pub fn build(self) -> IndexModel {
        IndexModel::builder()
            .keys(self.keys)
            .options(self.options)
            .build()
    }
}

impl From<IndexSpec> for IndexModel {
    fn from(spec: IndexSpec) -> Self {
        spec.build()
    }
}

fn index_name(model: &IndexModel) -> Option<&str> {
    model.options.as_ref().and_then(|opts| opts.name.as_deref())
}

impl<T: Entity> Repository<T> {
    /// Create one index and return its name.
    pub async fn create_index(
        &self,
        model: IndexModel,
        opts: impl Into<Option<CreateIndexOptions>>,
    ) -> Result<String> {
        let (create, ctx) = split(opts);
        let result = self
            .scope(ctx)
            .run(async {
                Ok(self
                    .collection()
                    .create_index(model)
                    .with_options(create)
                    .await?)
            })
            .await?;
        info!(collection = self.name(), index = %result.index_name, "Created index");
        Ok(result.index_name)
    }

    /// Create the indexes that do not exist yet.
    ///
    /// A model whose name matches an existing index is skipped; unnamed
    /// models are always sent. Returns the names the server reports for the
    /// created indexes, or an empty list when nothing was left to create.
    pub async fn create_indexes(
        &self,
        models: Vec<IndexModel>,
        opts: impl Into<Option<CreateIndexOptions>>,
    ) -> Result<Vec<String>> {
        let existing = self.list_index_names().await?;
        let missing: Vec<IndexModel> = models
            .into_iter()
            .filter(|model| match index_name(model) {
                Some(name) => !existing.iter().any(|e| e == name),
                None => true,
            })
            .collect();
        if missing.is_empty() {
            debug!(collection = self.name(), "All indexes already exist");
            return Ok(Vec::new());
        }

        let (create, ctx) = split(opts);
        let result = self
            .scope(ctx)
            .run(async {
                Ok(self
                    .collection()
                    .create_indexes(missing)
                    .with_options(create)
                    .await?)
            })
            .await?;
        info!(
            collection = self.name(),
            indexes = ?result.index_names,
            "Created indexes"
        );
        Ok(result.index_names)
    }

    /// Create an index at startup, logging instead of failing.
    pub async fn ensure_index(&self, model: IndexModel) {
        if let Err(err) = self.create_index(model, None).await {
            warn!(collection = self.name(), error = %err, "Failed to create index");
        }
    }

    /// [`create_indexes`](Self::create_indexes), logging instead of failing.
    pub async fn ensure_indexes(&self, models: Vec<IndexModel>) {
        if let Err(err) = self.create_indexes(models, None).await {
            warn!(collection = self.name(), error = %err, "Failed to create indexes");
        }
    }

    pub async fn delete_index(&self, name: &str) -> Result<()> {
        self.scope(CallContext::default())
            .run(async { Ok(self.collection().drop_index(name).await?) })
            .await?;
        info!(collection = self.name(), index = name, "Dropped index");
        Ok(())
    }

    /// Drop every index except `_id_`.
    pub async fn delete_all_indexes(&self) -> Result<()> {
        self.scope(CallContext::default())
            .run(async { Ok(self.collection().drop_indexes().await?) })
            .await?;
        info!(collection = self.name(), "Dropped all indexes");
        Ok(())
    }

    /// Indexes on the collection. A collection that does not exist yet has none.
    pub async fn list_indexes(&self) -> Result<Vec<IndexModel>> {
        let listed = self
            .scope(CallContext::default())
            .run(async {
                let cursor = self.collection().list_indexes().await?;
                Ok(cursor.try_collect().await?)
            })
            .await;
        match listed {
            Err(err) if is_namespace_not_found(&err) => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn list_index_names(&self) -> Result<Vec<String>> {
        let listed = self
            .scope(CallContext::default())
            .run(async { Ok(self.collection().list_index_names().await?) })
            .await;
        match listed {
            Err(err) if is_namespace_not_found(&err) => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn exist_index(&self, name: &str) -> Result<bool> {
        Ok(self.list_index_names().await?.iter().any(|n| n == name))
    }
}
