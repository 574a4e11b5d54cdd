//! Finders that decode into a type other than the repository's entity
//!
//! Handy for projections: query a `Repository<User>` with
//! `FindOptions::new().fields(["name"])` and decode into a `UserName` struct.

use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongorepo_builder::id_in;
use serde::de::DeserializeOwned;

use crate::entity::Entity;
use crate::options::{FindOneOptions, FindOptions};
use crate::repository::{split, Repository};
use crate::Result;

/// `_id` lookup decoded as `U`. Missing document is `Ok(None)`.
pub async fn find_t_by_object_id<U, T>(
    repository: &Repository<T>,
    id: ObjectId,
    opts: impl Into<Option<FindOneOptions>>,
) -> Result<Option<U>>
where
    U: DeserializeOwned + Send + Sync,
    T: Entity,
{
    find_one_t_by_filter(repository, doc! { "_id": id }, opts).await
}

pub async fn find_one_t_by_filter<U, T>(
    repository: &Repository<T>,
    filter: Document,
    opts: impl Into<Option<FindOneOptions>>,
) -> Result<Option<U>>
where
    U: DeserializeOwned + Send + Sync,
    T: Entity,
{
    let (find, ctx) = split(opts);
    let collection = repository.collection().clone_with_type::<U>();
    repository
        .scope(ctx)
        .run(async { Ok(collection.find_one(filter).with_options(find).await?) })
        .await
}

pub async fn find_all_t<U, T>(
    repository: &Repository<T>,
    opts: impl Into<Option<FindOptions>>,
) -> Result<Vec<U>>
where
    U: DeserializeOwned + Unpin + Send + Sync,
    T: Entity,
{
    find_t_by_filter(repository, doc! {}, opts).await
}

pub async fn find_t_by_filter<U, T>(
    repository: &Repository<T>,
    filter: Document,
    opts: impl Into<Option<FindOptions>>,
) -> Result<Vec<U>>
where
    U: DeserializeOwned + Unpin + Send + Sync,
    T: Entity,
{
    let (find, ctx) = repository.find_parts(opts);
    let collection = repository.collection().clone_with_type::<U>();
    repository
        .scope(ctx)
        .run(async {
            let cursor = collection.find(filter).with_options(find).await?;
            Ok(cursor.try_collect().await?)
        })
        .await
}

pub async fn find_t_list_by_object_ids<U, T>(
    repository: &Repository<T>,
    ids: &[ObjectId],
    opts: impl Into<Option<FindOptions>>,
) -> Result<Vec<U>>
where
    U: DeserializeOwned + Unpin + Send + Sync,
    T: Entity,
{
    find_t_by_filter(repository, id_in(ids.iter().copied()), opts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::connection::Connection;
    use crate::RepoError;
    use serde::Deserialize;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Deserialize)]
    struct Summary {
        #[allow(dead_code)]
        title: String,
    }

    #[tokio::test]
    async fn test_typed_finder_honours_cancellation() {
        let conn = Connection::new("mongodb://localhost:27017", &ClientConfig::default())
            .await
            .unwrap();
        let repo: Repository<Document> = Repository::from_database(&conn.database("app"), "posts");
        let token = CancellationToken::new();
        token.cancel();

        let err = find_t_by_filter::<Summary, _>(
            &repo,
            doc! {},
            FindOptions::new().cancellation(token.clone()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Cancelled(_)));

        let err = find_t_by_object_id::<Summary, _>(
            &repo,
            ObjectId::new(),
            FindOneOptions::new().cancellation(token),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Cancelled(_)));
    }
}
