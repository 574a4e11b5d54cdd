//! Integration tests for Repository operations.
//!
//! These tests require a running MongoDB server. Set MONGODB_URI to enable
//! them, e.g. `MONGODB_URI=mongodb://localhost:27017`; without it every test
//! returns early.
//!
//! Run with: cargo test -p mongorepo --test test_repository

use bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mongorepo::builder::{FilterBuilder, UpdateBuilder};
use mongorepo::options::{BulkWriteOptions, FindOneAndUpdateOptions, FindOptions, UpdateOptions};
use mongorepo::{
    codec, typed, BulkOperation, ClientConfig, Connection, Entity, EntityBase, IndexSpec,
    RepoError, Repository, RepositoryConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    #[serde(flatten)]
    base: EntityBase,
    sku: String,
    name: String,
    price: i64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(with = "codec::uuid_as_binary")]
    batch: Uuid,
}

impl Product {
    fn new(sku: &str, price: i64) -> Self {
        Self {
            base: EntityBase::default(),
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            price,
            tags: Vec::new(),
            batch: Uuid::new_v4(),
        }
    }
}

impl Entity for Product {
    fn object_id(&self) -> Option<ObjectId> {
        self.base.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.base.id = Some(id);
    }
}

#[derive(Debug, Deserialize)]
struct SkuOnly {
    sku: String,
}

/// Helper to get the server URI, or None to skip
fn mongodb_uri() -> Option<String> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    std::env::var("MONGODB_URI").ok()
}

/// Helper to create a repository on a fresh collection
async fn setup_repository(uri: &str, prefix: &str) -> Repository<Product> {
    let conn = Connection::new(uri, &ClientConfig::default())
        .await
        .expect("connect");
    let name = format!("{}_{}", prefix, ObjectId::new().to_hex());
    Repository::from_database(&conn.database("mongorepo_test"), &name)
}

/// Helper to drop the test collection
async fn cleanup(repo: &Repository<Product>) {
    let _ = repo.collection().drop().await;
}

// =============================================================================
// Create / Find Tests
// =============================================================================

#[tokio::test]
async fn test_create_and_find_by_id() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "create").await;

    let mut product = Product::new("A-1", 100);
    let id = repo.create(&mut product, None).await.unwrap();
    assert_eq!(product.object_id(), Some(id));

    let found = repo.find_one_by_object_id(id, None).await.unwrap().unwrap();
    assert_eq!(found, product);

    let missing = repo.find_one_by_object_id(ObjectId::new(), None).await.unwrap();
    assert!(missing.is_none());
    let err = repo.get_by_object_id(ObjectId::new()).await.unwrap_err();
    assert!(err.is_not_found());

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_create_many_keeps_input_order() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "create_many").await;

    let mut products = vec![
        Product::new("B-1", 10),
        Product::new("B-2", 20),
        Product::new("B-3", 30),
    ];
    let ids = repo.create_many(&mut products, None).await.unwrap();
    assert_eq!(ids.len(), 3);
    for (product, id) in products.iter().zip(&ids) {
        assert_eq!(product.object_id(), Some(*id));
    }

    let listed = repo.find_list_by_object_ids(&ids[..2], None).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(repo.count_by_filter(doc! {}, None).await.unwrap(), 3);

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_find_with_paging_sort_and_default_sort() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "paging")
        .await
        .configure(RepositoryConfig::new().default_sort(doc! { "price": -1 }));

    let mut products: Vec<Product> = (1..=7).map(|i| Product::new(&format!("P-{}", i), i * 10)).collect();
    repo.create_many(&mut products, None).await.unwrap();

    // default sort: price descending
    let all = repo.find_all(None).await.unwrap();
    assert_eq!(all.first().map(|p| p.price), Some(70));

    // explicit sort wins, page 2 of size 3
    let page = repo
        .find_list_by_filter(doc! {}, FindOptions::new().sort_by("price", true).page(2, 3))
        .await
        .unwrap();
    let prices: Vec<i64> = page.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![40, 50, 60]);

    let filter = FilterBuilder::new().gte("price", 30).lt("price", 60).build();
    assert_eq!(repo.count_by_filter(filter, None).await.unwrap(), 3);

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_find_result_is_lazy() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "find_result").await;

    let mut products = vec![Product::new("C-1", 1), Product::new("C-2", 2)];
    repo.create_many(&mut products, None).await.unwrap();

    let mut result = repo
        .find_list_result_by_filter(doc! {}, FindOptions::new().sort_by("price", true))
        .await;
    assert!(result.is_ok());
    assert_eq!(result.one().await.unwrap().map(|p| p.sku), Some("C-1".to_string()));
    assert_eq!(result.one().await.unwrap().map(|p| p.sku), Some("C-2".to_string()));
    assert!(result.one().await.unwrap().is_none());

    let bad = repo
        .find_list_result_by_filter(doc! { "price": { "$bogus": 1 } }, None)
        .await;
    assert!(bad.error().is_some());
    assert!(bad.all().await.is_err());

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_typed_finders_and_distinct() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "typed").await;

    let mut products = vec![Product::new("D-1", 5), Product::new("D-2", 5)];
    let ids = repo.create_many(&mut products, None).await.unwrap();

    let skus: Vec<SkuOnly> = typed::find_all_t(&repo, FindOptions::new().fields(["sku"]))
        .await
        .unwrap();
    assert_eq!(skus.len(), 2);

    let one: Option<SkuOnly> = typed::find_t_by_object_id(&repo, ids[1], None).await.unwrap();
    assert_eq!(one.map(|s| s.sku), Some("D-2".to_string()));

    let none: Option<SkuOnly> = typed::find_one_t_by_filter(&repo, doc! { "sku": "nope" }, None)
        .await
        .unwrap();
    assert!(none.is_none());

    let listed: Vec<SkuOnly> = typed::find_t_list_by_object_ids(&repo, &ids, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);

    let prices = repo.distinct("price", doc! {}, None).await.unwrap();
    assert_eq!(prices.len(), 1);

    cleanup(&repo).await;
}

// =============================================================================
// Update / Replace / Delete Tests
// =============================================================================

#[tokio::test]
async fn test_find_one_and_update_entity() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "foau").await;

    let mut product = Product::new("E-1", 10);
    repo.create(&mut product, None).await.unwrap();

    product.price = 99;
    let after = repo
        .find_one_and_update(&mut product, FindOneAndUpdateOptions::new().return_document_after())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.price, 99);

    // no upsert by default
    let mut ghost = Product::new("E-2", 1);
    ghost.set_object_id(ObjectId::new());
    assert!(repo.find_one_and_update(&mut ghost, None).await.unwrap().is_none());
    assert_eq!(repo.count_by_filter(doc! {}, None).await.unwrap(), 1);

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_update_replace_delete() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "update").await;

    let mut products = vec![Product::new("F-1", 1), Product::new("F-2", 2)];
    let ids = repo.create_many(&mut products, None).await.unwrap();

    let update = UpdateBuilder::new()
        .add_to_set("tags", "sale")
        .last_modifier_id("tester")
        .build();
    let result = repo.update_many(doc! {}, update, None).await.unwrap();
    assert_eq!(result.modified_count, 2);

    let result = repo
        .update_one(
            doc! { "sku": "F-9" },
            UpdateBuilder::new().set_field("price", 9).build(),
            UpdateOptions::new().upsert(true),
        )
        .await
        .unwrap();
    assert!(result.upserted_id.is_some());

    let mut replacement = Product::new("F-1", 111);
    replacement.set_object_id(ids[0]);
    let result = repo.replace_by_id(ids[0], &replacement, None).await.unwrap();
    assert_eq!(result.matched_count, 1);

    let result = repo.delete_one(ids[1], None).await.unwrap();
    assert_eq!(result.deleted_count, 1);

    let result = repo.delete_many(doc! {}, None).await.unwrap();
    assert_eq!(result.deleted_count, 2);

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_aggregate() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "aggregate").await;

    let mut products = vec![Product::new("G-1", 10), Product::new("G-2", 32)];
    repo.create_many(&mut products, None).await.unwrap();

    let totals: Vec<Document> = repo
        .aggregate(
            vec![doc! { "$group": { "_id": Bson::Null, "total": { "$sum": "$price" } } }],
            None,
        )
        .await
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].get_i64("total").unwrap(), 42);

    cleanup(&repo).await;
}

// =============================================================================
// Index / Bulk Tests
// =============================================================================

#[tokio::test]
async fn test_index_helpers() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "index").await;

    // collection does not exist yet
    assert!(!repo.exist_index("sku_unique").await.unwrap());

    let models = vec![
        IndexSpec::new().asc("sku").name("sku_unique").unique(true).build(),
        IndexSpec::new().desc("price").name("price_desc").build(),
    ];
    let created = repo.create_indexes(models.clone(), None).await.unwrap();
    assert_eq!(created.len(), 2);
    assert!(repo.exist_index("sku_unique").await.unwrap());

    // already there
    let created = repo.create_indexes(models, None).await.unwrap();
    assert!(created.is_empty());

    let mut dup = Product::new("H-1", 1);
    repo.create(&mut dup, None).await.unwrap();
    let mut dup2 = Product::new("H-1", 2);
    assert!(matches!(repo.create(&mut dup2, None).await, Err(RepoError::MongoDB(_))));

    repo.delete_index("price_desc").await.unwrap();
    assert!(!repo.exist_index("price_desc").await.unwrap());
    repo.delete_all_indexes().await.unwrap();
    assert_eq!(repo.list_index_names().await.unwrap(), vec!["_id_".to_string()]);

    cleanup(&repo).await;
}

#[tokio::test]
async fn test_bulk_write_ordered_and_unordered() {
    let Some(uri) = mongodb_uri() else { return };
    let repo = setup_repository(&uri, "bulk").await;
    repo.create_index(IndexSpec::new().asc("sku").unique(true).build(), None)
        .await
        .unwrap();

    let summary = repo
        .bulk_write(
            vec![
                BulkOperation::insert_one(Product::new("J-1", 1)),
                BulkOperation::insert_one(Product::new("J-2", 2)),
                BulkOperation::update_one(doc! { "sku": "J-1" }, doc! { "$set": { "price": 10 } }),
                BulkOperation::update_one(doc! { "sku": "J-3" }, doc! { "$set": { "price": 3 } })
                    .upsert(),
                BulkOperation::delete_one(doc! { "sku": "J-2" }),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(summary.inserted_count, 2);
    assert_eq!(summary.modified_count, 1);
    assert_eq!(summary.upserted_count, 1);
    assert!(summary.upserted_ids.contains_key(&3));
    assert_eq!(summary.deleted_count, 1);

    // ordered: duplicate key stops the batch
    let err = repo
        .bulk_write(
            vec![
                BulkOperation::insert_one(Product::new("J-1", 1)),
                BulkOperation::insert_one(Product::new("J-4", 4)),
            ],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::MongoDB(_)));
    assert_eq!(repo.count_by_filter(doc! { "sku": "J-4" }, None).await.unwrap(), 0);

    // unordered: failure recorded, rest applied
    let summary = repo
        .bulk_write(
            vec![
                BulkOperation::insert_one(Product::new("J-1", 1)),
                BulkOperation::insert_one(Product::new("J-5", 5)),
            ],
            BulkWriteOptions::new().ordered(false),
        )
        .await
        .unwrap();
    assert_eq!(summary.inserted_count, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, 0);

    cleanup(&repo).await;
}
