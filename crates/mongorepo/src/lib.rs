//! Repository layer for the MongoDB driver
//!
//! This crate wraps the official `mongodb` driver with the pieces most
//! services end up writing themselves.
//!
//! # Features
//! - Client registry keyed by alias, configurable from YAML or JSON
//! - Generic `Repository<T>` with per-call timeouts and cancellation
//! - Option builders for paging, sorting and projections
//! - Index helpers and ordered/unordered bulk writes
//! - Transactions retried on `TransientTransactionError`
//! - UUID fields stored as BSON binary subtype 4
//!
//! ```ignore
//! use mongorepo::{clients, ClientConfig, Repository};
//!
//! clients::setup_default_client("mongodb://localhost:27017", &ClientConfig::default()).await?;
//! let users: Repository<User> = Repository::from_alias(clients::DEFAULT_ALIAS, "app", "users")?;
//! let active = users.find_list_by_filter(doc! { "active": true }, None).await?;
//! ```

pub mod bulk;
pub mod clients;
pub mod codec;
pub mod config;
pub mod connection;
pub mod context;
pub mod entity;
pub mod error;
pub mod find_result;
pub mod index;
pub mod options;
pub mod repository;
pub mod transaction;
pub mod typed;

pub use mongorepo_builder as builder;

pub use bulk::{BulkOperation, BulkWriteSummary};
pub use config::{ClientConfig, ClientSettings, MongoSettings, RepositoryConfig};
pub use connection::{create_client, create_client_with, Connection};
pub use context::CallContext;
pub use entity::{Entity, EntityBase};
pub use error::{RepoError, Result};
pub use find_result::FindResult;
pub use index::IndexSpec;
pub use repository::Repository;
pub use transaction::{
    execute_transaction, run_transaction, run_transaction_on, run_transaction_with_result,
    TransactionConfig, TransactionSession,
};
