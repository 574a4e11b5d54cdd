//! BSON builders for mongorepo
//!
//! Small helpers that produce the filter and update documents handed to the
//! MongoDB driver. Nothing here talks to a server.
//!
//! # Features
//! - Operator names (`$eq`, `$in`, `$set`, ...) as a typed enum
//! - Fluent filter builder plus free functions for common filter shapes
//! - Update builder for `$set` / `$unset` / array operators with audit fields

pub mod filter;
pub mod op;
pub mod update;
pub mod util;

pub use filter::{append_exists, id_in, or_push, regex, regex_to, FilterBuilder};
pub use op::Op;
pub use update::UpdateBuilder;
pub use util::into_map;
