//! Entity trait for documents stored through a [`Repository`](crate::Repository)
//!
//! Any serde type can be stored. Implementing [`Entity`] tells the repository
//! where the `_id` lives and gives hooks that run before create and update.
//!
//! # Example
//!
//! ```ignore
//! use bson::oid::ObjectId;
//! use serde::{Deserialize, Serialize};
//! use mongorepo::Entity;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     id: Option<ObjectId>,
//!     email: String,
//! }
//!
//! impl Entity for User {
//!     fn object_id(&self) -> Option<ObjectId> {
//!         self.id
//!     }
//!
//!     fn set_object_id(&mut self, id: ObjectId) {
//!         self.id = Some(id);
//!     }
//! }
//! ```

use bson::{oid::ObjectId, Bson, Document};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::Result;

/// A document type a repository can store
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin {
    /// The document's `_id`, if it has one
    fn object_id(&self) -> Option<ObjectId>;

    fn set_object_id(&mut self, id: ObjectId);

    /// Runs before the entity is inserted. Assigns a fresh ObjectId when none
    /// is set, so the id is known before the round trip.
    fn before_create(&mut self) {
        if self.object_id().is_none() {
            self.set_object_id(ObjectId::new());
        }
    }

    /// Runs before the entity is written by `find_one_and_update`.
    fn before_update(&mut self) {}

    /// Convert to a BSON document
    fn to_bson(&self) -> Result<Document> {
        Ok(bson::to_document(self)?)
    }

    /// Create from a BSON document
    fn from_bson(doc: Document) -> Result<Self> {
        Ok(bson::from_document(doc)?)
    }
}

/// Embeddable `_id` holder.
///
/// Flatten it into an entity struct and delegate the id accessors to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBase {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
}

impl EntityBase {
    pub fn new(id: ObjectId) -> Self {
        Self { id: Some(id) }
    }
}

impl Entity for EntityBase {
    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

impl Entity for Document {
    fn object_id(&self) -> Option<ObjectId> {
        match self.get("_id") {
            Some(Bson::ObjectId(id)) => Some(*id),
            _ => None,
        }
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.insert("_id", id);
    }

    // A document whose `_id` is some other type keeps it.
    fn before_create(&mut self) {
        if !self.contains_key("_id") {
            self.set_object_id(ObjectId::new());
        }
    }

    fn to_bson(&self) -> Result<Document> {
        Ok(self.clone())
    }

    fn from_bson(doc: Document) -> Result<Self> {
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[derive(Debug, Serialize, Deserialize)]
    struct Article {
        #[serde(flatten)]
        base: EntityBase,
        title: String,
        #[serde(skip)]
        touched: bool,
    }

    impl Entity for Article {
        fn object_id(&self) -> Option<ObjectId> {
            self.base.id
        }

        fn set_object_id(&mut self, id: ObjectId) {
            self.base.id = Some(id);
        }

        fn before_update(&mut self) {
            self.touched = true;
        }
    }

    #[test]
    fn test_before_create_assigns_id() {
        let mut article = Article {
            base: EntityBase::default(),
            title: "hello".to_string(),
            touched: false,
        };
        article.before_create();
        assert!(article.object_id().is_some());
    }

    #[test]
    fn test_before_create_keeps_existing_id() {
        let id = ObjectId::new();
        let mut article = Article {
            base: EntityBase::new(id),
            title: "hello".to_string(),
            touched: false,
        };
        article.before_create();
        assert_eq!(article.object_id(), Some(id));
    }

    #[test]
    fn test_to_bson_flattens_base() {
        let id = ObjectId::new();
        let article = Article {
            base: EntityBase::new(id),
            title: "hello".to_string(),
            touched: true,
        };
        let doc = article.to_bson().unwrap();
        assert_eq!(doc, doc! { "_id": id, "title": "hello" });

        let back = Article::from_bson(doc).unwrap();
        assert_eq!(back.object_id(), Some(id));
        assert!(!back.touched);
    }

    #[test]
    fn test_base_without_id_omits_field() {
        let doc = EntityBase::default().to_bson().unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_document_entity() {
        let mut doc = doc! { "name": "x" };
        assert!(Entity::object_id(&doc).is_none());
        doc.before_create();
        assert!(Entity::object_id(&doc).is_some());

        let mut custom = doc! { "_id": "sku-1" };
        custom.before_create();
        assert_eq!(custom.get_str("_id").unwrap(), "sku-1");
        assert!(Entity::object_id(&custom).is_none());
    }
}
