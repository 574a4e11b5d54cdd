//! Update document builder

use bson::{Bson, DateTime, Document};
use serde::Serialize;

use crate::op::Op;

/// Field stamped by [`UpdateBuilder::last_modification_time`].
pub const LAST_MODIFICATION_TIME: &str = "lastModificationTime";
/// Field stamped by [`UpdateBuilder::last_modifier_id`].
pub const LAST_MODIFIER_ID: &str = "lastModifierId";

/// Builds update documents such as `{$set: {...}, $unset: {...}}`.
///
/// # Example
///
/// ```
/// use mongorepo_builder::UpdateBuilder;
/// use bson::doc;
///
/// let update = UpdateBuilder::new()
///     .set_field("status", "archived")
///     .unset(["draft"])
///     .build();
///
/// assert_eq!(update, doc! { "$set": { "status": "archived" }, "$unset": { "draft": "" } });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBuilder {
    doc: Document,
}

impl UpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{$set: doc}`, replacing whatever `$set` held before.
    pub fn set_document(doc: Document) -> Self {
        Self::new().with_set(doc)
    }

    /// `{$set: value}` where `value` is serialized to a document first.
    pub fn set_value<T: Serialize>(value: &T) -> Result<Self, bson::ser::Error> {
        Ok(Self::set_document(bson::to_document(value)?))
    }

    /// Replaces the `$set` document.
    pub fn with_set(mut self, doc: Document) -> Self {
        self.doc.insert(Op::Set.as_str(), doc);
        self
    }

    /// Adds one field to `$set`.
    pub fn set_field(self, field: &str, value: impl Into<Bson>) -> Self {
        self.field(Op::Set, field, value.into())
    }

    /// `{$unset: {field: ""}}` for every field.
    pub fn unset<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            self = self.field(Op::Unset, field.as_ref(), Bson::String(String::new()));
        }
        self
    }

    pub fn inc(self, field: &str, amount: impl Into<Bson>) -> Self {
        self.field(Op::Inc, field, amount.into())
    }

    pub fn push(self, field: &str, value: impl Into<Bson>) -> Self {
        self.field(Op::Push, field, value.into())
    }

    pub fn add_to_set(self, field: &str, value: impl Into<Bson>) -> Self {
        self.field(Op::AddToSet, field, value.into())
    }

    pub fn pull(self, field: &str, condition: impl Into<Bson>) -> Self {
        self.field(Op::Pull, field, condition.into())
    }

    pub fn pull_all<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.field(Op::PullAll, field, Bson::Array(values))
    }

    /// Removes the first (`first = true`, `-1`) or last (`1`) array element.
    pub fn pop(self, field: &str, first: bool) -> Self {
        self.field(Op::Pop, field, Bson::Int32(if first { -1 } else { 1 }))
    }

    /// Sets `lastModificationTime` to the current time.
    pub fn last_modification_time(self) -> Self {
        let now = DateTime::from_chrono(chrono::Utc::now());
        self.set_field(LAST_MODIFICATION_TIME, now)
    }

    /// Sets `lastModifierId`.
    pub fn last_modifier_id(self, user_id: impl Into<String>) -> Self {
        self.set_field(LAST_MODIFIER_ID, user_id.into())
    }

    /// Same as [`set_field`](Self::set_field); reads better next to the audit helpers.
    pub fn with_field(self, field: &str, value: impl Into<Bson>) -> Self {
        self.set_field(field, value)
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    /// Borrow the update document built so far.
    pub fn to_document(&self) -> &Document {
        &self.doc
    }

    pub fn build(self) -> Document {
        self.doc
    }

    fn field(mut self, op: Op, field: &str, value: Bson) -> Self {
        match self.doc.get_mut(op.as_str()) {
            Some(Bson::Document(fields)) => {
                fields.insert(field, value);
            }
            _ => {
                let mut fields = Document::new();
                fields.insert(field, value);
                self.doc.insert(op.as_str(), fields);
            }
        }
        self
    }
}

impl From<UpdateBuilder> for Document {
    fn from(builder: UpdateBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Profile {
        name: String,
        age: i32,
    }

    #[test]
    fn test_set_value_serializes_struct() {
        let profile = Profile {
            name: "Ada".to_string(),
            age: 36,
        };
        let update = UpdateBuilder::set_value(&profile).unwrap().build();
        assert_eq!(update, doc! { "$set": { "name": "Ada", "age": 36 } });
    }

    #[test]
    fn test_set_document_replaces_previous_set() {
        let update = UpdateBuilder::new()
            .set_field("a", 1)
            .with_set(doc! { "b": 2 })
            .build();
        assert_eq!(update, doc! { "$set": { "b": 2 } });
    }

    #[test]
    fn test_set_field_appends() {
        let update = UpdateBuilder::set_document(doc! { "a": 1 })
            .set_field("b", 2)
            .build();
        assert_eq!(update, doc! { "$set": { "a": 1, "b": 2 } });
    }

    #[test]
    fn test_unset_maps_fields_to_empty_string() {
        let update = UpdateBuilder::new().unset(["x", "y"]).build();
        assert_eq!(update, doc! { "$unset": { "x": "", "y": "" } });
    }

    #[test]
    fn test_array_operators() {
        let update = UpdateBuilder::new()
            .push("tags", "new")
            .add_to_set("labels", "blue")
            .pull("scores", doc! { "$lt": 10 })
            .pull_all("flags", [1, 2])
            .pop("queue", true)
            .inc("version", 1)
            .build();
        assert_eq!(
            update,
            doc! {
                "$push": { "tags": "new" },
                "$addToSet": { "labels": "blue" },
                "$pull": { "scores": { "$lt": 10 } },
                "$pullAll": { "flags": [1, 2] },
                "$pop": { "queue": -1 },
                "$inc": { "version": 1 },
            }
        );
    }

    #[test]
    fn test_audit_fields() {
        let update = UpdateBuilder::new()
            .last_modification_time()
            .last_modifier_id("user-7")
            .with_field("state", "done")
            .build();
        let set = update.get_document("$set").unwrap();
        assert!(set.get_datetime(LAST_MODIFICATION_TIME).is_ok());
        assert_eq!(set.get_str(LAST_MODIFIER_ID).unwrap(), "user-7");
        assert_eq!(set.get_str("state").unwrap(), "done");
    }

    #[test]
    fn test_empty_builder() {
        let builder = UpdateBuilder::new();
        assert!(builder.is_empty());
        assert!(builder.to_document().is_empty());
    }
}
